use crate::document::{Document, DocumentError, DocumentSnapshot};
use crate::message::{ClientEvent, ServerEvent};
use crate::types::*;

/// The minimal record needed to invert one local mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum UndoableAction {
    Add(Entity),
    Remove(Entity),
}

/// Client-side reconciliation layer: an optimistic local copy of the
/// shared document plus undo/redo stacks over the user's own actions.
///
/// Undo and redo emit the same wire events as fresh edits, so remote
/// participants observe them as ordinary edits; there is no undo event
/// type on the wire. Remote deltas mutate the local document only and
/// never touch the stacks.
pub struct ClientBoard {
    document: Document,
    undo_stack: Vec<UndoableAction>,
    redo_stack: Vec<UndoableAction>,
}

impl ClientBoard {
    /// Starts from the `whiteboard-state` snapshot received on join.
    pub fn new(snapshot: &DocumentSnapshot) -> Self {
        Self {
            document: Document::from(snapshot),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn history_len(&self) -> usize {
        self.undo_stack.len()
    }

    /// Applies one of the user's own stroke packets and returns the
    /// event to transmit. The first packet of a gesture becomes an
    /// undoable Add; later packets of the same gesture only grow the
    /// stroke in place.
    pub fn apply_stroke(&mut self, stroke: Stroke) -> Result<ClientEvent, DocumentError> {
        let known = self.document.get_stroke(&stroke.id).is_some();
        self.document.upsert_stroke(stroke.clone())?;
        if !known {
            self.push(UndoableAction::Add(Entity::Stroke(stroke.clone())));
        }
        Ok(ClientEvent::Draw { stroke })
    }

    pub fn apply_shape(&mut self, shape: Shape) -> Result<ClientEvent, DocumentError> {
        let known = self.document.get_shape(&shape.id).is_some();
        self.document.upsert_shape(shape.clone())?;
        if !known {
            self.push(UndoableAction::Add(Entity::Shape(shape.clone())));
        }
        Ok(ClientEvent::DrawShape { shape })
    }

    /// Erases one of the user's locally visible entities. Absent ids
    /// produce no event and no history entry.
    pub fn apply_erase(&mut self, id: &ObjectId) -> Option<ClientEvent> {
        let entity = self.document.erase(id)?;
        self.push(UndoableAction::Remove(entity));
        Some(ClientEvent::Erase { id: id.clone() })
    }

    /// Pops the undo stack, applies the inverse locally, pushes the
    /// inverse onto the redo stack, and returns the event to transmit.
    pub fn undo(&mut self) -> Option<ClientEvent> {
        let action = self.undo_stack.pop()?;
        let (event, inverse) = self.invert(action);
        self.redo_stack.push(inverse);
        Some(event)
    }

    /// Mirror of [`undo`](Self::undo).
    pub fn redo(&mut self) -> Option<ClientEvent> {
        let action = self.redo_stack.pop()?;
        let (event, inverse) = self.invert(action);
        self.undo_stack.push(inverse);
        Some(event)
    }

    /// Applies a server-echoed delta from another participant.
    pub fn apply_remote(&mut self, event: &ServerEvent) {
        match event {
            ServerEvent::Draw { stroke } => {
                if let Err(err) = self.document.upsert_stroke(stroke.clone()) {
                    log::warn!("dropping remote stroke: {}", err);
                }
            }
            ServerEvent::DrawShape { shape } => {
                if let Err(err) = self.document.upsert_shape(shape.clone()) {
                    log::warn!("dropping remote shape: {}", err);
                }
            }
            ServerEvent::Erase { id } => {
                self.document.erase(id);
            }
            _ => {}
        }
    }

    fn push(&mut self, action: UndoableAction) {
        self.undo_stack.push(action);
        self.redo_stack.clear();
    }

    /// Applies the inverse of `action` to the local document and
    /// returns the matching wire event plus the inverse action.
    fn invert(&mut self, action: UndoableAction) -> (ClientEvent, UndoableAction) {
        match action {
            UndoableAction::Add(entity) => {
                let id = entity.id().clone();
                // the live document may hold a newer payload for this
                // id than the snapshot taken when the action was pushed
                let removed = self.document.erase(&id).unwrap_or(entity);
                (ClientEvent::Erase { id }, UndoableAction::Remove(removed))
            }
            UndoableAction::Remove(entity) => {
                let event = self.restore(entity.clone());
                (event, UndoableAction::Add(entity))
            }
        }
    }

    fn restore(&mut self, entity: Entity) -> ClientEvent {
        match entity {
            Entity::Stroke(stroke) => {
                if let Err(err) = self.document.upsert_stroke(stroke.clone()) {
                    log::warn!("could not restore stroke locally: {}", err);
                }
                ClientEvent::Draw { stroke }
            }
            Entity::Shape(shape) => {
                if let Err(err) = self.document.upsert_shape(shape.clone()) {
                    log::warn!("could not restore shape locally: {}", err);
                }
                ClientEvent::DrawShape { shape }
            }
        }
    }
}
