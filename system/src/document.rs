use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::*;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DocumentError {
    #[error("id {0:?} is already used by a shape")]
    IdUsedByShape(ObjectId),
    #[error("id {0:?} is already used by a stroke")]
    IdUsedByStroke(ObjectId),
}

/// Authoritative per-session drawing state. Mutated only from the
/// room's processing loop; every mutation is an upsert or a removal,
/// so re-applying the same event is a no-op.
#[derive(Debug, Clone, Default)]
pub struct Document {
    strokes: HashMap<ObjectId, Stroke>,
    shapes: HashMap<ObjectId, Shape>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert-or-replace by id. Last write wins; an in-progress stroke
    /// keeps arriving under the same id with more points each time.
    pub fn upsert_stroke(&mut self, stroke: Stroke) -> Result<(), DocumentError> {
        if self.shapes.contains_key(&stroke.id) {
            return Err(DocumentError::IdUsedByShape(stroke.id));
        }
        self.strokes.insert(stroke.id.clone(), stroke);
        Ok(())
    }

    pub fn upsert_shape(&mut self, shape: Shape) -> Result<(), DocumentError> {
        if self.strokes.contains_key(&shape.id) {
            return Err(DocumentError::IdUsedByStroke(shape.id));
        }
        self.shapes.insert(shape.id.clone(), shape);
        Ok(())
    }

    /// Removes the id from whichever map holds it. Absent ids are a
    /// no-op, not an error.
    pub fn erase(&mut self, id: &ObjectId) -> Option<Entity> {
        if let Some(stroke) = self.strokes.remove(id) {
            return Some(Entity::Stroke(stroke));
        }
        self.shapes.remove(id).map(Entity::Shape)
    }

    pub fn get_stroke(&self, id: &ObjectId) -> Option<&Stroke> {
        self.strokes.get(id)
    }

    pub fn get_shape(&self, id: &ObjectId) -> Option<&Shape> {
        self.shapes.get(id)
    }

    pub fn len(&self) -> usize {
        self.strokes.len() + self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty() && self.shapes.is_empty()
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        let mut strokes: Vec<Stroke> = self.strokes.values().cloned().collect();
        let mut shapes: Vec<Shape> = self.shapes.values().cloned().collect();
        strokes.sort_by(|a, b| a.id.cmp(&b.id));
        shapes.sort_by(|a, b| a.id.cmp(&b.id));
        DocumentSnapshot { strokes, shapes }
    }
}

/// What a late joiner receives; enough to reconstruct the visible
/// board without replaying any individual draw event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub strokes: Vec<Stroke>,
    pub shapes: Vec<Shape>,
}

impl From<&DocumentSnapshot> for Document {
    fn from(snapshot: &DocumentSnapshot) -> Self {
        let mut doc = Document::new();
        for stroke in &snapshot.strokes {
            doc.strokes.insert(stroke.id.clone(), stroke.clone());
        }
        for shape in &snapshot.shapes {
            doc.shapes.insert(shape.id.clone(), shape.clone());
        }
        doc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke(id: &str, points: &[(f32, f32)]) -> Stroke {
        Stroke {
            id: id.into(),
            points: points.iter().map(|&(x, y)| Point { x, y }).collect(),
            color: "#000".into(),
            width: 3.0,
        }
    }

    fn shape(id: &str) -> Shape {
        Shape {
            id: id.into(),
            kind: ShapeKind::Circle,
            origin: Point { x: 0.0, y: 0.0 },
            width: 4.0,
            height: 4.0,
            color: "#00f".into(),
            stroke_width: 1.0,
        }
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut doc = Document::new();
        doc.upsert_stroke(stroke("a", &[(0.0, 0.0)])).unwrap();
        let once = doc.snapshot();
        doc.upsert_stroke(stroke("a", &[(0.0, 0.0)])).unwrap();
        assert_eq!(doc.snapshot(), once);
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn last_write_wins_per_id() {
        let mut doc = Document::new();
        doc.upsert_stroke(stroke("x", &[(0.0, 0.0)])).unwrap();
        doc.upsert_stroke(stroke("x", &[(0.0, 0.0), (5.0, 5.0)]))
            .unwrap();
        assert_eq!(doc.len(), 1);
        assert_eq!(doc.get_stroke(&"x".to_string()).unwrap().points.len(), 2);
    }

    #[test]
    fn erase_absent_id_is_noop() {
        let mut doc = Document::new();
        doc.upsert_shape(shape("s1")).unwrap();
        let before = doc.snapshot();
        assert_eq!(doc.erase(&"ghost".to_string()), None);
        assert_eq!(doc.snapshot(), before);
    }

    #[test]
    fn erase_targets_either_map() {
        let mut doc = Document::new();
        doc.upsert_stroke(stroke("a", &[(1.0, 1.0)])).unwrap();
        doc.upsert_shape(shape("b")).unwrap();
        assert!(matches!(
            doc.erase(&"a".to_string()),
            Some(Entity::Stroke(_))
        ));
        assert!(matches!(doc.erase(&"b".to_string()), Some(Entity::Shape(_))));
        assert!(doc.is_empty());
    }

    #[test]
    fn id_collision_across_kinds_is_rejected() {
        let mut doc = Document::new();
        doc.upsert_shape(shape("dup")).unwrap();
        let err = doc.upsert_stroke(stroke("dup", &[(0.0, 0.0)])).unwrap_err();
        assert_eq!(err, DocumentError::IdUsedByShape("dup".into()));

        let mut doc = Document::new();
        doc.upsert_stroke(stroke("dup", &[(0.0, 0.0)])).unwrap();
        let err = doc.upsert_shape(shape("dup")).unwrap_err();
        assert_eq!(err, DocumentError::IdUsedByStroke("dup".into()));
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn snapshot_contains_exactly_the_applied_entities() {
        let mut doc = Document::new();
        for i in 0..3 {
            doc.upsert_stroke(stroke(&format!("st{}", i), &[(i as f32, 0.0)]))
                .unwrap();
        }
        for i in 0..2 {
            doc.upsert_shape(shape(&format!("sh{}", i))).unwrap();
        }
        let snapshot = doc.snapshot();
        assert_eq!(snapshot.strokes.len(), 3);
        assert_eq!(snapshot.shapes.len(), 2);

        let rebuilt = Document::from(&snapshot);
        assert_eq!(rebuilt.snapshot(), snapshot);
    }
}
