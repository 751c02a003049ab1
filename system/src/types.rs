use serde::{Deserialize, Serialize};

/// Server-assigned, unique for the lifetime of the process.
pub type ConnectionId = u64;
/// Opaque, owned by the external session metadata store.
pub type SessionId = String;
/// Stable identity from the token verifier.
pub type UserId = String;
/// Client-generated, unique per session across strokes *and* shapes.
pub type ObjectId = String;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub id: ObjectId,
    pub points: Vec<Point>,
    pub color: String,
    pub width: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Rectangle,
    Circle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub id: ObjectId,
    pub kind: ShapeKind,
    pub origin: Point,
    pub width: f32,
    pub height: f32,
    pub color: String,
    pub stroke_width: f32,
}

/// A stroke or shape, as stored in a document. Erase targets exactly
/// one of these, which is why ids may not be shared across kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Entity {
    Stroke(Stroke),
    Shape(Shape),
}

impl Entity {
    pub fn id(&self) -> &ObjectId {
        match self {
            Entity::Stroke(s) => &s.id,
            Entity::Shape(s) => &s.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: UserId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub author: String,
    pub text: String,
    /// Server clock, epoch milliseconds.
    pub time: u64,
}
