use serde::{Deserialize, Serialize};

use crate::document::DocumentSnapshot;
use crate::types::*;

/// Events a client may send after authentication. Tags are the wire
/// event names; payloads ride under `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom { session_id: SessionId },
    LeaveRoom,
    Draw { stroke: Stroke },
    DrawShape { shape: Shape },
    Erase { id: ObjectId },
    CursorMove { point: Point },
    ChatMessage { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Full deduplicated roster, sent to the joiner only.
    RoomUsers { users: Vec<Participant> },
    /// Full document snapshot, sent to the joiner only.
    WhiteboardState(DocumentSnapshot),
    UserJoined(Participant),
    UserLeft(Participant),
    Draw { stroke: Stroke },
    DrawShape { shape: Shape },
    Erase { id: ObjectId },
    CursorMove {
        user_id: UserId,
        username: String,
        point: Point,
    },
    ChatMessage(ChatMessage),
    /// Precedes a forced disconnect.
    Unauthorized,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_tags_match_wire_names() {
        let ev = ClientEvent::JoinRoom {
            session_id: "s1".into(),
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "join-room");
        assert_eq!(json["data"]["session_id"], "s1");

        let ev = ClientEvent::DrawShape {
            shape: Shape {
                id: "r1".into(),
                kind: ShapeKind::Rectangle,
                origin: Point { x: 1.0, y: 2.0 },
                width: 10.0,
                height: 5.0,
                color: "#f00".into(),
                stroke_width: 2.0,
            },
        };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["event"], "draw-shape");
        assert_eq!(json["data"]["shape"]["kind"], "rectangle");
    }

    #[test]
    fn server_event_roundtrip() {
        let ev = ServerEvent::CursorMove {
            user_id: "u1".into(),
            username: "ann".into(),
            point: Point { x: 3.0, y: 4.0 },
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"cursor-move\""));
        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn unauthorized_is_a_bare_tag() {
        let json = serde_json::to_value(&ServerEvent::Unauthorized).unwrap();
        assert_eq!(json["event"], "unauthorized");
    }

    #[test]
    fn malformed_event_fails_to_parse() {
        // missing required field
        let res = serde_json::from_str::<ClientEvent>(r#"{"event":"draw","data":{}}"#);
        assert!(res.is_err());
        // unknown tag
        let res = serde_json::from_str::<ClientEvent>(r#"{"event":"nope","data":{}}"#);
        assert!(res.is_err());
    }
}
