use serde::{Deserialize, Serialize};
use worldmap::Direction;

/// Close codes sent with the server-initiated close frame. Clients map these
/// to specific failure screens, so the values are part of the contract.
pub mod close {
    /// Join failed for a reason with no dedicated code (room full,
    /// persistence failure, protocol violation before join).
    pub const GENERIC: u16 = 4000;
    /// Bearer token failed to decode.
    pub const AUTH_FAILED: u16 = 4001;
    /// A non-owner tried to open a world with no live room.
    pub const NOT_OWNER: u16 = 4002;
    /// The requested world save does not exist.
    pub const WORLD_NOT_FOUND: u16 = 4003;
    /// Kicked after the idle timeout.
    pub const IDLE_TIMEOUT: u16 = 4005;
}

/// Client-to-server message (internally tagged JSON).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First frame of every session. Anything else before a join is a
    /// protocol violation.
    Join {
        token: String,
        world_save_id: i64,
        character_name: Option<String>,
    },
    /// One tile-step request. Sequence numbers are client-assigned and must
    /// increase; the server echoes the highest applied one back in patches.
    Input {
        sequence_number: u64,
        direction: Direction,
    },
    Ping,
}

/// Server-to-client message (internally tagged JSON).
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        session_id: u64,
        world_id: i64,
        world_name: String,
        tick: u64,
        map: MapWire,
    },
    /// Incremental room-state delta. An `added` entry for a session already
    /// known to the client replaces that player wholesale.
    StatePatch {
        tick: u64,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        added: Vec<PlayerWire>,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        changed: Vec<PlayerChangeWire>,
        #[serde(skip_serializing_if = "Vec::is_empty", default)]
        removed: Vec<u64>,
    },
    IdleWarning {
        seconds_remaining: u64,
    },
    IdleKick {
        reason: String,
    },
    Error {
        message: String,
    },
    Pong,
}

/// Full wire form of one player record.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerWire {
    pub session_id: u64,
    pub account_id: i64,
    pub name: String,
    pub x: i32,
    pub y: i32,
    pub last_processed_seq: u64,
}

/// Minimal wire form for a player whose tick-mutable fields changed.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerChangeWire {
    pub session_id: u64,
    pub x: i32,
    pub y: i32,
    pub last_processed_seq: u64,
}

/// Map header sent in `Welcome`; enough for the client to size its view and
/// run local prediction against the same grid.
#[derive(Debug, Clone, Serialize)]
pub struct MapWire {
    pub width: u32,
    pub height: u32,
    pub spawn_x: i32,
    pub spawn_y: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_join() {
        let json = r#"{"type":"join","token":"abc.def.","world_save_id":7,"character_name":"Mara"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Join {
                token,
                world_save_id,
                character_name,
            } => {
                assert_eq!(token, "abc.def.");
                assert_eq!(world_save_id, 7);
                assert_eq!(character_name.as_deref(), Some("Mara"));
            }
            _ => panic!("Expected Join"),
        }
    }

    #[test]
    fn deserialize_join_without_name() {
        let json = r#"{"type":"join","token":"t","world_save_id":1,"character_name":null}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Join {
                character_name: None,
                ..
            }
        ));
    }

    #[test]
    fn deserialize_input() {
        let json = r#"{"type":"input","sequence_number":3,"direction":"right"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();
        match msg {
            ClientMessage::Input {
                sequence_number,
                direction,
            } => {
                assert_eq!(sequence_number, 3);
                assert_eq!(direction, Direction::Right);
            }
            _ => panic!("Expected Input"),
        }
    }

    #[test]
    fn deserialize_input_bad_direction_fails() {
        let json = r#"{"type":"input","sequence_number":1,"direction":"sideways"}"#;
        assert!(serde_json::from_str::<ClientMessage>(&json).is_err());
    }

    #[test]
    fn deserialize_ping() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn serialize_welcome() {
        let msg = ServerMessage::Welcome {
            session_id: 1_000_000,
            world_id: 12,
            world_name: "Emberfall".to_string(),
            tick: 0,
            map: MapWire {
                width: 64,
                height: 64,
                spawn_x: 32,
                spawn_y: 32,
            },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"welcome""#));
        assert!(json.contains(r#""world_id":12"#));
        assert!(json.contains(r#""spawn_x":32"#));
    }

    #[test]
    fn serialize_state_patch_full() {
        let msg = ServerMessage::StatePatch {
            tick: 42,
            added: vec![PlayerWire {
                session_id: 1,
                account_id: 9,
                name: "Mara".to_string(),
                x: 2,
                y: 2,
                last_processed_seq: 0,
            }],
            changed: vec![PlayerChangeWire {
                session_id: 2,
                x: 3,
                y: 2,
                last_processed_seq: 5,
            }],
            removed: vec![3],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"state_patch""#));
        assert!(json.contains(r#""tick":42"#));
        assert!(json.contains(r#""added""#));
        assert!(json.contains(r#""last_processed_seq":5"#));
        assert!(json.contains(r#""removed":[3]"#));
    }

    #[test]
    fn serialize_state_patch_empty_sections_skipped() {
        let msg = ServerMessage::StatePatch {
            tick: 5,
            added: vec![],
            changed: vec![PlayerChangeWire {
                session_id: 1,
                x: 0,
                y: 0,
                last_processed_seq: 1,
            }],
            removed: vec![],
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""changed""#));
        assert!(!json.contains(r#""added""#));
        assert!(!json.contains(r#""removed""#));
    }

    #[test]
    fn serialize_idle_messages() {
        let warn = serde_json::to_string(&ServerMessage::IdleWarning {
            seconds_remaining: 60,
        })
        .unwrap();
        assert!(warn.contains(r#""type":"idle_warning""#));
        assert!(warn.contains(r#""seconds_remaining":60"#));

        let kick = serde_json::to_string(&ServerMessage::IdleKick {
            reason: "idle for too long".to_string(),
        })
        .unwrap();
        assert!(kick.contains(r#""type":"idle_kick""#));
    }

    #[test]
    fn serialize_pong() {
        let json = serde_json::to_string(&ServerMessage::Pong).unwrap();
        assert_eq!(json, r#"{"type":"pong"}"#);
    }

    #[test]
    fn close_codes_are_contract_values() {
        assert_eq!(close::AUTH_FAILED, 4001);
        assert_eq!(close::NOT_OWNER, 4002);
        assert_eq!(close::WORLD_NOT_FOUND, 4003);
        assert_eq!(close::IDLE_TIMEOUT, 4005);
    }
}
