use serde_json::Value;

use super::messages::{ClientMessage, ServerMessage};
use crate::stroke::StrokeError;

/// Default inbound frame cap in bytes.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024; // 16 KiB

/// Maximum guess length in characters.
pub const MAX_GUESS_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty message")]
    EmptyMessage,
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },
    #[error("message has no type field")]
    MissingType,
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("invalid guess: {0}")]
    InvalidGuess(&'static str),
    #[error("invalid stroke: {0}")]
    InvalidStroke(#[from] StrokeError),
    #[error("serialize error: {0}")]
    Serialize(String),
}

/// Decode one text frame of at most `max_size` bytes into a `ClientMessage`.
///
/// The `type` tag is checked before the body so an unrecognised kind is
/// reported as such rather than as a generic parse failure.
pub fn decode_client_message(
    text: &str,
    max_size: usize,
) -> Result<ClientMessage, ProtocolError> {
    if text.trim().is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if text.len() > max_size {
        return Err(ProtocolError::PayloadTooLarge {
            size: text.len(),
            max: max_size,
        });
    }

    let value: Value =
        serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?;
    if !ClientMessage::TYPES.contains(&kind) {
        return Err(ProtocolError::UnknownMessageType(kind.to_string()));
    }

    let msg: ClientMessage =
        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    validate(&msg)?;
    Ok(msg)
}

fn validate(msg: &ClientMessage) -> Result<(), ProtocolError> {
    match msg {
        ClientMessage::Guess { guess } => {
            if guess.trim().is_empty() {
                return Err(ProtocolError::InvalidGuess("blank"));
            }
            if guess.chars().count() > MAX_GUESS_LEN {
                return Err(ProtocolError::InvalidGuess("too long"));
            }
            if guess.chars().any(char::is_control) {
                return Err(ProtocolError::InvalidGuess("control characters"));
            }
            Ok(())
        },
        ClientMessage::Draw { data } => data.validate().map_err(ProtocolError::from),
        ClientMessage::NewRound | ClientMessage::ClearCanvas | ClientMessage::RoundEnd { .. } => {
            Ok(())
        },
    }
}

/// Encode a `ServerMessage` as a JSON text frame.
pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::Serialize(e.to_string()))
}

/// Encode a `ClientMessage` as a JSON text frame.
pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::Serialize(e.to_string()))
}

/// Decode a server frame. Used by test clients and tooling.
pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    if text.trim().is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    serde_json::from_str(text).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::EndReason;
    use crate::scoreboard::Scoreboard;
    use crate::stroke::{Point, Stroke};
    use serde_json::json;

    fn decode(text: &str) -> Result<ClientMessage, ProtocolError> {
        decode_client_message(text, MAX_MESSAGE_SIZE)
    }

    #[test]
    fn decode_all_inbound_kinds() {
        assert_eq!(
            decode(r#"{"type":"new_round"}"#).unwrap(),
            ClientMessage::NewRound
        );
        assert_eq!(
            decode(r#"{"type":"guess","guess":"cat"}"#).unwrap(),
            ClientMessage::Guess {
                guess: "cat".into()
            }
        );
        assert_eq!(
            decode(r#"{"type":"clear_canvas"}"#).unwrap(),
            ClientMessage::ClearCanvas
        );
        assert_eq!(
            decode(r#"{"type":"round_end","word":"cat"}"#).unwrap(),
            ClientMessage::RoundEnd {
                word: Some("cat".into())
            }
        );
        assert_eq!(
            decode(r#"{"type":"round_end"}"#).unwrap(),
            ClientMessage::RoundEnd { word: None }
        );
    }

    #[test]
    fn decode_draw_payload() {
        let text = json!({
            "type": "draw",
            "data": {"from": {"x": 1, "y": 2}, "to": {"x": 3.5, "y": 4}, "color": "#ff0000", "size": 5}
        })
        .to_string();
        let ClientMessage::Draw { data } = decode(&text).unwrap() else {
            panic!("expected draw");
        };
        assert_eq!(data.from, Point::new(1.0, 2.0));
        assert_eq!(data.to, Point::new(3.5, 4.0));
        assert_eq!(data.color, "#ff0000");
        assert_eq!(data.size, 5.0);
    }

    #[test]
    fn unknown_fields_are_ignored() {
        let msg = decode(r#"{"type":"new_round","extra":1}"#).unwrap();
        assert_eq!(msg, ClientMessage::NewRound);
    }

    #[test]
    fn decode_errors() {
        assert!(matches!(
            decode("   "),
            Err(ProtocolError::EmptyMessage)
        ));
        assert!(matches!(
            decode("{not json"),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            decode(r#"{"guess":"cat"}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            decode(r#"{"type":"teleport"}"#),
            Err(ProtocolError::UnknownMessageType(t)) if t == "teleport"
        ));
        assert!(matches!(
            decode(r#"{"type":"guess"}"#),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn oversized_frame_rejected() {
        let guess = "a".repeat(MAX_MESSAGE_SIZE);
        let text = json!({"type": "guess", "guess": guess}).to_string();
        assert!(matches!(
            decode(&text),
            Err(ProtocolError::PayloadTooLarge {
                max: MAX_MESSAGE_SIZE,
                ..
            })
        ));
    }

    #[test]
    fn frame_limit_is_caller_supplied() {
        // Valid JSON padded past the default cap
        let text = format!("{}{}", r#"{"type":"new_round"}"#, " ".repeat(MAX_MESSAGE_SIZE));
        assert!(decode(&text).is_err());
        assert_eq!(
            decode_client_message(&text, 4 * MAX_MESSAGE_SIZE).unwrap(),
            ClientMessage::NewRound
        );
        assert!(matches!(
            decode_client_message(r#"{"type":"new_round"}"#, 8),
            Err(ProtocolError::PayloadTooLarge { size: 20, max: 8 })
        ));
    }

    #[test]
    fn guess_validation() {
        let long = json!({"type": "guess", "guess": "a".repeat(MAX_GUESS_LEN + 1)}).to_string();
        assert!(matches!(
            decode(&long),
            Err(ProtocolError::InvalidGuess(_))
        ));
        assert!(matches!(
            decode(r#"{"type":"guess","guess":"  "}"#),
            Err(ProtocolError::InvalidGuess(_))
        ));
        assert!(matches!(
            decode(r#"{"type":"guess","guess":"c\u0000at"}"#),
            Err(ProtocolError::InvalidGuess(_))
        ));
    }

    #[test]
    fn invalid_stroke_rejected() {
        let text = json!({
            "type": "draw",
            "data": {"from": {"x": 1, "y": 2}, "to": {"x": 3, "y": 4}, "color": "#000", "size": -1}
        })
        .to_string();
        assert!(matches!(
            decode(&text),
            Err(ProtocolError::InvalidStroke(StrokeError::InvalidSize))
        ));
    }

    #[test]
    fn outbound_wire_shapes() {
        let msg = ServerMessage::TimeUpdate { time_left: 42 };
        assert_eq!(
            encode_server_message(&msg).unwrap(),
            r#"{"type":"time_update","timeLeft":42}"#
        );

        let msg = ServerMessage::RoundEnd {
            word: "cat".into(),
            reason: Some(EndReason::Aborted),
        };
        assert_eq!(
            encode_server_message(&msg).unwrap(),
            r#"{"type":"round_end","word":"cat","reason":"aborted"}"#
        );

        assert_eq!(
            encode_server_message(&ServerMessage::WrongGuess).unwrap(),
            r#"{"type":"wrong_guess"}"#
        );
    }

    #[test]
    fn correct_guess_carries_score_map() {
        let mut scores = Scoreboard::new();
        scores.award("Bob", 8);
        let msg = ServerMessage::CorrectGuess {
            player_id: "Bob".into(),
            word: "cat".into(),
            scores,
        };
        let value: Value = serde_json::from_str(&encode_server_message(&msg).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({"type": "correct_guess", "player_id": "Bob", "word": "cat", "scores": {"Bob": 8}})
        );
    }

    #[test]
    fn outbound_draw_roundtrips_through_decoder() {
        let msg = ServerMessage::Draw {
            data: Stroke {
                from: Point::new(0.0, 0.0),
                to: Point::new(10.0, 10.0),
                color: "#123456".into(),
                size: 3.0,
            },
            player_id: "Alice".into(),
        };
        let text = encode_server_message(&msg).unwrap();
        assert_eq!(decode_server_message(&text).unwrap(), msg);
        assert_eq!(msg.type_name(), "draw");
    }

    #[test]
    fn encoded_client_messages_decode() {
        let msg = ClientMessage::Guess {
            guess: "dog".into(),
        };
        let text = encode_client_message(&msg).unwrap();
        assert_eq!(decode(&text).unwrap(), msg);
    }
}
