// Verify wire format matches what the browser client expects.
// These tests ensure protocol compatibility is never broken.

use tether_protocol::{ClientFrame, ProtocolError, ServerFrame};

#[test]
fn init_frame_parses() {
    let frame = ClientFrame::parse(r#"{"type":"init","sessionId":"abc-123"}"#).unwrap();
    assert_eq!(
        frame,
        ClientFrame::Init {
            session_id: "abc-123".to_string()
        }
    );
}

#[test]
fn message_frame_parses() {
    let frame = ClientFrame::parse(r#"{"type":"message","content":"hello"}"#).unwrap();
    assert_eq!(
        frame,
        ClientFrame::Message {
            content: "hello".to_string()
        }
    );
}

#[test]
fn malformed_frames_are_invalid_format() {
    for raw in ["not json", "[1,2]", "\"str\"", "null", r#"{"sessionId":"x"}"#] {
        assert_eq!(
            ClientFrame::parse(raw),
            Err(ProtocolError::InvalidFormat),
            "input: {raw}"
        );
    }
}

#[test]
fn init_without_session_id_is_rejected() {
    let err = ClientFrame::parse(r#"{"type":"init"}"#).unwrap_err();
    assert_eq!(err.to_string(), "Session ID is required");
}

#[test]
fn unknown_type_is_reported() {
    let err = ClientFrame::parse(r#"{"type":"ping"}"#).unwrap_err();
    assert_eq!(err, ProtocolError::UnknownType("ping".to_string()));
}

#[test]
fn ready_serialization() {
    assert_eq!(ServerFrame::Ready.to_json(), r#"{"type":"ready"}"#);
}

#[test]
fn stream_end_serialization() {
    assert_eq!(ServerFrame::StreamEnd.to_json(), r#"{"type":"stream_end"}"#);
}

#[test]
fn content_chunk_serialization() {
    let json = ServerFrame::content("Hel").to_json();
    assert_eq!(
        json,
        r#"{"type":"stream_chunk","data":{"type":"content","data":"Hel"}}"#
    );
}

#[test]
fn tool_result_uses_camel_case_tool_name() {
    let json = ServerFrame::tool_result("read_file", "3 lines").to_json();
    assert!(json.contains(r#""type":"tool_result""#));
    assert!(json.contains(r#""toolName":"read_file""#));
    assert!(json.contains(r#""result":"3 lines""#));
}

#[test]
fn tool_error_serialization() {
    let value: serde_json::Value =
        serde_json::from_str(&ServerFrame::tool_error("shell", "boom").to_json()).unwrap();
    assert_eq!(value["type"], "tool_error");
    assert_eq!(value["data"]["toolName"], "shell");
    assert_eq!(value["data"]["error"], "boom");
}

#[test]
fn error_serialization() {
    assert_eq!(
        ServerFrame::error("Session not found").to_json(),
        r#"{"type":"error","error":"Session not found"}"#
    );
}
