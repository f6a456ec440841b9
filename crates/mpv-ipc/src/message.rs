use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{MpvIpcError, Result};

/// One line received from the IPC socket.
#[derive(Debug, Clone, PartialEq)]
pub enum IpcMessage {
    /// Reply to a command sent with a `request_id`.
    Reply {
        request_id: Option<u64>,
        error: String,
        data: Option<Value>,
    },
    /// An observed property changed. `data` is `None` when the property is
    /// unavailable.
    PropertyChange {
        id: u64,
        name: String,
        data: Option<Value>,
    },
    /// `script-message` sent to this client.
    ClientMessage {
        args: Vec<String>,
    },
    Event {
        name: String,
    },
}

impl IpcMessage {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Reply { error, .. } if error == "success")
    }
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    event: Option<String>,
    id: Option<u64>,
    name: Option<String>,
    data: Option<Value>,
    args: Option<Vec<String>>,
    request_id: Option<u64>,
    error: Option<String>,
}

/// Parses one newline-delimited message.
///
/// # Example
/// ```
/// use mpv_ipc::{IpcMessage, parse_message};
///
/// let message = parse_message(r#"{"event":"property-change","id":1,"name":"pause","data":true}"#)
///     .expect("valid message");
/// assert!(matches!(message, IpcMessage::PropertyChange { id: 1, .. }));
/// ```
pub fn parse_message(line: &str) -> Result<IpcMessage> {
    let raw: RawMessage = serde_json::from_str(line)?;
    let message = match (raw.event, raw.error) {
        (Some(event), _) if event == "property-change" => IpcMessage::PropertyChange {
            id: raw.id.unwrap_or_default(),
            name: raw.name.ok_or_else(|| malformed(line))?,
            data: raw.data.filter(|data| !data.is_null()),
        },
        (Some(event), _) if event == "client-message" => IpcMessage::ClientMessage {
            args: raw.args.unwrap_or_default(),
        },
        (Some(name), _) => IpcMessage::Event { name },
        (None, Some(error)) => IpcMessage::Reply {
            request_id: raw.request_id,
            error,
            data: raw.data.filter(|data| !data.is_null()),
        },
        (None, None) => return Err(malformed(line)),
    };
    Ok(message)
}

fn malformed(line: &str) -> MpvIpcError {
    MpvIpcError::Malformed {
        line: line.to_string(),
    }
}

/// Encodes a command as one IPC line, including the trailing newline.
///
/// Async commands reply only when they complete.
pub fn encode_command(args: &[Value], request_id: u64, run_async: bool) -> String {
    let mut message = json!({
        "command": args,
        "request_id": request_id,
    });
    if run_async {
        message["async"] = Value::Bool(true);
    }
    let mut line = message.to_string();
    line.push('\n');
    line
}
