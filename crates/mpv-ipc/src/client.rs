use std::io::{BufRead, Write};

use serde_json::{Value, json};
use tracing::{trace, warn};

use crate::error::{MpvIpcError, Result};
use crate::message::{IpcMessage, encode_command, parse_message};

/// Request ids at or above this value are never handed out by
/// [`MpvClient::command`]; callers may use them for their own async requests.
pub const USER_REQUEST_BASE: u64 = 1 << 32;

/// Writing half of an IPC connection.
#[derive(Debug)]
pub struct MpvClient<W> {
    writer: W,
    next_request: u64,
}

impl<W> MpvClient<W>
where
    W: Write,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            next_request: 1,
        }
    }

    /// Sends a synchronous command and returns its request id.
    pub fn command(&mut self, args: &[Value]) -> Result<u64> {
        let request_id = self.next_request;
        self.next_request += 1;
        if self.next_request >= USER_REQUEST_BASE {
            self.next_request = 1;
        }
        self.send(args, request_id, false)?;
        Ok(request_id)
    }

    /// Sends an async command under a caller-chosen request id; the reply
    /// arrives when the command completes.
    pub fn command_async(&mut self, request_id: u64, args: &[Value]) -> Result<()> {
        self.send(args, request_id, true)
    }

    pub fn observe_property(&mut self, id: u64, name: &str) -> Result<u64> {
        self.command(&[json!("observe_property"), json!(id), json!(name)])
    }

    pub fn set_property(&mut self, name: &str, value: Value) -> Result<u64> {
        self.command(&[json!("set_property"), json!(name), value])
    }

    pub fn show_text(&mut self, text: &str, duration_ms: u64) -> Result<u64> {
        self.command(&[json!("show-text"), json!(text), json!(duration_ms)])
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn send(&mut self, args: &[Value], request_id: u64, run_async: bool) -> Result<()> {
        let line = encode_command(args, request_id, run_async);
        trace!(request_id, line = line.trim_end(), "ipc send");
        self.writer
            .write_all(line.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|source| MpvIpcError::Io {
                context: "write ipc command",
                source,
            })
    }
}

/// Reading half of an IPC connection, yielding one message per line.
#[derive(Debug)]
pub struct MessageReader<R> {
    reader: R,
    line: String,
}

impl<R> MessageReader<R>
where
    R: BufRead,
{
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
        }
    }

    /// Reads the next message. Unparseable lines are skipped with a warning.
    pub fn next_message(&mut self) -> Result<IpcMessage> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .map_err(|source| MpvIpcError::Io {
                    context: "read ipc message",
                    source,
                })?;
            if read == 0 {
                return Err(MpvIpcError::Closed);
            }
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            match parse_message(line) {
                Ok(message) => return Ok(message),
                Err(error) => warn!(%error, "skipping ipc line"),
            }
        }
    }
}

#[cfg(unix)]
mod unix {
    use std::io::BufReader;
    use std::os::unix::net::UnixStream;
    use std::path::Path;

    use super::{MessageReader, MpvClient};
    use crate::error::{MpvIpcError, Result};

    /// Connects to the socket given to mpv with `--input-ipc-server`.
    pub fn connect(
        path: &Path,
    ) -> Result<(MpvClient<UnixStream>, MessageReader<BufReader<UnixStream>>)> {
        let stream = UnixStream::connect(path).map_err(|source| MpvIpcError::Io {
            context: "connect ipc socket",
            source,
        })?;
        let reader = stream.try_clone().map_err(|source| MpvIpcError::Io {
            context: "clone ipc socket",
            source,
        })?;
        Ok((
            MpvClient::new(stream),
            MessageReader::new(BufReader::new(reader)),
        ))
    }
}

#[cfg(unix)]
pub use unix::connect;
