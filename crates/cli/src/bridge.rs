use std::io::{BufRead, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Instant;

use cachedump_engine::{Engine, EngineErrorEvent, Event, Signal};
use mpv_ipc::{IpcMessage, MessageReader, MpvIpcError};
use tracing::{debug, info, warn};

use crate::host::{Input, MpvHost};

const MESSAGE_CHANNEL_CAPACITY: usize = 64;

/// Receiver of messages read from the IPC socket.
pub type MessageReceiver = Receiver<mpv_ipc::Result<IpcMessage>>;

/// Spawns the thread that reads IPC messages until the connection closes.
pub fn spawn_reader<R>(mut reader: MessageReader<R>) -> MessageReceiver
where
    R: BufRead + Send + 'static,
{
    let (message_tx, message_rx) = mpsc::sync_channel(MESSAGE_CHANNEL_CAPACITY);

    thread::spawn(move || {
        loop {
            let message = reader.next_message();
            let closed = message.is_err();
            if message_tx.send(message).is_err() || closed {
                return;
            }
        }
    });

    message_rx
}

/// Drives the engine until mpv goes away or the engine asks it to quit.
pub fn run<W>(engine: &mut Engine<MpvHost<W>>, messages: &MessageReceiver) -> mpv_ipc::Result<()>
where
    W: Write,
{
    loop {
        let due = engine.host_mut().timers().take_due(Instant::now());
        for (kind, generation) in due {
            report_all(engine.handle_signal(Signal::TimerFired { kind, generation }));
        }
        if engine.host().quit_requested() {
            info!("quit requested, leaving event loop");
            return Ok(());
        }

        let received = match engine.host_mut().timers().next_deadline() {
            Some(deadline) => {
                messages.recv_timeout(deadline.saturating_duration_since(Instant::now()))
            }
            None => messages
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(Ok(message)) => {
                for input in engine.host_mut().absorb(message) {
                    dispatch(engine, input);
                }
            }
            Ok(Err(MpvIpcError::Closed)) | Err(RecvTimeoutError::Disconnected) => {
                info!("ipc connection closed");
                return Ok(());
            }
            Ok(Err(error)) => return Err(error),
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}

fn dispatch<W>(engine: &mut Engine<MpvHost<W>>, input: Input)
where
    W: Write,
{
    let events = match input {
        Input::Signal(signal) => engine.handle_signal(signal),
        Input::Command(command) => {
            debug!(?command, "client command");
            engine
                .handle_command(command)
                .unwrap_or_else(|error| vec![Event::Error(EngineErrorEvent::from_error(&error))])
        }
    };
    report_all(events);
}

fn report_all(events: Vec<Event>) {
    for event in &events {
        report(event);
    }
}

fn report(event: &Event) {
    match event {
        Event::WriteStarted {
            id,
            path,
            continuous,
        } => info!(id = id.0, path = %path.display(), continuous, "write started"),
        Event::WriteQueued { mode, depth } => info!(mode = mode.as_str(), depth, "write queued"),
        Event::WriteDropped { mode } => warn!(mode = mode.as_str(), "write dropped"),
        Event::WriteFinished { id, path, status } => {
            info!(id = id.0, path = %path.display(), ?status, "write finished")
        }
        Event::SegmentsFinished { count } => info!(count, "segments finished"),
        Event::Reloaded { reason } => info!(reason = reason.as_str(), "entry reloaded"),
        Event::LoopAligned { a, b } => debug!(?a, ?b, "loop aligned"),
        Event::LoopRestored { a, b } => debug!(?a, ?b, "loop restored"),
        Event::OptionChanged { key, value } => debug!(key = %key, value = %value, "option changed"),
        Event::Quitting => info!("quitting after open writes close"),
        Event::Error(error) => warn!(kind = ?error.kind, message = %error.message, "engine error"),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::mpsc;
    use std::time::Duration;

    use cachedump_engine::{Engine, Settings};
    use mpv_ipc::{IpcMessage, MessageReader, MpvClient};
    use serde_json::json;

    use super::{run, spawn_reader};
    use crate::host::MpvHost;

    fn engine(settings: Settings) -> Engine<MpvHost<Vec<u8>>> {
        Engine::new(MpvHost::new(MpvClient::new(Vec::new())), settings)
    }

    #[test]
    fn quit_timer_ends_the_loop() {
        let mut engine = engine(Settings {
            quit: Some(0.0),
            ..Settings::default()
        });
        let (message_tx, message_rx) = mpsc::sync_channel(4);
        message_tx
            .send(Ok(IpcMessage::Event {
                name: "file-loaded".to_string(),
            }))
            .expect("send event");
        message_tx
            .send(Ok(IpcMessage::PropertyChange {
                id: 10,
                name: "media-title".to_string(),
                data: Some(json!("Stream")),
            }))
            .expect("send title");

        run(&mut engine, &message_rx).expect("loop ends cleanly");

        assert!(engine.host().quit_requested());
        assert_eq!(
            engine.output_name().map(|name| name.title.as_str()),
            Some("Stream")
        );
    }

    #[test]
    fn closed_connection_ends_the_loop() {
        let mut engine = engine(Settings::default());
        let reader = MessageReader::new(Cursor::new("{\"event\":\"idle\"}\n"));
        let messages = spawn_reader(reader);

        run(&mut engine, &messages).expect("loop ends cleanly");

        assert!(!engine.host().quit_requested());
        assert!(
            messages
                .recv_timeout(Duration::from_millis(100))
                .is_err()
        );
    }
}
