//! JSON-lines event output.

use std::io::{self, Write};

use presage_core::Event;
use serde_json::{Map, Value};

/// Where presence transitions and status lines go. The consumer reads one
/// JSON object per line, a single-key envelope `{<name>: <payload>}`.
pub trait EventSink: Send {
    fn send(&mut self, name: &str, payload: Value) -> io::Result<()>;

    fn status(&mut self, message: &str) -> io::Result<()> {
        self.send("status", Value::String(message.to_string()))
    }

    fn event(&mut self, event: &Event) -> io::Result<()> {
        self.send(event.name(), event.payload())
    }
}

/// Writes each message as one line of JSON, flushed immediately so the
/// consumer on the other side of the pipe sees events as they happen.
pub struct JsonLineSink<W: Write> {
    out: W,
}

impl JsonLineSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> JsonLineSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> EventSink for JsonLineSink<W> {
    fn send(&mut self, name: &str, payload: Value) -> io::Result<()> {
        let mut envelope = Map::new();
        envelope.insert(name.to_string(), payload);
        serde_json::to_writer(&mut self.out, &Value::Object(envelope))?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

/// Shared-handle sink for tests: clones record into the same buffer, so a
/// test can keep a handle while the driver owns the other.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub(crate) struct RecordingSink {
    messages: std::sync::Arc<std::sync::Mutex<Vec<(String, Value)>>>,
}

#[cfg(test)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<(String, Value)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[cfg(test)]
impl EventSink for RecordingSink {
    fn send(&mut self, name: &str, payload: Value) -> io::Result<()> {
        self.messages
            .lock()
            .unwrap()
            .push((name.to_string(), payload));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presage_core::{Identity, UserId};
    use serde_json::json;

    fn lines(buf: &[u8]) -> Vec<Value> {
        std::str::from_utf8(buf)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_each_message_is_one_json_line() {
        let mut sink = JsonLineSink::new(Vec::new());
        sink.status("Presence watcher started...").unwrap();
        sink.event(&Event::MotionDetected).unwrap();
        let written = lines(&sink.into_inner());
        assert_eq!(
            written,
            vec![
                json!({ "status": "Presence watcher started..." }),
                json!({ "motion-detected": {} }),
            ]
        );
    }

    #[test]
    fn test_login_envelope_carries_user_and_confidence() {
        let mut sink = JsonLineSink::new(Vec::new());
        let user = Identity::Known(UserId::from_label(5).unwrap());
        sink.event(&Event::Login {
            user,
            confidence: Some(67.25),
        })
        .unwrap();
        let written = lines(&sink.into_inner());
        assert_eq!(
            written,
            vec![json!({ "login": { "user": 5, "confidence": 67.25 } })]
        );
    }

    #[test]
    fn test_unknown_login_envelope() {
        let mut sink = JsonLineSink::new(Vec::new());
        sink.event(&Event::Login {
            user: Identity::Unknown,
            confidence: None,
        })
        .unwrap();
        let written = lines(&sink.into_inner());
        assert_eq!(
            written,
            vec![json!({ "login": { "user": 0, "confidence": null } })]
        );
    }

    #[test]
    fn test_recording_sink_shares_buffer_across_clones() {
        let sink = RecordingSink::new();
        let mut handle = sink.clone();
        handle.status("hello").unwrap();
        assert_eq!(sink.names(), vec!["status".to_string()]);
    }
}
