//! Console transport: replies are written as lines to a writer.

use std::io::{self, Write};

use parking_lot::Mutex;
use parley_commands::{DeliveryError, HelpDocument, MessageSink};

/// Writes deliveries as `#channel text` lines.
pub struct ConsoleSink<W: Write + Send> {
    out: Mutex<W>,
}

impl ConsoleSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out.into_inner()
    }

    fn write(&self, channel_id: &str, body: &str) -> Result<(), DeliveryError> {
        let mut out = self.out.lock();
        let result = body
            .lines()
            .try_for_each(|line| writeln!(out, "#{channel_id} {line}"))
            .and_then(|()| out.flush());
        result.map_err(|e| DeliveryError::new(channel_id, e.to_string()))
    }
}

impl<W: Write + Send> MessageSink for ConsoleSink<W> {
    fn send_text(&self, channel_id: &str, text: &str) -> Result<(), DeliveryError> {
        self.write(channel_id, text)
    }

    fn send_help(&self, channel_id: &str, help: &HelpDocument) -> Result<(), DeliveryError> {
        self.write(channel_id, help.to_string().trim_end())
    }
}
