//! Byte-at-a-time framing of ELM327 responses, terminated by the `>`
//! prompt character.
//!
//! Generalized over `T: Read + Write` rather than a concrete serial
//! port type, so the bring-up and service layers can be exercised
//! against an in-memory cursor instead of real hardware.

use crate::error::ObdError;
use crate::notifier::{LogNotifier, Notifier, LEVEL_WIRE};
use std::io::{Read, Write};

/// Reads and writes ELM327 command/response text over any
/// `Read + Write` transport (a real serial port in production, an
/// in-memory buffer in tests).
pub struct SerialLine<T: Read + Write> {
    port: T,
    notifier: Box<dyn Notifier>,
}

impl<T: Read + Write> SerialLine<T> {
    /// Wrap a transport with the default logging notifier.
    pub fn new(port: T) -> Self {
        Self { port, notifier: Box::new(LogNotifier) }
    }

    /// Forward a debug event to this line's notifier. Exposed so
    /// higher-level session/service code can share the same sink
    /// without holding a second notifier instance.
    pub fn notify(&self, level: u8, message: &str) {
        self.notifier.debug(level, message);
    }

    /// Send a command, appending the trailing carriage return the
    /// ELM327 expects to terminate a command line.
    pub fn send(&mut self, command: &str) -> Result<(), ObdError> {
        self.notifier.debug(LEVEL_WIRE, &format!("SEND {}", command));
        self.port.write_all(command.as_bytes())?;
        self.port.write_all(b"\r")?;
        self.port.flush()?;
        Ok(())
    }

    /// Read one response block: lines up to (but not including) the
    /// `>` prompt character. Blank lines (bare `\r`/`\n`) are dropped.
    /// Returns `None` if nothing at all was read before the stream
    /// ended.
    pub fn read_block(&mut self) -> Result<Option<Vec<String>>, ObdError> {
        let mut buffer = String::new();
        let mut lines = Vec::new();
        let mut byte = [0u8; 1];

        loop {
            let n = self.port.read(&mut byte)?;
            if n == 0 {
                break;
            }
            let c = byte[0] as char;

            if c == '>' {
                break;
            }
            if c == '\r' || c == '\n' {
                if !buffer.is_empty() {
                    self.notifier.debug(LEVEL_WIRE, &format!("RECV {}", buffer));
                    lines.push(std::mem::take(&mut buffer));
                }
            } else {
                buffer.push(c);
            }
        }

        if !buffer.is_empty() {
            self.notifier.debug(LEVEL_WIRE, &format!("RECV {}", buffer));
            lines.push(buffer);
        }

        if lines.is_empty() {
            Ok(None)
        } else {
            Ok(Some(lines))
        }
    }

    /// Send a command and read back its response block in one step.
    pub fn query(&mut self, command: &str) -> Result<Option<Vec<String>>, ObdError> {
        self.send(command)?;
        self.read_block()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// An in-memory transport: writes go nowhere, reads come from a
    /// fixed byte buffer, simulating a canned ELM327 response.
    struct Fixture {
        reply: Cursor<Vec<u8>>,
        sent: Vec<u8>,
    }

    impl Fixture {
        fn new(reply: &str) -> Self {
            Self { reply: Cursor::new(reply.as_bytes().to_vec()), sent: Vec::new() }
        }
    }

    impl Read for Fixture {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.reply.read(buf)
        }
    }

    impl Write for Fixture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.sent.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn read_block_splits_on_cr_and_stops_at_prompt() {
        let fixture = Fixture::new("41 00 BE 1F A8 13\r\r>");
        let mut line = SerialLine::new(fixture);
        let block = line.read_block().unwrap().unwrap();
        assert_eq!(block, vec!["41 00 BE 1F A8 13".to_string()]);
    }

    #[test]
    fn read_block_returns_none_on_empty_stream() {
        let fixture = Fixture::new("");
        let mut line = SerialLine::new(fixture);
        assert!(line.read_block().unwrap().is_none());
    }

    #[test]
    fn read_block_collects_multiple_lines_for_multi_ecu_response() {
        let fixture = Fixture::new("7E8 06 41 00 BE 1F A8 13\r7E9 06 41 00 98 18 80 10\r\r>");
        let mut line = SerialLine::new(fixture);
        let block = line.read_block().unwrap().unwrap();
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn send_appends_carriage_return() {
        let fixture = Fixture::new(">");
        let mut line = SerialLine::new(fixture);
        line.send("0100").unwrap();
        assert_eq!(line.port.sent, b"0100\r");
    }
}
