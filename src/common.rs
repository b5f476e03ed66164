// Licensed under the Apache-2.0 license

//! Crate-wide helpers shared by the I2C target modules.

/// Minimal logging sink used by the register slave.
///
/// Controllers take a logger as a generic parameter defaulting to
/// [`NoOpLogger`], so builds without a console pay nothing for it.
pub trait Logger {
    fn debug(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Logger that drops every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

/// Logger writing one line per message to any `embedded-io` sink (UART, RTT, ...).
///
/// Output is best effort: a failing sink never disturbs the caller.
pub struct WriterLogger<W: embedded_io::Write> {
    writer: W,
}

impl<W: embedded_io::Write> WriterLogger<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Give the underlying sink back.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn line(&mut self, level: &str, msg: &str) {
        let _ = self.writer.write_all(level.as_bytes());
        let _ = self.writer.write_all(msg.as_bytes());
        let _ = self.writer.write_all(b"\r\n");
    }
}

impl<W: embedded_io::Write> Logger for WriterLogger<W> {
    fn debug(&mut self, msg: &str) {
        self.line("[DEBUG] ", msg);
    }

    fn error(&mut self, msg: &str) {
        self.line("[ERROR] ", msg);
    }
}
