//! Operator console plumbing for the USB CDC port.
//!
//! Bytes received from the host are assembled into lines here, handed to the
//! `pod-core` console executor, and the rendered reply is chunked back into
//! USB-sized frames. Queues between the USB task and the control task use the
//! frame type defined below.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use core::borrow::BorrowMut;
use core::fmt::{self, Write as _};
use core::str;

#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::channel::Channel;
use heapless::{String, Vec};
use pod_core::console::commands::ConsoleExecutor;
use pod_core::control::FlightControl;

/// Maximum number of bytes accepted on a single console line (excluding terminator).
pub const MAX_LINE_LEN: usize = 96;

/// Payload carried by one console frame; matches the CDC bulk packet size.
pub const CONSOLE_FRAME_CAPACITY: usize = 64;

/// Frames buffered in each direction.
pub const CONSOLE_QUEUE_DEPTH: usize = 8;

/// Rendered reply to a single console line.
pub const REPLY_CAPACITY: usize = 768;

#[cfg(target_os = "none")]
type ConsoleMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type ConsoleMutex = NoopRawMutex;

pub type ConsoleFrame = Vec<u8, CONSOLE_FRAME_CAPACITY>;
pub type ConsoleQueue = Channel<ConsoleMutex, ConsoleFrame, CONSOLE_QUEUE_DEPTH>;
pub type Reply = String<REPLY_CAPACITY>;

/// Problems detected while assembling a line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineError {
    /// The line exceeded [`MAX_LINE_LEN`]; everything up to the terminator was dropped.
    Overflow,
    InvalidUtf8,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineError::Overflow => write!(f, "line longer than {MAX_LINE_LEN} bytes"),
            LineError::InvalidUtf8 => f.write_str("line is not valid UTF-8"),
        }
    }
}

/// Collects received bytes into terminated lines.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buffer: Vec<u8, MAX_LINE_LEN>,
    discarding: bool,
}

impl LineAssembler {
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            discarding: false,
        }
    }

    /// Drops any partial line, e.g. after the host disconnects.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.discarding = false;
    }

    /// Feeds received bytes; `on_line` runs once for every completed line.
    ///
    /// Empty lines are skipped. Backspace and delete remove the last byte.
    pub fn feed<F>(&mut self, bytes: &[u8], mut on_line: F)
    where
        F: FnMut(Result<&str, LineError>),
    {
        for &byte in bytes {
            match byte {
                b'\r' | b'\n' => {
                    if self.discarding {
                        self.discarding = false;
                        on_line(Err(LineError::Overflow));
                    } else if !self.buffer.is_empty() {
                        let line = str::from_utf8(&self.buffer).map_err(|_| LineError::InvalidUtf8);
                        on_line(line);
                    }
                    self.buffer.clear();
                }
                0x08 | 0x7f => {
                    if !self.discarding {
                        self.buffer.pop();
                    }
                }
                value => {
                    if self.discarding {
                        continue;
                    }
                    if self.buffer.push(value).is_err() {
                        self.discarding = true;
                        self.buffer.clear();
                    }
                }
            }
        }
    }
}

/// Executes one assembled line and renders the outcome into `reply`.
///
/// Replies longer than [`REPLY_CAPACITY`] are cut short and marked.
pub fn respond<C>(
    console: &mut ConsoleExecutor<C>,
    line: Result<&str, LineError>,
    reply: &mut Reply,
) where
    C: BorrowMut<FlightControl>,
{
    reply.clear();
    let mut out = CrLf(reply);
    let written = match line {
        Ok(line) => match console.execute(line) {
            Ok(outcome) => writeln!(out, "{outcome}"),
            Err(error) => writeln!(out, "error: {error}"),
        },
        Err(error) => writeln!(out, "error: {error}"),
    };

    if written.is_err() {
        const MARKER: &str = "...\r\n";
        let keep = REPLY_CAPACITY - MARKER.len();
        while reply.len() > keep {
            reply.pop();
        }
        let _ = reply.push_str(MARKER);
    }
}

/// Splits a reply into frames for the USB transmit queue.
pub fn frames(reply: &str) -> impl Iterator<Item = ConsoleFrame> + '_ {
    reply
        .as_bytes()
        .chunks(CONSOLE_FRAME_CAPACITY)
        .filter_map(|chunk| ConsoleFrame::from_slice(chunk).ok())
}

/// Serial terminals expect CR LF line endings.
struct CrLf<'a>(&'a mut Reply);

impl fmt::Write for CrLf<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for (index, part) in s.split('\n').enumerate() {
            if index > 0 {
                self.0.write_str("\r\n")?;
            }
            self.0.write_str(part)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pod_core::mission::{PodCommand, PodState};

    use std::string::{String as StdString, ToString};
    use std::vec::Vec as StdVec;

    fn collect(
        assembler: &mut LineAssembler,
        bytes: &[u8],
    ) -> StdVec<Result<StdString, LineError>> {
        let mut lines = StdVec::new();
        assembler.feed(bytes, |line| lines.push(line.map(ToString::to_string)));
        lines
    }

    #[test]
    fn assembles_lines_across_packets() {
        let mut assembler = LineAssembler::new();

        assert!(collect(&mut assembler, b"sta").is_empty());
        let lines = collect(&mut assembler, b"tus\r\n\r\nhelp\n");

        assert_eq!(lines, [Ok("status".to_string()), Ok("help".to_string())]);
    }

    #[test]
    fn backspace_removes_previous_byte() {
        let mut assembler = LineAssembler::new();
        let lines = collect(&mut assembler, b"helpx\x08\x7fp\r");

        assert_eq!(lines, [Ok("help".to_string())]);
    }

    #[test]
    fn overflow_drops_the_whole_line_once() {
        let mut assembler = LineAssembler::new();
        let long = [b'a'; MAX_LINE_LEN + 10];

        assert!(collect(&mut assembler, &long).is_empty());
        let lines = collect(&mut assembler, b"\rstatus\r");

        assert_eq!(lines, [Err(LineError::Overflow), Ok("status".to_string())]);
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let mut assembler = LineAssembler::new();
        let lines = collect(&mut assembler, &[0xff, 0xfe, b'\n']);

        assert_eq!(lines, [Err(LineError::InvalidUtf8)]);
    }

    #[test]
    fn respond_drives_the_control_context() {
        let mut console = ConsoleExecutor::new(FlightControl::new());
        let mut reply = Reply::new();

        respond(&mut console, Ok("unlock idle"), &mut reply);
        respond(&mut console, Ok("execute idle"), &mut reply);

        assert!(!reply.starts_with("error"));
        assert!(reply.ends_with("\r\n"));
        assert_eq!(console.control().mission().command(), Some(PodCommand::Idle));
        assert_eq!(console.control().mission().state(), PodState::Init);
    }

    #[test]
    fn status_reply_uses_crlf_and_fits_in_frames() {
        let mut console = ConsoleExecutor::new(FlightControl::new());
        let mut reply = Reply::new();

        respond(&mut console, Ok("status"), &mut reply);

        assert!(reply.starts_with("mission state=init"));
        assert!(!reply.replace("\r\n", "").contains('\n'));
        let total: usize = frames(&reply).map(|frame| frame.len()).sum();
        assert_eq!(total, reply.len());
        assert!(frames(&reply).all(|frame| frame.len() <= CONSOLE_FRAME_CAPACITY));
    }

    #[test]
    fn errors_are_rendered_with_a_prefix() {
        let mut console = ConsoleExecutor::new(FlightControl::new());
        let mut reply = Reply::new();

        respond(&mut console, Ok("launch now"), &mut reply);
        assert!(reply.starts_with("error: "));

        respond(&mut console, Err(LineError::Overflow), &mut reply);
        assert_eq!(reply.as_str(), "error: line longer than 96 bytes\r\n");
    }
}
