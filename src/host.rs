use std::collections::VecDeque;
use std::io::{self, Read as _, Write as _};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crossbeam_channel as cbc;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers as Mod};

use crate::term;

/// Host side of the guest's I/O. The trap routines and the keyboard
/// status register read through this capability, so the machine itself
/// never touches stdin or stdout directly.
pub trait HostIo {
    /// Non-blocking check for a pending key.
    fn poll_key(&mut self) -> io::Result<Option<u8>>;
    /// Block until a key arrives. End of input reads as NUL.
    fn read_key(&mut self) -> io::Result<u8>;
    fn write(&mut self, bytes: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Interactive terminal host.
///
/// Expects the terminal to be in raw mode while the machine runs: keys
/// arrive as terminal events, and output carries its own carriage
/// returns since raw mode disables output post-processing.
pub struct Console {
    stdout: io::Stdout,
}

impl Console {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
        }
    }
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl HostIo for Console {
    fn poll_key(&mut self) -> io::Result<Option<u8>> {
        while event::poll(Duration::ZERO)? {
            if let Some(byte) = key_byte(event::read()?) {
                return Ok(Some(byte));
            }
        }
        Ok(None)
    }

    fn read_key(&mut self) -> io::Result<u8> {
        loop {
            if let Some(byte) = key_byte(event::read()?) {
                return Ok(byte);
            }
        }
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        for chunk in bytes.split_inclusive(|&byte| byte == b'\n') {
            match chunk.split_last() {
                Some((&b'\n', rest)) => {
                    self.stdout.write_all(rest)?;
                    self.stdout.write_all(b"\r\n")?;
                }
                _ => self.stdout.write_all(chunk)?,
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }
}

/// Map a terminal event to the byte the guest sees. Events with no byte
/// representation (releases, arrows, non-ASCII input) are dropped.
fn key_byte(event: Event) -> Option<u8> {
    let Event::Key(key) = event else { return None };
    if matches!(key.kind, KeyEventKind::Release) {
        return None;
    }

    match (key.modifiers, key.code) {
        // Raw mode swallows SIGINT, so the host abort starts here
        (Mod::CONTROL, KeyCode::Char('c')) => term::interrupt(),

        (Mod::NONE | Mod::SHIFT, KeyCode::Char(ch)) if ch.is_ascii() => Some(ch as u8),
        (_, KeyCode::Enter) => Some(b'\n'),
        (_, KeyCode::Backspace) => Some(0x08),
        (_, KeyCode::Tab) => Some(b'\t'),
        (_, KeyCode::Esc) => Some(0x1B),

        _ => None,
    }
}

/// Host for piped or redirected stdin.
///
/// A reader thread drains stdin into a channel so the keyboard status
/// register can be polled without blocking. A closed channel means stdin
/// reached end of input.
pub struct Piped {
    keys: cbc::Receiver<u8>,
    stdout: io::Stdout,
}

impl Piped {
    pub fn spawn() -> Self {
        let (tx, rx) = cbc::unbounded();
        thread::spawn(move || {
            let mut stdin = io::stdin();
            let mut buf = [0u8; 1];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {
                        if tx.send(buf[0]).is_err() {
                            break;
                        }
                    }
                }
            }
        });
        Self {
            keys: rx,
            stdout: io::stdout(),
        }
    }
}

impl HostIo for Piped {
    fn poll_key(&mut self) -> io::Result<Option<u8>> {
        Ok(self.keys.try_recv().ok())
    }

    fn read_key(&mut self) -> io::Result<u8> {
        Ok(self.keys.recv().unwrap_or(0))
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.stdout.write_all(bytes)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stdout.flush()
    }
}

/// In-memory host for tests and embedders.
///
/// Input and output live behind shared handles, so a clone kept by the
/// caller observes everything the machine reads and writes.
#[derive(Clone, Default)]
pub struct BufferedHost {
    input: Arc<Mutex<VecDeque<u8>>>,
    output: Arc<Mutex<Vec<u8>>>,
}

impl BufferedHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for the guest to read.
    pub fn push_input(&self, bytes: &[u8]) {
        self.input
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .extend(bytes);
    }

    /// Snapshot of everything the guest has written so far.
    pub fn output(&self) -> Vec<u8> {
        self.output
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }
}

impl HostIo for BufferedHost {
    fn poll_key(&mut self) -> io::Result<Option<u8>> {
        Ok(self
            .input
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .pop_front())
    }

    fn read_key(&mut self) -> io::Result<u8> {
        Ok(self
            .input
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .pop_front()
            .unwrap_or(0))
    }

    fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.output
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
