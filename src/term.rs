use std::io::{self, IsTerminal as _, Write as _};

use crossterm::terminal;
use miette::Result;

use crate::error;

/// Scoped raw-mode acquisition.
///
/// Construction puts the terminal into raw mode (line buffering and echo
/// off); dropping restores the original mode on every exit path. When
/// stdin is not a terminal the guard does nothing, so piped runs and
/// tests need no tty.
pub struct RawMode {
    active: bool,
}

impl RawMode {
    pub fn enable() -> Result<Self> {
        if !io::stdin().is_terminal() {
            return Ok(Self { active: false });
        }
        terminal::enable_raw_mode().map_err(error::term_raw)?;
        Ok(Self { active: true })
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if self.active {
            // No means to repair if restoration itself fails
            let _ = terminal::disable_raw_mode();
        }
    }
}

/// Orderly shutdown on a host interrupt (Ctrl+C): restore the terminal,
/// finish the current output line, and leave.
pub fn interrupt() -> ! {
    if terminal::is_raw_mode_enabled().is_ok_and(|is| is) {
        let _ = terminal::disable_raw_mode();
    }
    let mut stdout = io::stdout();
    let _ = stdout.write_all(b"\n");
    let _ = stdout.flush();
    std::process::exit(-2);
}
