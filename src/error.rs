use std::io;
use std::path::Path;

use miette::{miette, Report, Severity};

// Image load errors

pub fn image_open(path: &Path, err: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::open",
        help = "check that the path exists and is readable",
        "Cannot open image file '{}': {err}",
        path.display(),
    )
}

pub fn image_truncated(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::truncated",
        help = "a valid image starts with a 16-bit big-endian load address",
        "Image file '{}' is shorter than an origin word",
        path.display(),
    )
}

pub fn image_empty(path: &Path) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::empty",
        help = "an image must contain at least one word after the origin",
        "Image file '{}' has no payload",
        path.display(),
    )
}

pub fn image_odd_length(path: &Path, len: usize) -> Report {
    miette!(
        severity = Severity::Error,
        code = "image::odd_length",
        help = "images are a sequence of 16-bit big-endian words",
        "Image file '{}' ends mid-word at {len} bytes",
        path.display(),
    )
}

// Execution errors

pub fn exec_illegal(opcode: u16, addr: u16) -> Report {
    miette!(
        severity = Severity::Error,
        code = "exec::illegal",
        help = "RTI and the reserved opcode are not supported by this machine",
        "Illegal opcode {opcode:#X} at {addr:#06X}",
    )
}

pub fn exec_unknown_trap(vect: u16, addr: u16) -> Report {
    miette!(
        severity = Severity::Error,
        code = "exec::trap",
        help = "valid trap vectors are 0x20 through 0x25",
        "Unknown trap vector {vect:#04X} at {addr:#06X}",
    )
}

pub fn exec_host_io(err: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "exec::host_io",
        help = "the terminal may have closed mid-write",
        "Error writing program output: {err}",
    )
}

// Terminal errors

pub fn term_raw(err: io::Error) -> Report {
    miette!(
        severity = Severity::Error,
        code = "term::raw",
        help = "the emulator needs an unbuffered, echo-free terminal for keyboard input",
        "Failed to put the terminal into raw mode: {err}",
    )
}
