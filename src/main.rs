use std::io::IsTerminal as _;
use std::path::PathBuf;

use clap::Parser;
use colored::Colorize;
use miette::Result;

use weft::host::{Console, HostIo, Piped};
use weft::image::Image;
use weft::runtime::{RunState, PC_START};
use weft::term::RawMode;

/// Weft is a speedy & convenient emulator for LC3 machine code.
#[derive(Parser)]
#[command(version)]
struct Args {
    /// `.obj` images to load into memory before execution
    #[arg(required = true, value_name = "IMAGE")]
    images: Vec<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut images = Vec::with_capacity(args.images.len());
    for path in &args.images {
        println!("{:>12} image {}", "Loading".green().bold(), path.display());
        images.push(Image::open(path)?);
    }

    // Interactive terminals get raw-mode key events; piped stdin is
    // drained by a reader thread instead.
    let io: Box<dyn HostIo> = if std::io::stdin().is_terminal() {
        Box::new(Console::new())
    } else {
        Box::new(Piped::spawn())
    };

    let mut state = RunState::new(io);
    for image in &images {
        state.load_image(image.origin, &image.words);
    }

    println!("{:>12} at {:#06X}", "Running".green().bold(), PC_START);
    {
        // Restored on every exit path out of this scope
        let _raw = RawMode::enable()?;
        state.run()?;
    }
    println!(
        "{:>12} after {} instructions",
        "Completed".green().bold(),
        state.instructions_run()
    );
    Ok(())
}
