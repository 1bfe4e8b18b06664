//! Line-driven audio helper: `muzak-helper <track> <volume>`.
//!
//! Loads the track once, loops it forever, and obeys newline-terminated
//! commands on stdin: `play`, `pause`, `stop`. EOF behaves like `stop`.
//! Pausing goes through the rodio sink so it is sample-accurate; the daemon
//! never suspends this process with signals. Diagnostics go to stderr;
//! stdout is unused. A track that fails to load aborts with a non-zero exit
//! before the command loop starts.

use std::env;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use rodio::source::Source;
use rodio::{Decoder, OutputStreamBuilder, Sink};

fn main() -> ExitCode {
    let mut args = env::args().skip(1);
    let (Some(track), Some(volume)) = (args.next(), args.next()) else {
        eprintln!("usage: muzak-helper <track> <volume>");
        return ExitCode::from(2);
    };

    let track = PathBuf::from(track);
    let volume: f32 = volume.parse().unwrap_or(0.5);

    match run(&track, volume.clamp(0.0, 1.0)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("muzak-helper: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(track: &Path, volume: f32) -> Result<()> {
    let file =
        File::open(track).with_context(|| format!("failed to open track {:?}", track))?;

    let stream = OutputStreamBuilder::open_default_stream()
        .context("failed to open audio output stream")?;
    let sink = Sink::connect_new(stream.mixer());

    let source = Decoder::new(BufReader::new(file))
        .with_context(|| format!("failed to decode track {:?}", track))?;

    sink.set_volume(volume);
    sink.append(source.repeat_infinite());
    // Loaded but silent until the first `play`
    sink.pause();

    for line in io::stdin().lock().lines() {
        let Ok(line) = line else { break };
        match line.trim() {
            "play" => sink.play(),
            "pause" => sink.pause(),
            "stop" => break,
            _ => {}
        }
    }

    sink.stop();
    Ok(())
}
