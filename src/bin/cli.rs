use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use mpegts_tools::tools::{self, DelayOptions, SplitOptions, TablesOptions};

#[derive(Parser)]
#[clap(version, about = "MPEG-TS stream tools")]
struct Opt {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Drop PIDs not referenced by the PAT/PMTs (one-segment excluded)
    Split {
        /// Input file, `-` or omitted for stdin
        input: Option<PathBuf>,
        /// Output file, `-` or omitted for stdout
        output: Option<PathBuf>,
    },
    /// Print the audio-to-video PTS delay of the first program in seconds
    Delay {
        /// Log discovery and PTS decisions to stderr
        #[clap(long, default_value_t = false)]
        debug: bool,
        input: Option<PathBuf>,
    },
    /// Dump every distinct PAT and PMT section
    Tables {
        #[clap(long, default_value_t = false)]
        json: bool,
        input: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let opt = Opt::parse();

    let debug = matches!(opt.command, Command::Delay { debug: true, .. });
    logger(std::env::var("RUST_LOG").ok().as_deref(), debug).init();

    match opt.command {
        Command::Split { input, output } => {
            let label = describe(&input);
            tools::split(SplitOptions { input, output })
                .with_context(|| format!("split failed on {label}"))?;
        }
        Command::Delay { input, .. } => {
            let label = describe(&input);
            let delay = tools::delay(DelayOptions { input })
                .with_context(|| format!("delay failed on {label}"))?;
            println!("{:.6}", delay.seconds());
        }
        Command::Tables { json, input } => {
            let label = describe(&input);
            tools::tables(TablesOptions { input, json })
                .with_context(|| format!("tables failed on {label}"))?;
        }
    }
    Ok(())
}

/// `RUST_LOG` directives (default `warn`); `--debug` lifts this crate to
/// debug on top of them
fn logger(filters: Option<&str>, debug: bool) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    match filters {
        Some(f) => builder.parse_filters(f),
        None => builder.filter_level(LevelFilter::Warn),
    };
    if debug {
        builder.filter_module("mpegts_tools", LevelFilter::Debug);
    }
    builder
}

fn describe(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) if p.as_os_str() != "-" => p.display().to_string(),
        _ => "stdin".to_string(),
    }
}
