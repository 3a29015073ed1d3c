// src/lib.rs
pub mod tools {
    use std::io::Write;
    use std::path::PathBuf;

    use crate::delay::AvDelay;
    use crate::packet::PacketReader;
    use crate::report::TableReport;
    use crate::source::{open_input, open_output};
    use crate::split::FilterStats;

    /// `None` stands for stdin/stdout throughout
    pub struct SplitOptions {
        pub input: Option<PathBuf>,
        pub output: Option<PathBuf>,
    }

    pub struct DelayOptions {
        pub input: Option<PathBuf>,
    }

    pub struct TablesOptions {
        pub input: Option<PathBuf>,
        pub json: bool,
    }

    /// Keep only PIDs referenced by the PAT/PMTs and rewrite the PAT to match
    pub fn split(opts: SplitOptions) -> crate::Result<FilterStats> {
        let input = open_input(opts.input.as_deref())?;
        let mut output = open_output(opts.output.as_deref())?;
        crate::split::split(input, &mut output)
    }

    /// Measure how far video presentation lags audio in the first program
    pub fn delay(opts: DelayOptions) -> crate::Result<AvDelay> {
        let input = open_input(opts.input.as_deref())?;
        crate::delay::measure_delay(input)
    }

    /// Collect and print every distinct PAT/PMT section
    pub fn tables(opts: TablesOptions) -> crate::Result<TableReport> {
        let input = open_input(opts.input.as_deref())?;
        let report = crate::report::collect_tables(&mut PacketReader::new(input))?;

        let mut out = open_output(None)?;
        if opts.json {
            writeln!(out, "{}", report.to_json())?;
        } else {
            write!(out, "{report}")?;
        }
        out.flush()?;
        Ok(report)
    }
}

pub mod constants;
pub mod crc32;
pub mod delay;
pub mod error;
pub mod packet;
pub mod pes;
pub mod psi;
pub mod report;
pub mod source;
pub mod split;
pub mod types;

pub use error::TsError;

pub type Result<T> = std::result::Result<T, TsError>;
