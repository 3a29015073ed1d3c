//! Table dump: every distinct PAT and PMT section found in a stream

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::Read;

use log::debug;
use serde::Serialize;

use crate::constants::PAT_PID;
use crate::crc32::validate_section_crc;
use crate::error::TsError;
use crate::packet::PacketReader;
use crate::psi::{PatDecoder, PatSection, PmtDecoder, PmtSection, SectionHeader};
use crate::types::StreamType;
use crate::Result;

/// One decoded PAT section
#[derive(Debug, Clone, Serialize)]
pub struct PatEntry {
    pub pid: u16,
    pub crc_ok: bool,
    pub section: PatSection,
}

/// One decoded PMT section
#[derive(Debug, Clone, Serialize)]
pub struct PmtEntry {
    pub pid: u16,
    pub crc_ok: bool,
    pub section: PmtSection,
}

/// Every distinct table section, in order of first appearance
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableReport {
    pub packets: u64,
    pub pats: Vec<PatEntry>,
    pub pmts: Vec<PmtEntry>,
}

impl TableReport {
    /// Pretty-printed JSON for CLI output
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self)
            .unwrap_or_else(|_| "{\"error\": \"JSON serialization failed\"}".to_string())
    }
}

/// Scan the whole input. A repeating table is reported once; a new version
/// or a changed section shows up as its own entry.
pub fn collect_tables<R: Read>(reader: &mut PacketReader<R>) -> Result<TableReport> {
    let mut report = TableReport::default();
    let mut seen: HashSet<(u16, Vec<u8>)> = HashSet::new();
    let mut pat_decoder = PatDecoder::new();
    let mut pmt_decoders: HashMap<u16, PmtDecoder> = HashMap::new();

    loop {
        let packet = match reader.read_packet() {
            Ok(p) => p,
            Err(TsError::EndOfStream) => break,
            Err(e) => return Err(e),
        };
        report.packets += 1;

        if packet.pid == PAT_PID {
            pat_decoder.submit_raw(&packet, |pat, raw| {
                for assoc in pat.programs() {
                    pmt_decoders.entry(assoc.pid).or_insert_with(|| {
                        debug!("tables: tracking PMT pid {:#06x}", assoc.pid);
                        PmtDecoder::new()
                    });
                }
                if seen.insert((PAT_PID, raw.to_vec())) {
                    report.pats.push(PatEntry {
                        pid: PAT_PID,
                        crc_ok: validate_section_crc(raw),
                        section: pat,
                    });
                }
            });
        } else if let Some(decoder) = pmt_decoders.get_mut(&packet.pid) {
            let pid = packet.pid;
            decoder.submit_raw(&packet, |pmt, raw| {
                if seen.insert((pid, raw.to_vec())) {
                    report.pmts.push(PmtEntry {
                        pid,
                        crc_ok: validate_section_crc(raw),
                        section: pmt,
                    });
                }
            });
        }
    }

    debug!(
        "tables: {} packets, {} PAT and {} PMT sections",
        report.packets,
        report.pats.len(),
        report.pmts.len()
    );
    Ok(report)
}

fn write_header(f: &mut fmt::Formatter<'_>, h: &SectionHeader) -> fmt::Result {
    writeln!(f, "table id: {}", h.table_id)?;
    writeln!(f, "transport stream id: {}", h.transport_stream_id)?;
    writeln!(f, "version number: {}", h.version)?;
    writeln!(f, "current next: {}", h.current_next)?;
    writeln!(f, "section number: {}", h.section_number)?;
    writeln!(f, "last section number: {}", h.last_section_number)
}

fn write_descriptors<'a>(
    f: &mut fmt::Formatter<'_>,
    descriptors: impl Iterator<Item = (u8, &'a [u8])>,
) -> fmt::Result {
    writeln!(f, "descriptors:")?;
    for (tag, body) in descriptors {
        writeln!(f, "  tag {tag:#04x} ({} bytes)", body.len())?;
    }
    Ok(())
}

impl fmt::Display for PatEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PAT [pid] {} crc {}", self.pid, crc_label(self.crc_ok))?;
        write_header(f, &self.section.header)?;
        writeln!(f, "associations:")?;
        for a in &self.section.associations {
            writeln!(f, "[pn] {} => [pid] {}", a.program_number, a.pid)?;
        }
        Ok(())
    }
}

impl fmt::Display for PmtEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pmt = &self.section;
        writeln!(f, "PMT [pid] {} crc {}", self.pid, crc_label(self.crc_ok))?;
        write_header(f, &pmt.header)?;
        writeln!(f, "PCR PID: {}", pmt.pcr_pid)?;
        write_descriptors(f, pmt.program_info.iter())?;
        writeln!(f, "stream info:")?;
        for s in &pmt.streams {
            let kind: StreamType = s.kind();
            writeln!(f, "stream type: {} ({})", s.stream_type, kind.name())?;
            writeln!(f, "elementary PID: {}", s.elementary_pid)?;
            write_descriptors(f, s.es_info.iter())?;
        }
        Ok(())
    }
}

impl fmt::Display for TableReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pat in &self.pats {
            writeln!(f, "{pat}")?;
        }
        for pmt in &self.pmts {
            writeln!(f, "{pmt}")?;
        }
        Ok(())
    }
}

fn crc_label(ok: bool) -> &'static str {
    if ok { "ok" } else { "BAD" }
}
