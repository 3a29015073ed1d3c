//! PID filter: keep the PIDs referenced by the PAT and its PMTs, drop
//! everything else, and rewrite the PAT so it only announces kept programs.

use std::collections::HashMap;
use std::io::{Read, Write};

use log::{debug, warn};

use crate::constants::{CRC32_SIZE, ONESEG_PID, PAT_PID, PSI_HEADER_SIZE, STUFFING_BYTE};
use crate::crc32::crc32;
use crate::error::TsError;
use crate::packet::{Continuity, PacketReader, TsPacket};
use crate::psi::section::{read_length, read_pid};
use crate::psi::{PatDecoder, PatSection, PmtDecoder, PmtSection};
use crate::source::Recorder;
use crate::types::PidSet;
use crate::Result;

/// Result of the discovery pass
#[derive(Debug, Default, Clone)]
pub struct Discovery {
    /// Every PMT PID announced by a PAT (one-segment excluded)
    pub pmt_pids: PidSet,
    /// PMT PIDs whose table has been decoded at least once
    pub resolved: PidSet,
    /// PIDs passed through by the filter
    pub keep: PidSet,
}

impl Discovery {
    fn on_pat(&mut self, pat: &PatSection, pmt_decoders: &mut HashMap<u16, PmtDecoder>) {
        for assoc in &pat.associations {
            if assoc.is_network() {
                self.keep.insert(assoc.pid);
            } else if assoc.pid != ONESEG_PID && self.pmt_pids.insert(assoc.pid) {
                debug!("program {} -> PMT pid {:#06x}", assoc.program_number, assoc.pid);
                pmt_decoders.entry(assoc.pid).or_default();
            }
        }
    }

    fn on_pmt(&mut self, pmt_pid: u16, pmt: &PmtSection) {
        if self.resolved.contains(pmt_pid) {
            return;
        }
        self.keep.insert(pmt_pid);
        self.keep.insert(pmt.pcr_pid);
        for stream in &pmt.streams {
            self.keep.insert(stream.elementary_pid);
        }
        self.resolved.insert(pmt_pid);
        debug!(
            "PMT {pmt_pid:#06x}: pcr {:#06x}, {} streams",
            pmt.pcr_pid,
            pmt.streams.len()
        );
    }

    /// Every registered PMT has been seen
    pub fn is_complete(&self) -> bool {
        !self.pmt_pids.is_empty() && self.pmt_pids.len() == self.resolved.len()
    }
}

/// Read packets until every PMT announced by the PAT has been decoded once.
pub fn discover<R: Read>(reader: &mut PacketReader<R>) -> Result<Discovery> {
    let mut discovery = Discovery::default();
    let mut pat_decoder = PatDecoder::new();
    let mut pmt_decoders: HashMap<u16, PmtDecoder> = HashMap::new();

    loop {
        let packet = match reader.read_packet() {
            Ok(p) => p,
            Err(TsError::EndOfStream) => {
                return Err(TsError::Discovery("input ended before every PMT was seen"));
            }
            Err(e) => return Err(e),
        };

        if packet.pid == PAT_PID {
            pat_decoder.submit(&packet, |pat| discovery.on_pat(&pat, &mut pmt_decoders));
        }
        if let Some(decoder) = pmt_decoders.get_mut(&packet.pid) {
            let pid = packet.pid;
            decoder.submit(&packet, |pmt| discovery.on_pmt(pid, &pmt));
        }

        if discovery.is_complete() {
            return Ok(discovery);
        }
    }
}

/// Where the section starts and ends in a PAT payload run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PatSpan {
    /// `data[head..end]` is the whole section
    Complete { head: usize, end: usize },
    /// Continuation packets are still needed
    Partial,
    Invalid,
}

fn pat_span(data: &[u8], first_len: usize) -> PatSpan {
    let Some(&pointer) = data.first() else {
        return PatSpan::Invalid;
    };
    let head = 1 + pointer as usize;
    if head >= first_len {
        return PatSpan::Invalid;
    }
    if head + 3 > data.len() {
        return PatSpan::Partial;
    }
    let length = read_length(&data[head + 1..head + 3]);
    if length < PSI_HEADER_SIZE - 3 + CRC32_SIZE {
        return PatSpan::Invalid;
    }
    let end = head + 3 + length;
    if end > data.len() {
        PatSpan::Partial
    } else {
        PatSpan::Complete { head, end }
    }
}

/// Compact the PAT in `packet` to the network entry plus entries whose PID
/// is in `pmt_pids`, then fix up section_length, CRC and stuffing in place.
///
/// Returns false (packet untouched) when the payload does not start a
/// section or the section does not fit in this packet.
pub fn rewrite_pat(packet: &mut TsPacket, pmt_pids: &PidSet) -> bool {
    rewrite_pat_packets(std::slice::from_mut(packet), pmt_pids)
}

/// Same as [`rewrite_pat`] for a section carried by a start packet and its
/// continuations. The rewritten section is laid back over the same payloads
/// and everything after it becomes stuffing.
pub fn rewrite_pat_packets(packets: &mut [TsPacket], pmt_pids: &PidSet) -> bool {
    let Some(first) = packets.first() else {
        return false;
    };
    if !first.payload_unit_start {
        warn!("PAT packet without payload_unit_start, passing through");
        return false;
    }
    let first_len = first.payload().len();
    let mut data: Vec<u8> = packets
        .iter()
        .flat_map(|p| p.payload().iter().copied())
        .collect();
    let (head, section_end) = match pat_span(&data, first_len) {
        PatSpan::Complete { head, end } => (head, end),
        span => {
            warn!("PAT section incomplete or malformed ({span:?}), passing through");
            return false;
        }
    };

    let entries_end = section_end - CRC32_SIZE;
    let mut out = head + PSI_HEADER_SIZE;
    let mut pos = out;
    while pos + 4 <= entries_end {
        let program_number = u16::from_be_bytes([data[pos], data[pos + 1]]);
        let pid = read_pid(&data[pos + 2..pos + 4]);
        if program_number == 0 || pmt_pids.contains(pid) {
            if pos != out {
                data.copy_within(pos..pos + 4, out);
            }
            out += 4;
        } else {
            debug!("PAT: dropping program {program_number} (pid {pid:#06x})");
        }
        pos += 4;
    }

    let new_length = out + CRC32_SIZE - (head + 3);
    data[head + 1] = (data[head + 1] & 0xF0) | ((new_length >> 8) as u8 & 0x0F);
    data[head + 2] = new_length as u8;

    let crc = crc32(&data[head..out]);
    data[out..out + CRC32_SIZE].copy_from_slice(&crc.to_be_bytes());
    data[out + CRC32_SIZE..].fill(STUFFING_BYTE);

    let mut offset = 0;
    for packet in packets.iter_mut() {
        let payload = packet.payload_mut();
        let n = payload.len();
        payload.copy_from_slice(&data[offset..offset + n]);
        offset += n;
    }
    true
}

/// Counters from the filtering pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FilterStats {
    pub packets_read: u64,
    pub packets_written: u64,
    pub pats_rewritten: u64,
}

/// Start packet plus continuations of a PAT section that spans packets
#[derive(Debug, Default)]
struct PendingPat {
    packets: Vec<TsPacket>,
}

impl PendingPat {
    fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Accepts the next in-order, error-free continuation
    fn accepts(&self, packet: &TsPacket) -> bool {
        match self.packets.last() {
            Some(last) => {
                !packet.payload_unit_start
                    && !packet.transport_error
                    && packet.continuity_after(last.continuity_counter) == Continuity::Next
            }
            None => false,
        }
    }

    fn span(&self) -> PatSpan {
        let Some(first) = self.packets.first() else {
            return PatSpan::Invalid;
        };
        let data: Vec<u8> = self
            .packets
            .iter()
            .flat_map(|p| p.payload().iter().copied())
            .collect();
        pat_span(&data, first.payload().len())
    }
}

fn emit<W: Write>(out: &mut W, packets: &[TsPacket], stats: &mut FilterStats) -> Result<()> {
    for packet in packets {
        out.write_all(packet.raw())?;
        stats.packets_written += 1;
    }
    Ok(())
}

fn flush_pending<W: Write>(
    pending: &mut PendingPat,
    out: &mut W,
    stats: &mut FilterStats,
) -> Result<()> {
    if !pending.is_empty() {
        warn!(
            "PAT section over {} packets never completed, passing through",
            pending.packets.len()
        );
        emit(out, &pending.packets, stats)?;
        pending.packets.clear();
    }
    Ok(())
}

/// Emit the kept packets of `reader` into `out`, rewriting every PAT.
/// A PAT section spanning several packets is held back until complete.
pub fn filter<R: Read, W: Write>(
    discovery: &Discovery,
    reader: &mut PacketReader<R>,
    out: &mut W,
) -> Result<FilterStats> {
    let mut stats = FilterStats::default();
    let mut pending = PendingPat::default();
    loop {
        let mut packet = match reader.read_packet() {
            Ok(p) => p,
            Err(TsError::EndOfStream) => break,
            Err(e) => return Err(e),
        };
        stats.packets_read += 1;

        if packet.pid != PAT_PID {
            if discovery.keep.contains(packet.pid) {
                emit(out, std::slice::from_ref(&packet), &mut stats)?;
            }
            continue;
        }

        if pending.accepts(&packet) {
            pending.packets.push(packet);
        } else {
            flush_pending(&mut pending, out, &mut stats)?;
            if packet.payload_unit_start
                && !packet.transport_error
                && pat_span(packet.payload(), packet.payload().len()) == PatSpan::Partial
            {
                pending.packets.push(packet);
                continue;
            }
            if rewrite_pat(&mut packet, &discovery.pmt_pids) {
                stats.pats_rewritten += 1;
            }
            emit(out, std::slice::from_ref(&packet), &mut stats)?;
            continue;
        }

        match pending.span() {
            PatSpan::Partial => {}
            PatSpan::Complete { .. } => {
                if rewrite_pat_packets(&mut pending.packets, &discovery.pmt_pids) {
                    stats.pats_rewritten += 1;
                }
                emit(out, &pending.packets, &mut stats)?;
                pending.packets.clear();
            }
            PatSpan::Invalid => flush_pending(&mut pending, out, &mut stats)?,
        }
    }
    flush_pending(&mut pending, out, &mut stats)?;
    out.flush()?;
    Ok(stats)
}

/// Discovery followed by filtering over the same input. The discovery bytes
/// are kept in memory and replayed ahead of the rest of the source.
pub fn split<R: Read, W: Write>(input: R, out: &mut W) -> Result<FilterStats> {
    let mut recorder = Recorder::new(input);
    let discovery = discover(&mut PacketReader::new(&mut recorder))?;
    debug!(
        "discovery done after {} bytes, keeping pids {:04x?}",
        recorder.recorded_len(),
        discovery.keep.to_sorted_vec()
    );

    let mut replay = PacketReader::new(recorder.into_replay());
    let stats = filter(&discovery, &mut replay, out)?;
    debug!(
        "split: {} of {} packets written, {} PATs rewritten",
        stats.packets_written, stats.packets_read, stats.pats_rewritten
    );
    Ok(stats)
}
