//! Synthetic transport stream builder shared by the integration tests
#![allow(dead_code)]

use mpegts_tools::constants::TS_PACKET_SIZE;
use mpegts_tools::crc32::crc32;

pub type Packet = [u8; TS_PACKET_SIZE];

fn finish_section(table_id: u8, id: u16, body: &[u8]) -> Vec<u8> {
    let length = 5 + body.len() + 4;
    let mut s = vec![table_id, 0xB0 | (length >> 8) as u8, length as u8];
    s.extend_from_slice(&id.to_be_bytes());
    s.extend_from_slice(&[0xC1, 0x00, 0x00]);
    s.extend_from_slice(body);
    let crc = crc32(&s);
    s.extend_from_slice(&crc.to_be_bytes());
    s
}

/// PAT section with CRC; entries are (program_number, pid)
pub fn pat_section(entries: &[(u16, u16)]) -> Vec<u8> {
    let mut body = Vec::new();
    for &(program, pid) in entries {
        body.extend_from_slice(&program.to_be_bytes());
        body.extend_from_slice(&(0xE000 | pid).to_be_bytes());
    }
    finish_section(0x00, 0x7FE0, &body)
}

/// PMT section with CRC; streams are (stream_type, pid)
pub fn pmt_section(program: u16, pcr_pid: u16, streams: &[(u8, u16)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(0xE000 | pcr_pid).to_be_bytes());
    body.extend_from_slice(&[0xF0, 0x00]);
    for &(stream_type, pid) in streams {
        body.push(stream_type);
        body.extend_from_slice(&(0xE000 | pid).to_be_bytes());
        body.extend_from_slice(&[0xF0, 0x00]);
    }
    finish_section(0x02, program, &body)
}

/// Single-packet PSI carrier, pointer field 0, 0xFF stuffing
pub fn psi_packet(pid: u16, section: &[u8]) -> Packet {
    let mut raw = [0xFFu8; TS_PACKET_SIZE];
    raw[..5].copy_from_slice(&[0x47, 0x40 | (pid >> 8) as u8, pid as u8, 0x10, 0x00]);
    raw[5..5 + section.len()].copy_from_slice(section);
    raw
}

/// PSI section over as many packets as it needs. `pointer` filler bytes come
/// first in the start payload; continuity counters count up from `cc`.
pub fn psi_packets(pid: u16, section: &[u8], pointer: u8, cc: u8) -> Vec<Packet> {
    let mut payload = vec![pointer];
    payload.extend(std::iter::repeat_n(0xFF, pointer as usize));
    payload.extend_from_slice(section);
    payload
        .chunks(184)
        .enumerate()
        .map(|(i, chunk)| {
            let mut raw = [0xFFu8; TS_PACKET_SIZE];
            let pusi = if i == 0 { 0x40 } else { 0x00 };
            let counter = (cc as usize + i) as u8 & 0x0F;
            let pid_hi = (pid >> 8) as u8 & 0x1F;
            raw[..4].copy_from_slice(&[0x47, pusi | pid_hi, pid as u8, 0x10 | counter]);
            raw[4..4 + chunk.len()].copy_from_slice(chunk);
            raw
        })
        .collect()
}

/// Payload-only packet, filled with a marker byte
pub fn data_packet(pid: u16, fill: u8) -> Packet {
    let mut raw = [fill; TS_PACKET_SIZE];
    raw[..4].copy_from_slice(&[0x47, (pid >> 8) as u8 & 0x1F, pid as u8, 0x10]);
    raw
}

fn pts_bytes(pts: u64) -> [u8; 5] {
    [
        0x20 | (((pts >> 30) as u8 & 0x07) << 1) | 1,
        (pts >> 22) as u8,
        (((pts >> 15) as u8) << 1) | 1,
        (pts >> 7) as u8,
        ((pts as u8) << 1) | 1,
    ]
}

/// PES start packet carrying a PTS, then `es` as elementary stream bytes.
/// Adaptation-field stuffing keeps the payload exactly the PES bytes.
pub fn pes_packet(pid: u16, stream_id: u8, pts: u64, aligned: bool, es: &[u8]) -> Packet {
    let mut pes = vec![0x00, 0x00, 0x01, stream_id, 0x00, 0x00];
    pes.push(0x80 | if aligned { 0x04 } else { 0x00 });
    pes.push(0x80);
    pes.push(5);
    pes.extend_from_slice(&pts_bytes(pts));
    pes.extend_from_slice(es);

    let mut raw = [0xFFu8; TS_PACKET_SIZE];
    let room = TS_PACKET_SIZE - 4 - pes.len();
    raw[..4].copy_from_slice(&[0x47, 0x40 | (pid >> 8) as u8, pid as u8, 0x30]);
    raw[4] = (room - 1) as u8;
    if room > 1 {
        raw[5] = 0x00;
    }
    raw[4 + room..].copy_from_slice(&pes);
    raw
}

pub fn concat(packets: &[Packet]) -> Vec<u8> {
    packets.iter().flat_map(|p| p.iter().copied()).collect()
}
