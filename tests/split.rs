mod common;

use std::io::Cursor;

use common::*;
use mpegts_tools::TsError;
use mpegts_tools::constants::{ONESEG_PID, TS_PACKET_SIZE};
use mpegts_tools::crc32::validate_section_crc;
use mpegts_tools::psi::{PatSection, PsiTable};
use mpegts_tools::split::split;

fn pids_of(out: &[u8]) -> Vec<u16> {
    out.chunks_exact(TS_PACKET_SIZE)
        .map(|p| (((p[1] & 0x1F) as u16) << 8) | p[2] as u16)
        .collect()
}

fn pat_of(packet: &[u8]) -> Vec<u8> {
    let len = (((packet[6] & 0x0F) as usize) << 8) | packet[7] as usize;
    packet[5..8 + len].to_vec()
}

fn broadcast_stream() -> Vec<u8> {
    let pat = pat_section(&[(0, 0x0010), (0x0400, 0x01F0), (0x0588, ONESEG_PID)]);
    let pmt = pmt_section(0x0400, 0x0100, &[(0x02, 0x0111), (0x0F, 0x0112)]);
    concat(&[
        data_packet(0x0111, 0x11),
        psi_packet(0x0000, &pat),
        data_packet(0x0300, 0x33),
        psi_packet(0x01F0, &pmt),
        data_packet(0x0112, 0x12),
        data_packet(ONESEG_PID, 0x44),
        data_packet(0x0100, 0x55),
        psi_packet(0x0000, &pat),
        data_packet(0x0010, 0x66),
    ])
}

#[test]
fn test_split_keeps_referenced_pids() {
    let mut out = Vec::new();
    let stats = split(Cursor::new(broadcast_stream()), &mut out).unwrap();

    assert_eq!(
        pids_of(&out),
        vec![0x0111, 0x0000, 0x01F0, 0x0112, 0x0100, 0x0000, 0x0010]
    );
    assert_eq!(stats.packets_read, 9);
    assert_eq!(stats.packets_written, 7);
    assert_eq!(stats.pats_rewritten, 2);
}

#[test]
fn test_split_rewritten_pat_drops_oneseg() {
    let mut out = Vec::new();
    split(Cursor::new(broadcast_stream()), &mut out).unwrap();

    for packet in out.chunks_exact(TS_PACKET_SIZE).filter(|p| p[1] & 0x1F == 0 && p[2] == 0) {
        let section = pat_of(packet);
        assert!(validate_section_crc(&section));
        let pat = PatSection::decode(&section).unwrap();
        let entries: Vec<_> = pat
            .associations
            .iter()
            .map(|a| (a.program_number, a.pid))
            .collect();
        assert_eq!(entries, vec![(0, 0x0010), (0x0400, 0x01F0)]);
        assert!(packet[5 + section.len()..].iter().all(|&b| b == 0xFF));
    }
}

#[test]
fn test_split_passes_clean_pat_unchanged() {
    let pat = pat_section(&[(0, 0x0010), (0x0400, 0x01F0)]);
    let pmt = pmt_section(0x0400, 0x0100, &[(0x02, 0x0111)]);
    let input = concat(&[psi_packet(0x0000, &pat), psi_packet(0x01F0, &pmt)]);

    let mut out = Vec::new();
    split(Cursor::new(input.clone()), &mut out).unwrap();
    assert_eq!(out, input);
}

#[test]
fn test_split_rewrites_pat_spanning_packets() {
    let pat = pat_section(&[(0, 0x0010), (0x0400, 0x01F0), (0x0588, ONESEG_PID)]);
    let pmt = pmt_section(0x0400, 0x0100, &[(0x02, 0x0111)]);
    // section starts 7 bytes before the end of the first payload
    let mut packets = psi_packets(0x0000, &pat, 176, 0);
    assert_eq!(packets.len(), 2);
    packets.push(psi_packet(0x01F0, &pmt));
    packets.extend(psi_packets(0x0000, &pat, 176, 2));

    let mut out = Vec::new();
    let stats = split(Cursor::new(concat(&packets)), &mut out).unwrap();
    assert_eq!(stats.pats_rewritten, 2);
    assert_eq!(pids_of(&out), vec![0x0000, 0x0000, 0x01F0, 0x0000, 0x0000]);

    for pair in [&out[..2 * TS_PACKET_SIZE], &out[3 * TS_PACKET_SIZE..]] {
        let mut payload = pair[4..TS_PACKET_SIZE].to_vec();
        payload.extend_from_slice(&pair[TS_PACKET_SIZE + 4..]);
        let head = 1 + payload[0] as usize;
        let len = (((payload[head + 1] & 0x0F) as usize) << 8) | payload[head + 2] as usize;
        let section = &payload[head..head + 3 + len];

        assert!(validate_section_crc(section));
        let entries: Vec<_> = PatSection::decode(section)
            .unwrap()
            .associations
            .iter()
            .map(|a| (a.program_number, a.pid))
            .collect();
        assert_eq!(entries, vec![(0, 0x0010), (0x0400, 0x01F0)]);
        assert!(payload[head + 3 + len..].iter().all(|&b| b == 0xFF));
    }
}

#[test]
fn test_split_without_pmt_fails_discovery() {
    let pat = pat_section(&[(0x0400, 0x01F0)]);
    let input = concat(&[psi_packet(0x0000, &pat), data_packet(0x0111, 0x11)]);

    let mut out = Vec::new();
    let err = split(Cursor::new(input), &mut out).unwrap_err();
    assert!(matches!(err, TsError::Discovery(_)));
    assert!(out.is_empty());
}

#[test]
fn test_split_rejects_lost_sync() {
    let mut input = broadcast_stream();
    input[TS_PACKET_SIZE] = 0x00;
    let mut out = Vec::new();
    let err = split(Cursor::new(input), &mut out).unwrap_err();
    assert!(matches!(err, TsError::Framing { found: 0x00 }));
}
