//! Transport packet framing and header decoding

use std::io::{ErrorKind, Read};
use std::ops::Range;

use log::{debug, warn};

use crate::constants::{TS_HEADER_SIZE, TS_PACKET_SIZE, TS_SYNC_BYTE};
use crate::error::TsError;
use crate::Result;

/// Where a continuation packet's counter sits relative to the last one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuity {
    Next,
    /// Same counter: a retransmitted copy of the previous packet
    Duplicate,
    /// One or more packets lost in between
    Gap,
}

/// One 188-byte transport packet with its decoded header
#[derive(Debug, Clone)]
pub struct TsPacket {
    pub sync_byte: u8,
    pub transport_error: bool,
    pub payload_unit_start: bool,
    pub transport_priority: bool,
    pub pid: u16,
    pub scrambling_control: u8,
    pub adaptation_field_control: u8,
    pub continuity_counter: u8,
    adaptation_field: Option<Range<usize>>,
    payload: Option<Range<usize>>,
    raw: [u8; TS_PACKET_SIZE],
}

impl TsPacket {
    /// Decode a frame. Only the sync byte is validated; an adaptation field
    /// whose declared length overruns the frame is clamped and leaves no payload.
    pub fn parse(raw: [u8; TS_PACKET_SIZE]) -> Result<Self> {
        if raw[0] != TS_SYNC_BYTE {
            return Err(TsError::Framing { found: raw[0] });
        }

        let pid = (((raw[1] & 0x1F) as u16) << 8) | (raw[2] as u16);
        let adaptation_field_control = (raw[3] >> 4) & 0x03;

        let mut offset = TS_HEADER_SIZE;
        let mut adaptation_field = None;
        if adaptation_field_control & 0x02 != 0 {
            let declared = 1 + raw[TS_HEADER_SIZE] as usize;
            let end = (offset + declared).min(TS_PACKET_SIZE);
            if offset + declared > TS_PACKET_SIZE {
                debug!("pid {pid:#06x}: adaptation field length {declared} overruns packet");
            }
            adaptation_field = Some(offset..end);
            offset = end;
        }

        let payload = if adaptation_field_control & 0x01 != 0 && offset < TS_PACKET_SIZE {
            Some(offset..TS_PACKET_SIZE)
        } else {
            None
        };

        Ok(Self {
            sync_byte: raw[0],
            transport_error: raw[1] & 0x80 != 0,
            payload_unit_start: raw[1] & 0x40 != 0,
            transport_priority: raw[1] & 0x20 != 0,
            pid,
            scrambling_control: raw[3] >> 6,
            adaptation_field_control,
            continuity_counter: raw[3] & 0x0F,
            adaptation_field,
            payload,
            raw,
        })
    }

    pub fn has_payload(&self) -> bool {
        self.adaptation_field_control & 0x01 != 0
    }

    /// Adaptation field including its length byte, undecoded
    pub fn adaptation_field(&self) -> Option<&[u8]> {
        self.adaptation_field.clone().map(|r| &self.raw[r])
    }

    /// Payload ("data bytes"); empty when the packet carries none
    pub fn payload(&self) -> &[u8] {
        match &self.payload {
            Some(r) => &self.raw[r.clone()],
            None => &[],
        }
    }

    /// Mutable payload view; writes land in the raw frame
    pub fn payload_mut(&mut self) -> &mut [u8] {
        match self.payload.clone() {
            Some(r) => &mut self.raw[r],
            None => &mut [],
        }
    }

    /// Compare this packet's continuity_counter with the previous one on its PID
    pub fn continuity_after(&self, last: u8) -> Continuity {
        if self.continuity_counter == last {
            Continuity::Duplicate
        } else if self.continuity_counter == last.wrapping_add(1) & 0x0F {
            Continuity::Next
        } else {
            Continuity::Gap
        }
    }

    /// The full frame as read (or as rewritten)
    pub fn raw(&self) -> &[u8; TS_PACKET_SIZE] {
        &self.raw
    }

    /// Re-serialize the 4-byte header from the decoded fields
    pub fn encode_header(&self) -> [u8; TS_HEADER_SIZE] {
        let mut b1 = ((self.pid >> 8) as u8) & 0x1F;
        if self.transport_error {
            b1 |= 0x80;
        }
        if self.payload_unit_start {
            b1 |= 0x40;
        }
        if self.transport_priority {
            b1 |= 0x20;
        }
        [
            self.sync_byte,
            b1,
            self.pid as u8,
            (self.scrambling_control << 6)
                | ((self.adaptation_field_control & 0x03) << 4)
                | (self.continuity_counter & 0x0F),
        ]
    }
}

/// Pulls whole packets out of a byte source
pub struct PacketReader<R> {
    inner: R,
}

impl<R: Read> PacketReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Read the next packet. `EndOfStream` when no complete frame remains.
    pub fn read_packet(&mut self) -> Result<TsPacket> {
        let mut buf = [0u8; TS_PACKET_SIZE];
        let mut done = 0;
        while done < TS_PACKET_SIZE {
            match self.inner.read(&mut buf[done..]) {
                Ok(0) => {
                    if done > 0 {
                        warn!("discarding {done} trailing bytes (incomplete packet)");
                    }
                    return Err(TsError::EndOfStream);
                }
                Ok(n) => done += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        TsPacket::parse(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frame(header: [u8; 4]) -> [u8; TS_PACKET_SIZE] {
        let mut raw = [0xAAu8; TS_PACKET_SIZE];
        raw[..4].copy_from_slice(&header);
        raw
    }

    /// Yields at most `step` bytes per read
    struct Trickle<'a> {
        data: &'a [u8],
        step: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let n = self.step.min(buf.len()).min(self.data.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_header_fields() {
        let packet = TsPacket::parse(frame([0x47, 0x41, 0x00, 0x17])).unwrap();
        assert!(packet.payload_unit_start);
        assert!(!packet.transport_error);
        assert_eq!(packet.pid, 0x0100);
        assert_eq!(packet.adaptation_field_control, 1);
        assert_eq!(packet.continuity_counter, 7);
        assert_eq!(packet.payload().len(), 184);
        assert!(packet.adaptation_field().is_none());
    }

    #[test]
    fn test_header_roundtrip() {
        for header in [
            [0x47, 0xE1, 0xFF, 0xDF],
            [0x47, 0x1F, 0xC8, 0x2A],
            [0x47, 0x40, 0x00, 0x10],
        ] {
            let packet = TsPacket::parse(frame(header)).unwrap();
            assert_eq!(packet.encode_header(), header);
        }
    }

    #[test]
    fn test_adaptation_field_skipped() {
        let mut raw = frame([0x47, 0x01, 0x00, 0x30]);
        raw[4] = 7;
        let packet = TsPacket::parse(raw).unwrap();
        assert_eq!(packet.adaptation_field().unwrap().len(), 8);
        assert_eq!(packet.payload().len(), TS_PACKET_SIZE - 4 - 8);
    }

    #[test]
    fn test_adaptation_only_has_no_payload() {
        let mut raw = frame([0x47, 0x01, 0x00, 0x20]);
        raw[4] = 183;
        let packet = TsPacket::parse(raw).unwrap();
        assert!(!packet.has_payload());
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn test_overlong_adaptation_field_is_clamped() {
        let mut raw = frame([0x47, 0x01, 0x00, 0x30]);
        raw[4] = 250;
        let packet = TsPacket::parse(raw).unwrap();
        assert_eq!(packet.adaptation_field().unwrap().len(), 184);
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn test_continuity_wraps_at_sixteen() {
        let packet = TsPacket::parse(frame([0x47, 0x01, 0x00, 0x10])).unwrap();
        assert_eq!(packet.continuity_after(0x0F), Continuity::Next);
        assert_eq!(packet.continuity_after(0x00), Continuity::Duplicate);
        assert_eq!(packet.continuity_after(0x0E), Continuity::Gap);
        assert_eq!(packet.continuity_after(0x01), Continuity::Gap);
    }

    #[test]
    fn test_bad_sync_byte() {
        let err = TsPacket::parse(frame([0x46, 0, 0, 0x10])).unwrap_err();
        assert!(matches!(err, TsError::Framing { found: 0x46 }));
    }

    #[test]
    fn test_reader_handles_short_reads() {
        let mut data = frame([0x47, 0x00, 0x11, 0x10]).to_vec();
        data.extend_from_slice(&frame([0x47, 0x00, 0x12, 0x10]));
        let mut reader = PacketReader::new(Trickle { data: &data, step: 7 });
        assert_eq!(reader.read_packet().unwrap().pid, 0x11);
        assert_eq!(reader.read_packet().unwrap().pid, 0x12);
        assert!(reader.read_packet().unwrap_err().is_end_of_stream());
    }

    #[test]
    fn test_trailing_partial_frame_ends_stream() {
        let mut data = frame([0x47, 0x00, 0x11, 0x10]).to_vec();
        data.extend_from_slice(&[0x47, 0x00]);
        let mut reader = PacketReader::new(Cursor::new(data));
        assert!(reader.read_packet().is_ok());
        assert!(reader.read_packet().unwrap_err().is_end_of_stream());
    }
}
