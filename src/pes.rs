//! PES header reassembly across transport packets.
//!
//! Each payload-unit-start begins a new PES unit. Packets are buffered until
//! the fixed 9-byte prefix and the optional header fields are complete; the
//! header is then handed to [`PesHandler::on_header`] and every remaining
//! payload byte of that unit streams through [`PesHandler::on_data`].
//!
//! Packets with the transport error flag never reach the buffer. A repeated
//! continuity counter is skipped as a duplicate; a gap drops the unit until
//! the next payload-unit-start.

use bitstream_io::{BigEndian, BitRead, BitReader};
use bytes::BytesMut;
use log::debug;

use crate::constants::{PES_FIXED_HEADER_SIZE, PES_START_CODE, PTS_SIZE};
use crate::error::TsError;
use crate::packet::{Continuity, TsPacket};
use crate::Result;

/// Decoded PES packet header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PesHeader {
    pub stream_id: u8,
    /// Declared PES_packet_length; 0 means unbounded (video)
    pub packet_length: u16,
    pub data_alignment: bool,
    pub pts_dts_flags: u8,
    pub header_data_length: u8,
    /// 33-bit presentation timestamp in 90 kHz ticks
    pub pts: Option<u64>,
}

impl PesHeader {
    /// Decode from a buffer starting at the start code. The buffer must hold
    /// the fixed prefix plus `header_data_length` bytes.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < PES_FIXED_HEADER_SIZE
            || buf.len() < PES_FIXED_HEADER_SIZE + buf[8] as usize
        {
            return Err(TsError::MalformedSection("short PES header"));
        }
        if buf[..3] != PES_START_CODE {
            return Err(TsError::MalformedSection("bad PES start code"));
        }
        read_header(buf).map_err(|_| TsError::MalformedSection("short PES header"))
    }
}

fn read_header(buf: &[u8]) -> std::io::Result<PesHeader> {
    let mut br = BitReader::endian(buf, BigEndian);

    br.skip(24)?; // packet_start_code_prefix
    let stream_id = br.read::<8, u8>()?;
    let packet_length = br.read::<16, u16>()?;
    br.skip(5)?; // '10', scrambling_control, priority
    let data_alignment = br.read_bit()?;
    br.skip(2)?; // copyright, original_or_copy
    let pts_dts_flags = br.read::<2, u8>()?;
    br.skip(6)?;
    let header_data_length = br.read::<8, u8>()?;

    let pts = if pts_dts_flags >= 0b10 && header_data_length as usize >= PTS_SIZE {
        Some(read_timestamp(&mut br)?)
    } else {
        None
    };

    Ok(PesHeader {
        stream_id,
        packet_length,
        data_alignment,
        pts_dts_flags,
        header_data_length,
        pts,
    })
}

/// 33-bit timestamp spread over 5 bytes with interleaved marker bits.
/// Markers are not enforced; odd ones are only logged.
fn read_timestamp<R: std::io::Read>(br: &mut BitReader<R, BigEndian>) -> std::io::Result<u64> {
    let prefix = br.read::<4, u8>()?;
    let hi = br.read::<3, u64>()?;
    let m0 = br.read_bit()?;
    let mid = br.read::<15, u64>()?;
    let m1 = br.read_bit()?;
    let lo = br.read::<15, u64>()?;
    let m2 = br.read_bit()?;
    if prefix & 0b0010 == 0 || !(m0 && m1 && m2) {
        debug!("PES timestamp with unexpected marker bits (prefix {prefix:#06b})");
    }
    Ok((hi << 30) | (mid << 15) | lo)
}

/// Receives the output of a [`PesReassembler`]
pub trait PesHandler {
    fn on_header(&mut self, header: &PesHeader);

    /// Elementary stream bytes following the header, in arrival order
    fn on_data(&mut self, _data: &[u8]) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotStarted,
    Started,
    HeaderParsed,
}

/// Per-PID PES state machine
#[derive(Debug)]
pub struct PesReassembler {
    state: State,
    buf: BytesMut,
    last_cc: u8,
}

impl Default for PesReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PesReassembler {
    pub fn new() -> Self {
        Self {
            state: State::NotStarted,
            buf: BytesMut::new(),
            last_cc: 0,
        }
    }

    pub fn header_parsed(&self) -> bool {
        self.state == State::HeaderParsed
    }

    pub fn submit<H: PesHandler>(&mut self, packet: &TsPacket, handler: &mut H) {
        if packet.transport_error {
            debug!("pid {:#06x}: dropping packet with transport error", packet.pid);
            return;
        }
        let payload = packet.payload();
        if packet.payload_unit_start {
            self.buf.clear();
            self.buf.extend_from_slice(payload);
            self.state = State::Started;
            self.last_cc = packet.continuity_counter;
        } else {
            if self.state == State::NotStarted {
                return;
            }
            match packet.continuity_after(self.last_cc) {
                Continuity::Duplicate => return,
                Continuity::Gap => {
                    debug!(
                        "pid {:#06x}: continuity {} -> {}, dropping PES unit",
                        packet.pid, self.last_cc, packet.continuity_counter
                    );
                    self.state = State::NotStarted;
                    self.buf.clear();
                    return;
                }
                Continuity::Next => self.last_cc = packet.continuity_counter,
            }
            match self.state {
                State::NotStarted => return,
                State::Started => self.buf.extend_from_slice(payload),
                State::HeaderParsed => {
                    if !payload.is_empty() {
                        handler.on_data(payload);
                    }
                    return;
                }
            }
        }

        self.try_parse_header(packet.pid, handler);
    }

    fn try_parse_header<H: PesHandler>(&mut self, pid: u16, handler: &mut H) {
        if self.buf.len() < PES_FIXED_HEADER_SIZE {
            return;
        }
        if self.buf[..3] != PES_START_CODE {
            debug!("pid {pid:#06x}: PES without start code prefix, waiting for next unit");
            self.state = State::NotStarted;
            self.buf.clear();
            return;
        }
        let header_len = PES_FIXED_HEADER_SIZE + self.buf[8] as usize;
        if self.buf.len() < header_len {
            return;
        }

        match PesHeader::parse(&self.buf[..header_len]) {
            Ok(header) => {
                handler.on_header(&header);
                self.state = State::HeaderParsed;
                if self.buf.len() > header_len {
                    handler.on_data(&self.buf[header_len..]);
                }
            }
            Err(e) => {
                debug!("pid {pid:#06x}: {e}");
                self.state = State::NotStarted;
            }
        }
        self.buf.clear();
    }
}
