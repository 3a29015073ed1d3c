// psi/section.rs
//! PSI section header and the multi-packet section reassembler.

use bytes::{Buf, BytesMut};
use log::debug;
use serde::Serialize;

use crate::constants::{PSI_HEADER_SIZE, SECTION_LENGTH_MASK, STUFFING_BYTE};
use crate::error::TsError;
use crate::packet::{Continuity, TsPacket};
use crate::Result;

/// Read a masked 13-bit PID from two bytes
pub(crate) fn read_pid(b: &[u8]) -> u16 {
    (((b[0] & 0x1F) as u16) << 8) | (b[1] as u16)
}

/// Read a masked 12-bit length field from two bytes
pub(crate) fn read_length(b: &[u8]) -> usize {
    (u16::from_be_bytes([b[0], b[1]]) & SECTION_LENGTH_MASK) as usize
}

/// Long-form section header common to PAT and PMT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SectionHeader {
    pub table_id: u8,
    pub transport_stream_id: u16,
    pub version: u8,
    pub current_next: bool,
    pub section_number: u8,
    pub last_section_number: u8,
}

impl SectionHeader {
    pub fn parse(section: &[u8]) -> Result<Self> {
        if section.len() < PSI_HEADER_SIZE {
            return Err(TsError::MalformedSection("short section header"));
        }
        Ok(Self {
            table_id: section[0],
            transport_stream_id: u16::from_be_bytes([section[3], section[4]]),
            version: (section[5] & 0x3E) >> 1,
            current_next: section[5] & 0x01 != 0,
            section_number: section[6],
            last_section_number: section[7],
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NotStarted,
    Accumulating,
}

/// Collects one PID's PSI payload across packets and hands out whole sections.
///
/// Data before the first payload-unit-start is dropped; a 0xFF table id
/// (stuffing) ends the current packet's sections and waits for the next start.
/// Packets flagged with a transport error are ignored, as are repeated
/// continuity counters. A counter gap abandons the partial section.
#[derive(Debug)]
pub struct SectionReassembler {
    state: State,
    buf: BytesMut,
    last_cc: u8,
}

impl Default for SectionReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionReassembler {
    pub fn new() -> Self {
        Self {
            state: State::NotStarted,
            buf: BytesMut::new(),
            last_cc: 0,
        }
    }

    pub fn is_started(&self) -> bool {
        self.state == State::Accumulating
    }

    /// Feed one packet; `on_section` runs once per completed section, in order.
    pub fn submit<F>(&mut self, packet: &TsPacket, mut on_section: F)
    where
        F: FnMut(&[u8]),
    {
        if packet.transport_error {
            debug!("pid {:#06x}: dropping packet with transport error", packet.pid);
            return;
        }
        let payload = packet.payload();
        if packet.payload_unit_start {
            let Some((&pointer, rest)) = payload.split_first() else {
                return;
            };
            let pointer = pointer as usize;
            self.buf.clear();
            if pointer > rest.len() {
                debug!("pid {:#06x}: pointer field {pointer} past payload", packet.pid);
                self.state = State::NotStarted;
                return;
            }
            self.state = State::Accumulating;
            self.last_cc = packet.continuity_counter;
            self.buf.extend_from_slice(&rest[pointer..]);
        } else if self.state == State::Accumulating {
            match packet.continuity_after(self.last_cc) {
                Continuity::Duplicate => return,
                Continuity::Gap => {
                    debug!(
                        "pid {:#06x}: continuity {} -> {}, dropping partial section",
                        packet.pid, self.last_cc, packet.continuity_counter
                    );
                    self.state = State::NotStarted;
                    self.buf.clear();
                    return;
                }
                Continuity::Next => self.last_cc = packet.continuity_counter,
            }
            self.buf.extend_from_slice(payload);
        } else {
            return;
        }

        self.drain(&mut on_section);
    }

    fn drain<F>(&mut self, on_section: &mut F)
    where
        F: FnMut(&[u8]),
    {
        while let Some(&table_id) = self.buf.first() {
            if table_id == STUFFING_BYTE {
                self.state = State::NotStarted;
                self.buf.clear();
                break;
            }
            if self.buf.len() < 3 {
                break;
            }
            let whole = read_length(&self.buf[1..3]) + 3;
            if self.buf.len() < whole {
                break;
            }
            on_section(&self.buf[..whole]);
            self.buf.advance(whole);
        }
    }
}
