//! Couples a section reassembler with the semantic decoding of one table type.

use std::marker::PhantomData;

use log::debug;

use crate::packet::TsPacket;
use crate::psi::section::SectionReassembler;
use crate::Result;

/// A PSI table that can be decoded from one complete section buffer
pub trait PsiTable: Sized {
    const NAME: &'static str;

    /// `section` spans table_id through the 4-byte CRC trailer
    fn decode(section: &[u8]) -> Result<Self>;
}

/// Per-PID table decoder. Sections that fail to decode are logged and skipped.
#[derive(Debug)]
pub struct TableDecoder<T> {
    sections: SectionReassembler,
    _table: PhantomData<T>,
}

impl<T: PsiTable> Default for TableDecoder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: PsiTable> TableDecoder<T> {
    pub fn new() -> Self {
        Self {
            sections: SectionReassembler::new(),
            _table: PhantomData,
        }
    }

    /// Feed one packet; `on_table` sees each decoded table and its raw section.
    pub fn submit_raw<F>(&mut self, packet: &TsPacket, mut on_table: F)
    where
        F: FnMut(T, &[u8]),
    {
        let pid = packet.pid;
        self.sections.submit(packet, |section| match T::decode(section) {
            Ok(table) => on_table(table, section),
            Err(e) => debug!("pid {pid:#06x}: skipping {}: {e}", T::NAME),
        });
    }

    /// Feed one packet; `on_table` runs for each decoded table
    pub fn submit<F>(&mut self, packet: &TsPacket, mut on_table: F)
    where
        F: FnMut(T),
    {
        self.submit_raw(packet, |table, _| on_table(table));
    }
}

pub type PatDecoder = TableDecoder<crate::psi::PatSection>;
pub type PmtDecoder = TableDecoder<crate::psi::PmtSection>;
