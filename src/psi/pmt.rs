use bytes::Bytes;
use log::debug;
use serde::{Serialize, Serializer};

use crate::constants::{CRC32_SIZE, PMT_HEADER_SIZE, PMT_TABLE_ID};
use crate::error::TsError;
use crate::psi::decoder::PsiTable;
use crate::psi::section::{read_length, read_pid, SectionHeader};
use crate::types::StreamType;
use crate::Result;

/// ─────────── PMT ───────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PmtSection {
    pub header: SectionHeader,
    pub pcr_pid: u16,
    pub program_info: DescriptorList,
    pub streams: Vec<StreamInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamInfo {
    pub stream_type: u8,
    pub elementary_pid: u16,
    pub es_info: DescriptorList,
}

impl StreamInfo {
    pub fn kind(&self) -> StreamType {
        StreamType::from(self.stream_type)
    }
}

impl PmtSection {
    /// Program number, carried in the table-id extension
    pub fn program_number(&self) -> u16 {
        self.header.transport_stream_id
    }

    /// First elementary stream of the given type
    pub fn find_stream(&self, kind: StreamType) -> Option<&StreamInfo> {
        self.streams.iter().find(|s| s.kind() == kind)
    }
}

/// Undecoded descriptor loop. Iterating yields `(tag, body)` pairs, which is
/// where tag-specific decoding can hook in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptorList(Bytes);

impl DescriptorList {
    pub fn new(raw: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(raw))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> Descriptors<'_> {
        Descriptors { rest: &self.0 }
    }
}

impl Serialize for DescriptorList {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(|(tag, _)| tag))
    }
}

/// TLV walk over a descriptor loop; stops at the first truncated entry
pub struct Descriptors<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Descriptors<'a> {
    type Item = (u8, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let (&tag, rest) = self.rest.split_first()?;
        let (&len, rest) = rest.split_first()?;
        let len = len as usize;
        if rest.len() < len {
            self.rest = &[];
            return None;
        }
        let (body, rest) = rest.split_at(len);
        self.rest = rest;
        Some((tag, body))
    }
}

impl PsiTable for PmtSection {
    const NAME: &'static str = "PMT";

    /// Trailing CRC is not checked here. A stream entry that runs into the
    /// CRC ends the loop.
    fn decode(section: &[u8]) -> Result<Self> {
        if section.len() < PMT_HEADER_SIZE + CRC32_SIZE {
            return Err(TsError::MalformedSection("PMT shorter than header + CRC"));
        }
        if section[0] != PMT_TABLE_ID {
            return Err(TsError::MalformedSection("table_id is not PMT"));
        }
        let header = SectionHeader::parse(section)?;
        let end = section.len() - CRC32_SIZE;

        let pcr_pid = read_pid(&section[8..10]);
        let prog_info_len = read_length(&section[10..12]);
        let mut idx = PMT_HEADER_SIZE + prog_info_len;
        if idx > end {
            return Err(TsError::MalformedSection("program_info_length overruns PMT"));
        }
        let program_info = DescriptorList::new(&section[PMT_HEADER_SIZE..idx]);

        let mut streams = Vec::new();
        while idx < end {
            if idx + 5 > end {
                debug!("PMT: {} stray bytes before CRC", end - idx);
                break;
            }
            let es_len = read_length(&section[idx + 3..idx + 5]);
            let es_end = idx + 5 + es_len;
            if es_end > end {
                debug!("PMT: es_info_length {es_len} overruns section");
                break;
            }
            streams.push(StreamInfo {
                stream_type: section[idx],
                elementary_pid: read_pid(&section[idx + 1..idx + 3]),
                es_info: DescriptorList::new(&section[idx + 5..es_end]),
            });
            idx = es_end;
        }

        Ok(PmtSection {
            header,
            pcr_pid,
            program_info,
            streams,
        })
    }
}
