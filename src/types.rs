use std::collections::HashSet;

use serde::Serialize;

use crate::constants::PID_MASK;

/// Set of 13-bit packet identifiers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PidSet {
    pids: HashSet<u16>,
}

impl PidSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a PID; returns false when it was already present
    pub fn insert(&mut self, pid: u16) -> bool {
        self.pids.insert(pid & PID_MASK)
    }

    pub fn contains(&self, pid: u16) -> bool {
        self.pids.contains(&(pid & PID_MASK))
    }

    pub fn len(&self) -> usize {
        self.pids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        self.pids.iter().copied()
    }

    /// Sorted copy, for stable logging and reports
    pub fn to_sorted_vec(&self) -> Vec<u16> {
        let mut v: Vec<u16> = self.iter().collect();
        v.sort_unstable();
        v
    }
}

impl FromIterator<u16> for PidSet {
    fn from_iter<I: IntoIterator<Item = u16>>(iter: I) -> Self {
        let mut set = PidSet::new();
        for pid in iter {
            set.insert(pid);
        }
        set
    }
}

/// Elementary stream types this crate classifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StreamType {
    /// ITU-T H.262 / ISO 13818-2 video
    Mpeg2Video,
    /// ISO 13818-7 AAC with ADTS transport syntax
    AacAdts,
    Other(u8),
}

impl StreamType {
    pub const MPEG2_VIDEO: u8 = 0x02;
    pub const AAC_ADTS: u8 = 0x0F;

    pub fn as_u8(self) -> u8 {
        match self {
            StreamType::Mpeg2Video => Self::MPEG2_VIDEO,
            StreamType::AacAdts => Self::AAC_ADTS,
            StreamType::Other(v) => v,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StreamType::Mpeg2Video => "MPEG-2 Video",
            StreamType::AacAdts => "AAC",
            StreamType::Other(_) => "unk",
        }
    }
}

impl From<u8> for StreamType {
    fn from(v: u8) -> Self {
        match v {
            Self::MPEG2_VIDEO => StreamType::Mpeg2Video,
            Self::AAC_ADTS => StreamType::AacAdts,
            other => StreamType::Other(other),
        }
    }
}
