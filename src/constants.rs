//! Constants for MPEG-TS framing, PSI and PES processing

/// MPEG-TS packet constants
pub const TS_PACKET_SIZE: usize = 188;
pub const TS_SYNC_BYTE: u8 = 0x47;
pub const TS_HEADER_SIZE: usize = 4;

/// PID constants
pub const PAT_PID: u16 = 0x0000;
pub const PID_MASK: u16 = 0x1FFF;
/// ISDB-T one-segment (mobile reception) PMT PID, duplicate of the main program
pub const ONESEG_PID: u16 = 0x1FC8;

/// PSI constants
pub const PAT_TABLE_ID: u8 = 0x00;
pub const PMT_TABLE_ID: u8 = 0x02;
pub const STUFFING_BYTE: u8 = 0xFF;
pub const SECTION_LENGTH_MASK: u16 = 0x0FFF;
pub const PSI_HEADER_SIZE: usize = 8;
pub const PMT_HEADER_SIZE: usize = 12;
pub const CRC32_SIZE: usize = 4;

/// PES packet constants
pub const PES_START_CODE: [u8; 3] = [0x00, 0x00, 0x01];
pub const PES_FIXED_HEADER_SIZE: usize = 9;
pub const PTS_SIZE: usize = 5;

/// PTS constants
pub const PTS_CLOCK_HZ: u64 = 90_000; // 90 kHz
pub const PTS_WRAP_THRESHOLD: u64 = 1u64 << 33; // 33-bit PTS counter
pub const MAX_AV_DELAY_SECONDS: u64 = 10;
pub const MAX_AV_DELAY_TICKS: u64 = PTS_CLOCK_HZ * MAX_AV_DELAY_SECONDS;

/// MPEG-2 video sequence_header_code
pub const SEQUENCE_START_CODE: u32 = 0x0000_01B3;
