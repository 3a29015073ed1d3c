//! MPEG-2 CRC-32 (polynomial 0x04C11DB7, init 0xFFFFFFFF, MSB first,
//! no reflection, no final XOR).

use crc::{Crc, CRC_32_MPEG_2};

/// Lookup table is generated at compile time and shared read-only.
const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);

/// Compute the MPEG-2 CRC-32 over a byte slice.
pub fn crc32(data: &[u8]) -> u32 {
    CRC.checksum(data)
}

/// True when `section` (table_id through the trailing 4-byte CRC) is intact.
pub fn validate_section_crc(section: &[u8]) -> bool {
    section.len() >= 4 && crc32(section) == 0
}
