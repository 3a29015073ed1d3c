use serde::Serialize;

use crate::constants::{CRC32_SIZE, PAT_TABLE_ID, PSI_HEADER_SIZE};
use crate::error::TsError;
use crate::psi::decoder::PsiTable;
use crate::psi::section::{read_pid, SectionHeader};
use crate::Result;

/// ─────────── PAT ───────────
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatSection {
    pub header: SectionHeader,
    pub associations: Vec<ProgramAssociation>,
}

/// Program number 0 maps to the network PID, anything else to a PMT PID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgramAssociation {
    pub program_number: u16,
    pub pid: u16,
}

impl ProgramAssociation {
    pub fn is_network(&self) -> bool {
        self.program_number == 0
    }
}

impl PatSection {
    /// PMT associations, network entry excluded
    pub fn programs(&self) -> impl Iterator<Item = &ProgramAssociation> {
        self.associations.iter().filter(|a| !a.is_network())
    }
}

impl PsiTable for PatSection {
    const NAME: &'static str = "PAT";

    /// Trailing CRC is not checked here.
    fn decode(section: &[u8]) -> Result<Self> {
        if section.len() < PSI_HEADER_SIZE + CRC32_SIZE {
            return Err(TsError::MalformedSection("PAT shorter than header + CRC"));
        }
        if section[0] != PAT_TABLE_ID {
            return Err(TsError::MalformedSection("table_id is not PAT"));
        }
        let header = SectionHeader::parse(section)?;
        let body = &section[PSI_HEADER_SIZE..section.len() - CRC32_SIZE];

        let associations = body
            .chunks_exact(4)
            .map(|e| ProgramAssociation {
                program_number: u16::from_be_bytes([e[0], e[1]]),
                pid: read_pid(&e[2..4]),
            })
            .collect();

        Ok(PatSection { header, associations })
    }
}
