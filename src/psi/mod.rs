pub mod decoder;
pub mod pat;
pub mod pmt;
pub mod section;

pub use decoder::{PatDecoder, PmtDecoder, PsiTable, TableDecoder};
pub use pat::{PatSection, ProgramAssociation};
pub use pmt::{DescriptorList, PmtSection, StreamInfo};
pub use section::{SectionHeader, SectionReassembler};
