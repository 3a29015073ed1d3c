use thiserror::Error;

/// Errors raised while framing and decoding a transport stream
#[derive(Debug, Error)]
pub enum TsError {
    /// Frame does not start with 0x47; the input is assumed packet-aligned
    #[error("sync byte is not 0x47 (found {found:#04x})")]
    Framing { found: u8 },

    /// No further complete 188-byte frame in the source
    #[error("end of stream")]
    EndOfStream,

    /// A required PAT/PMT/PID never appeared before the input ran out
    #[error("discovery failed: {0}")]
    Discovery(&'static str),

    #[error("audio/video delay too large: {diff_ticks} ticks")]
    SanityCheck { diff_ticks: u64 },

    /// Section whose declared layout cannot be decoded
    #[error("malformed section: {0}")]
    MalformedSection(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TsError {
    /// Whether this error is the ordinary end-of-input loop terminator
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, TsError::EndOfStream)
    }
}
