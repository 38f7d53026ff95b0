use std::fmt::{Debug, Display, Error, Formatter};

// Error
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ScanError {
    // Image and geometry
    NotFound,
    Deadline,

    // Symbol structure
    Format,
    Checksum,
    UnsupportedCharset,

    // Caller
    InvalidArgument,
    SizeMismatch,
    DataTooLong,
    InvalidVersion,
    InvalidMask,
}

/// Coarse classification of [`ScanError`] used by callers deciding whether to retry.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum ErrorKind {
    /// Nothing was located in this frame; another region, rotation or frame may work.
    NotFound,
    /// The codewords are structurally invalid.
    Format,
    /// Error correction failed; only a new image can help.
    Checksum,
    /// A documented precondition was violated by the caller.
    InvalidArgument,
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound | Self::Deadline => ErrorKind::NotFound,
            Self::Format | Self::UnsupportedCharset => ErrorKind::Format,
            Self::Checksum => ErrorKind::Checksum,
            Self::InvalidArgument
            | Self::SizeMismatch
            | Self::DataTooLong
            | Self::InvalidVersion
            | Self::InvalidMask => ErrorKind::InvalidArgument,
        }
    }
}

impl Display for ScanError {
    fn fmt(&self, f: &mut Formatter) -> Result<(), Error> {
        let msg = match *self {
            Self::NotFound => "Symbol not found",
            Self::Deadline => "Deadline elapsed before sampling",
            Self::Format => "Invalid symbol format",
            Self::Checksum => "Too many errors to correct successfully",
            Self::UnsupportedCharset => "Unsupported character set",
            Self::InvalidArgument => "Invalid argument",
            Self::SizeMismatch => "Sizes don't match",
            Self::DataTooLong => "Data too long",
            Self::InvalidVersion => "Invalid version",
            Self::InvalidMask => "Invalid masking pattern",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for ScanError {}

pub type ScanResult<T> = Result<T, ScanError>;
