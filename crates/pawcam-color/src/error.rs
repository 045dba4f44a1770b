//! Conversion errors.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("conversion size mismatch: expected {expected} bytes, wrote {written}")]
    ConversionSizeMismatch { expected: usize, written: usize },
    #[error("unsupported source encoding: {0}")]
    UnsupportedEncoding(&'static str),
}
