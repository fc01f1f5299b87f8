//! 错误类型

use crate::component::ComponentId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SequencerError {
    #[error("component {0:?} already has a parent, remove it from its current parent first")]
    AlreadyParented(ComponentId),

    #[error("component {0:?} cannot be attached below itself")]
    Cycle(ComponentId),

    #[error("unknown component {0:?}")]
    UnknownComponent(ComponentId),

    #[error("attribute `{name}` expects a number, got `{value}`")]
    NotANumber { name: String, value: String },

    #[error("unknown attribute `{0}`")]
    UnknownAttribute(String),

    #[error("unknown theme `{0}`")]
    UnknownTheme(String),

    #[error("invalid time signature {upper}/{lower}")]
    InvalidSignature { upper: u8, lower: u8 },

    #[error("MIDI error: {0}")]
    Midi(#[from] midly::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type SequencerResult<T> = Result<T, SequencerError>;

/// Parses a host attribute value as a number. Empty strings count as zero,
/// anything else that does not parse to a finite number is rejected.
pub fn parse_number_attribute(name: &str, value: &str) -> SequencerResult<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(SequencerError::NotANumber {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}
