//! Text frames sent by the sensor firmware.
//!
//! One frame per datagram: `raw,filt,flow,tds`, or one of the two sentinel
//! payloads while the sensor is powered down or warming up.

use thiserror::Error;

use crate::messages::DisplayState;

pub const OFF_FRAME: &str = "-,-,-,-";
pub const WARMUP_FRAME: &str = "warmup,warmup,warmup,warmup";

const FIELD_COUNT: usize = 4;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("payload is not valid UTF-8")]
    NotUtf8,

    #[error("expected 4 fields, found {found}")]
    FieldCount { found: usize },

    #[error("field {index} is not a number: {value:?}")]
    InvalidField { index: usize, value: String },

    #[error("field {index} is not finite")]
    NonFinite { index: usize },
}

pub fn decode(bytes: &[u8]) -> Result<DisplayState, DecodeError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| DecodeError::NotUtf8)?
        .trim();

    match text {
        OFF_FRAME => return Ok(DisplayState::Off),
        WARMUP_FRAME => return Ok(DisplayState::Warmup),
        _ => {}
    }

    let fields: Vec<&str> = text.split(',').collect();
    if fields.len() != FIELD_COUNT {
        return Err(DecodeError::FieldCount {
            found: fields.len(),
        });
    }

    let mut values = [0f64; FIELD_COUNT];
    for (index, (field, slot)) in fields.iter().zip(values.iter_mut()).enumerate() {
        *slot = parse_field(index, field)?;
    }
    let [raw, filt, flow, tds] = values;

    Ok(DisplayState::Sample {
        raw,
        filt,
        flow,
        tds,
    })
}

fn parse_field(index: usize, field: &str) -> Result<f64, DecodeError> {
    let field = field.trim();
    // f64's parser also takes "inf" and "NaN"; readings must be finite
    let value: f64 = field.parse().map_err(|_| DecodeError::InvalidField {
        index,
        value: field.to_string(),
    })?;
    if !value.is_finite() {
        return Err(DecodeError::NonFinite { index });
    }
    Ok(value)
}

/// Renders a state the way the firmware puts it on the wire.
pub fn encode(state: &DisplayState) -> String {
    match state {
        DisplayState::Off => format!("{OFF_FRAME}\n"),
        DisplayState::Warmup => format!("{WARMUP_FRAME}\n"),
        DisplayState::Sample {
            raw,
            filt,
            flow,
            tds,
        } => format!("{raw:.2},{filt:.2},{flow:.3},{tds:.2}\n"),
    }
}
