//! WebSocket text frame decoding.
//!
//! Accepted forms:
//!
//! ```text
//! {"address": "/haptic/chest", "value": 0.5}
//! [{"address": "/a", "value": 1}, {"address": "/b", "value": false}]
//! /haptic/chest 0.5
//! /haptic/chest=0.5
//! ```

use serde::Deserialize;
use tactile_core::InboundEvent;

use crate::errors::DecodeError;

#[derive(Deserialize)]
#[serde(untagged)]
enum FrameValue {
    Number(f64),
    Bool(bool),
}

impl FrameValue {
    fn as_f64(&self) -> f64 {
        match *self {
            Self::Number(n) => n,
            Self::Bool(b) => f64::from(u8::from(b)),
        }
    }
}

#[derive(Deserialize)]
struct JsonEvent {
    address: String,
    value: FrameValue,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonFrame {
    One(JsonEvent),
    Many(Vec<JsonEvent>),
}

/// Decode one text frame into events.
pub fn decode_text_frame(text: &str) -> Result<Vec<InboundEvent>, DecodeError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(DecodeError::Empty);
    }

    if text.starts_with('{') || text.starts_with('[') {
        return decode_json(text);
    }
    decode_plain(text).map(|event| vec![event])
}

fn decode_json(text: &str) -> Result<Vec<InboundEvent>, DecodeError> {
    let frame: JsonFrame =
        serde_json::from_str(text).map_err(|e| DecodeError::Json(e.to_string()))?;
    let events = match frame {
        JsonFrame::One(event) => vec![event],
        JsonFrame::Many(events) => events,
    };
    events
        .into_iter()
        .map(|event| {
            let address = check_address(&event.address)?;
            Ok(InboundEvent::from_f64(address, event.value.as_f64()))
        })
        .collect()
}

fn decode_plain(text: &str) -> Result<InboundEvent, DecodeError> {
    let (address, value) = match text.split_once('=') {
        Some(pair) => pair,
        None => text
            .rsplit_once(char::is_whitespace)
            .ok_or(DecodeError::InvalidFrame)?,
    };
    let address = check_address(address)?;
    let value = value.trim();

    let parsed = match value.to_ascii_lowercase().as_str() {
        "true" | "on" => Some(1.0),
        "false" | "off" => Some(0.0),
        number => number.parse::<f64>().ok(),
    };
    match parsed {
        Some(v) => Ok(InboundEvent::from_f64(address, v)),
        None => Err(DecodeError::InvalidValue {
            address: address.to_string(),
            value: value.to_string(),
        }),
    }
}

fn check_address(address: &str) -> Result<&str, DecodeError> {
    let address = address.trim();
    if address.is_empty() || address.contains(char::is_whitespace) {
        return Err(DecodeError::InvalidAddress(address.to_string()));
    }
    Ok(address)
}
