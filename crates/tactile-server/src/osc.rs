//! OSC 1.0 packet decoding.
//!
//! A packet is either a message (address pattern, type tag string,
//! arguments) or a `#bundle` of size-prefixed packets. All fields are
//! big-endian and padded to four bytes. Only the first argument of a message
//! is read; it becomes the event value.

use bytes::Buf;
use tactile_core::InboundEvent;

use crate::errors::DecodeError;

/// Deepest bundle nesting accepted.
pub const MAX_BUNDLE_DEPTH: usize = 8;

const BUNDLE_TAG: &[u8] = b"#bundle\0";

/// Decode one OSC packet (a UDP datagram or binary WebSocket frame).
pub fn decode_packet(packet: &[u8]) -> Result<Vec<InboundEvent>, DecodeError> {
    if packet.is_empty() {
        return Err(DecodeError::Empty);
    }
    let mut events = Vec::new();
    decode_into(packet, 0, &mut events)?;
    Ok(events)
}

fn decode_into(
    packet: &[u8],
    depth: usize,
    events: &mut Vec<InboundEvent>,
) -> Result<(), DecodeError> {
    if packet.starts_with(BUNDLE_TAG) {
        decode_bundle(&packet[BUNDLE_TAG.len()..], depth, events)
    } else {
        events.push(decode_message(packet)?);
        Ok(())
    }
}

fn decode_bundle(
    mut buf: &[u8],
    depth: usize,
    events: &mut Vec<InboundEvent>,
) -> Result<(), DecodeError> {
    if depth >= MAX_BUNDLE_DEPTH {
        return Err(DecodeError::TooDeep(MAX_BUNDLE_DEPTH));
    }
    if buf.remaining() < 8 {
        return Err(DecodeError::Truncated("bundle time tag"));
    }
    // time tag: events are applied on arrival
    buf.advance(8);

    while buf.has_remaining() {
        if buf.remaining() < 4 {
            return Err(DecodeError::Truncated("bundle element size"));
        }
        let size = usize::try_from(buf.get_i32())
            .map_err(|_| DecodeError::Truncated("bundle element size"))?;
        if size == 0 || size > buf.remaining() {
            return Err(DecodeError::Truncated("bundle element"));
        }
        decode_into(&buf[..size], depth + 1, events)?;
        buf.advance(size);
    }
    Ok(())
}

fn decode_message(mut buf: &[u8]) -> Result<InboundEvent, DecodeError> {
    let address = read_string(&mut buf)?;
    if !address.starts_with('/') {
        return Err(DecodeError::InvalidAddress(address));
    }

    if !buf.has_remaining() {
        return Err(DecodeError::MissingArgument(address));
    }
    let tags = read_string(&mut buf)?;
    let Some(tags) = tags.strip_prefix(',') else {
        return Err(DecodeError::MissingArgument(address));
    };
    let Some(tag) = tags.chars().next() else {
        return Err(DecodeError::MissingArgument(address));
    };

    let value = match tag {
        'f' => f64::from(read_array::<4>(&mut buf).map(f32::from_be_bytes)?),
        'd' => read_array::<8>(&mut buf).map(f64::from_be_bytes)?,
        'i' => f64::from(read_array::<4>(&mut buf).map(i32::from_be_bytes)?),
        'h' => i64_value(read_array::<8>(&mut buf).map(i64::from_be_bytes)?),
        'T' => 1.0,
        'F' => 0.0,
        other => {
            return Err(DecodeError::UnsupportedArgument {
                address,
                tag: other,
            });
        }
    };

    Ok(InboundEvent::from_f64(address, value))
}

#[allow(clippy::cast_precision_loss)]
fn i64_value(value: i64) -> f64 {
    value as f64
}

fn read_array<const N: usize>(buf: &mut &[u8]) -> Result<[u8; N], DecodeError> {
    if buf.remaining() < N {
        return Err(DecodeError::Truncated("argument"));
    }
    let mut bytes = [0u8; N];
    buf.copy_to_slice(&mut bytes);
    Ok(bytes)
}

/// Read a null-terminated string padded to a multiple of four bytes.
fn read_string(buf: &mut &[u8]) -> Result<String, DecodeError> {
    let Some(end) = buf.iter().position(|&b| b == 0) else {
        return Err(DecodeError::InvalidString);
    };
    let text = std::str::from_utf8(&buf[..end])
        .map_err(|_| DecodeError::InvalidString)?
        .to_string();
    let padded = (end + 4) & !3;
    buf.advance(padded.min(buf.remaining()));
    Ok(text)
}

/// Encode a single-float OSC message. Used by clients and tests.
pub fn encode_float_message(address: &str, value: f32) -> Vec<u8> {
    let mut out = Vec::with_capacity(address.len() + 16);
    write_string(&mut out, address);
    write_string(&mut out, ",f");
    out.extend_from_slice(&value.to_be_bytes());
    out
}

/// Wrap already-encoded packets into a bundle with an immediate time tag.
pub fn encode_bundle(packets: &[Vec<u8>]) -> Vec<u8> {
    let mut out = BUNDLE_TAG.to_vec();
    out.extend_from_slice(&1u64.to_be_bytes());
    for packet in packets {
        let size = i32::try_from(packet.len()).unwrap_or(i32::MAX);
        out.extend_from_slice(&size.to_be_bytes());
        out.extend_from_slice(packet);
    }
    out
}

fn write_string(out: &mut Vec<u8>, text: &str) {
    out.extend_from_slice(text.as_bytes());
    let padded = (text.len() + 4) & !3;
    out.resize(out.len() + padded - text.len(), 0);
}
