//! Conversions between chunk addresses, their fixed-width ASCII form and
//! byte offsets.

use super::Ref;
use super::error::{FileError, FileResult};

/// Encode `value` as left-justified decimal text, space-padded to `width` bytes
pub fn encode_ref(value: Ref, width: usize) -> FileResult<Vec<u8>> {
    let text = value.to_string();
    if text.len() > width {
        return Err(FileError::RefOverflow { value, width });
    }

    let mut encoded = Vec::with_capacity(width);
    encoded.extend_from_slice(text.as_bytes());
    encoded.resize(width, b' ');
    Ok(encoded)
}

/// Decode a reference from its on-disk form, ignoring trailing padding
pub fn decode_ref(bytes: &[u8]) -> FileResult<Ref> {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);
    let trimmed = &bytes[..end];

    let digits = trimmed.strip_prefix(b"-").unwrap_or(trimmed);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(invalid(bytes));
    }

    // Only ASCII digits and an optional sign remain, so this is valid UTF-8
    std::str::from_utf8(trimmed)
        .ok()
        .and_then(|s| s.parse::<Ref>().ok())
        .ok_or_else(|| invalid(bytes))
}

/// Index of the chunk containing byte offset `position`
pub fn ref_from_position(position: u64, chunk_size: usize) -> Ref {
    (position / chunk_size as u64) as Ref
}

/// Byte offset of the start of chunk `addr`, or `None` if `addr` is negative
/// or the offset does not fit in a `u64`
pub fn position_from_ref(addr: Ref, chunk_size: usize) -> Option<u64> {
    u64::try_from(addr).ok()?.checked_mul(chunk_size as u64)
}

fn invalid(bytes: &[u8]) -> FileError {
    FileError::InvalidRef(String::from_utf8_lossy(bytes).into_owned())
}
