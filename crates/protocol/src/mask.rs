//! Ledmask attribute text format
//!
//! Reads render as `0x%x\n`. Writes accept anything containing a run of hex
//! digits: the first run found is taken, with an optional `0x` prefix and
//! a `-` sign directly in front of it, and truncated to its low byte.

use crate::error::ParseMaskError;

/// Render a mask the way the attribute is read
pub fn format_mask(mask: u8) -> String {
    format!("{:#x}\n", mask)
}

/// Parse attribute text into a mask byte
pub fn parse_mask(text: &str) -> Result<u8, ParseMaskError> {
    let bytes = text.as_bytes();
    let start = bytes
        .iter()
        .position(u8::is_ascii_hexdigit)
        .ok_or_else(|| ParseMaskError {
            input: text.to_string(),
        })?;

    let negative = start > 0 && bytes[start - 1] == b'-';

    let mut digits = &bytes[start..];
    if digits.len() > 2
        && digits[0] == b'0'
        && digits[1].eq_ignore_ascii_case(&b'x')
        && digits[2].is_ascii_hexdigit()
    {
        digits = &digits[2..];
    }

    // Only the low byte survives, so older digits can be shifted out
    let value = digits
        .iter()
        .take_while(|b| b.is_ascii_hexdigit())
        .fold(0u8, |acc, &b| (acc << 4) | nibble(b));

    Ok(if negative { value.wrapping_neg() } else { value })
}

fn nibble(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        b'A'..=b'F' => digit - b'A' + 10,
        _ => 0,
    }
}
