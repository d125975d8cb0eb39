//! Page barcode values and their Code 128 bar patterns.
//!
//! Every stamped page carries `{exam_id}-{student_id}-{page_number}`.
//! The composer draws the pattern as vector rectangles, so only the
//! module sequence (1 = bar, 0 = space) is produced here.

use barcoders::sym::code128::Code128;
use thiserror::Error;

// Code 128 charset B selector expected by the encoder.
const CHARSET_B: char = '\u{0181}';

#[derive(Debug, Error)]
pub(crate) enum BarcodeError {
    #[error("value cannot be encoded as Code 128: {0}")]
    Unencodable(String),
    #[error("malformed barcode value: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageIdentity {
    pub(crate) exam_id: i32,
    pub(crate) student_id: i32,
    pub(crate) page_number: i32,
}

pub(crate) fn format_value(identity: PageIdentity) -> String {
    format!("{}-{}-{}", identity.exam_id, identity.student_id, identity.page_number)
}

pub(crate) fn parse_value(raw: &str) -> Result<PageIdentity, BarcodeError> {
    let mut parts = raw.split('-');
    let exam_id = parse_part(&mut parts, raw)?;
    let student_id = parse_part(&mut parts, raw)?;
    let page_number = parse_part(&mut parts, raw)?;
    if parts.next().is_some() {
        return Err(BarcodeError::Malformed(raw.to_string()));
    }
    Ok(PageIdentity { exam_id, student_id, page_number })
}

fn parse_part(
    parts: &mut std::str::Split<'_, char>,
    raw: &str,
) -> Result<i32, BarcodeError> {
    parts
        .next()
        .and_then(|part| part.parse::<i32>().ok())
        .ok_or_else(|| BarcodeError::Malformed(raw.to_string()))
}

/// Encodes `value` and returns the module sequence including start code,
/// checksum and stop pattern.
pub(crate) fn bar_pattern(value: &str) -> Result<Vec<u8>, BarcodeError> {
    let encoder = Code128::new(format!("{CHARSET_B}{value}"))
        .map_err(|_| BarcodeError::Unencodable(value.to_string()))?;
    Ok(encoder.encode())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_roundtrip() {
        let identity = PageIdentity { exam_id: 12, student_id: 345, page_number: 2 };
        let value = format_value(identity);
        assert_eq!(value, "12-345-2");
        assert_eq!(parse_value(&value).unwrap(), identity);
    }

    #[test]
    fn parse_rejects_missing_parts() {
        assert!(parse_value("12-345").is_err());
        assert!(parse_value("").is_err());
    }

    #[test]
    fn parse_rejects_extra_parts() {
        assert!(parse_value("1-2-3-4").is_err());
    }

    #[test]
    fn parse_rejects_non_numeric_parts() {
        assert!(parse_value("a-b-c").is_err());
    }

    #[test]
    fn bar_pattern_starts_and_ends_with_bars() {
        let pattern = bar_pattern("7-31-1").expect("pattern");
        assert!(!pattern.is_empty());
        assert_eq!(pattern[0], 1);
        assert_eq!(*pattern.last().unwrap(), 1);
        assert!(pattern.iter().all(|module| *module == 0 || *module == 1));
    }

    #[test]
    fn distinct_values_produce_distinct_patterns() {
        let a = bar_pattern("1-1-1").unwrap();
        let b = bar_pattern("1-1-2").unwrap();
        assert_ne!(a, b);
    }
}
