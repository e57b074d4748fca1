//! Attribute and value parsing shared by the dialect tables

use std::str::FromStr;

use quick_xml::encoding::EncodingError;
use quick_xml::escape::unescape;
use quick_xml::events::BytesStart;

use crate::error::ImportError;

/// Get an attribute by local name, unescaped
pub fn attribute(e: &BytesStart<'_>, name: &str) -> Result<Option<String>, ImportError> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            let raw = std::str::from_utf8(&attr.value)
                .map_err(|e| quick_xml::Error::from(EncodingError::from(e)))?;
            let value = unescape(raw).map_err(quick_xml::Error::from)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Parse a numeric value, reporting a format violation for `scan_number`
pub fn parse_value<T: FromStr>(
    value: &str,
    what: &str,
    scan_number: Option<u32>,
) -> Result<T, ImportError> {
    value.trim().parse().map_err(|_| {
        ImportError::violation(scan_number, format!("invalid {} \"{}\"", what, value))
    })
}

/// Parse an optional numeric attribute. Missing and blank attributes are `None`.
pub fn numeric_attribute<T: FromStr>(
    e: &BytesStart<'_>,
    name: &str,
    scan_number: Option<u32>,
) -> Result<Option<T>, ImportError> {
    match attribute(e, name)? {
        Some(value) if !value.trim().is_empty() => parse_value(&value, name, scan_number).map(Some),
        _ => Ok(None),
    }
}

const DATE_UNITS: &[(char, f64)] = &[('Y', 31_536_000.0), ('M', 2_592_000.0), ('D', 86_400.0)];
const TIME_UNITS: &[(char, f64)] = &[('H', 3_600.0), ('M', 60.0), ('S', 1.0)];

/// Convert an `xs:duration` such as `PT2M3.5S` to seconds.
///
/// Years and months use fixed lengths of 365 and 30 days. A bare number is
/// accepted as seconds.
pub fn parse_duration(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(seconds) = text.parse::<f64>() {
        return Some(seconds);
    }

    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let rest = rest.strip_prefix('P')?;
    let (date, time) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut seen = false;
    let mut seconds = sum_components(date, DATE_UNITS, &mut seen)?;
    if let Some(time) = time {
        if time.is_empty() {
            return None;
        }
        seconds += sum_components(time, TIME_UNITS, &mut seen)?;
    }
    if !seen {
        return None;
    }

    Some(if negative { -seconds } else { seconds })
}

fn sum_components(part: &str, units: &[(char, f64)], seen: &mut bool) -> Option<f64> {
    let mut total = 0.0;
    let mut number = String::new();
    let mut next_unit = 0;

    for c in part.chars() {
        if c.is_ascii_digit() || c == '.' {
            number.push(c);
            continue;
        }
        let offset = units[next_unit..].iter().position(|(unit, _)| *unit == c)?;
        let value: f64 = number.parse().ok()?;
        total += value * units[next_unit + offset].1;
        number.clear();
        next_unit += offset + 1;
        *seen = true;
    }

    number.is_empty().then_some(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations() {
        assert_eq!(parse_duration("PT123.4S"), Some(123.4));
        assert_eq!(parse_duration("PT2M3.5S"), Some(123.5));
        assert_eq!(parse_duration("PT0.5H"), Some(1800.0));
        assert_eq!(parse_duration("P1DT1S"), Some(86_401.0));
        assert_eq!(parse_duration("-PT1S"), Some(-1.0));
        assert_eq!(parse_duration(" 42.5 "), Some(42.5));
    }

    #[test]
    fn test_invalid_durations() {
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("P"), None);
        assert_eq!(parse_duration("PT"), None);
        assert_eq!(parse_duration("PT5"), None);
        assert_eq!(parse_duration("PT1S2M"), None);
        assert_eq!(parse_duration("12 seconds"), None);
    }

    #[test]
    fn test_attribute_lookup() {
        let e = BytesStart::from_content(r#"scan num="17" msLevel="" retentionTime="PT1S""#, 4);
        assert_eq!(attribute(&e, "num").unwrap(), Some("17".to_string()));
        assert_eq!(attribute(&e, "missing").unwrap(), None);
        assert_eq!(numeric_attribute::<u32>(&e, "num", None).unwrap(), Some(17));
        assert_eq!(numeric_attribute::<u8>(&e, "msLevel", None).unwrap(), None);
        assert!(matches!(
            numeric_attribute::<u32>(&e, "retentionTime", Some(17)),
            Err(ImportError::FormatViolation {
                scan_number: Some(17),
                ..
            })
        ));
    }

    #[test]
    fn test_attribute_entities_are_unescaped() {
        let e = BytesStart::from_content(r#"scan filterLine="a &amp; b &lt;ms2&gt;""#, 4);
        assert_eq!(
            attribute(&e, "filterLine").unwrap(),
            Some("a & b <ms2>".to_string())
        );

        let bad = BytesStart::from_content(r#"scan filterLine="a &bogus; b""#, 4);
        assert!(matches!(
            attribute(&bad, "filterLine"),
            Err(ImportError::XmlError(_))
        ));
    }
}
