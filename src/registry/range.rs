//! Reference-range strings as produced by the structuring step:
//! `"low - high"`, `">low"` or `"<high"`, numbers without sign or exponent.

use std::sync::LazyLock;

use regex::Regex;

use super::types::{Quantity, ReferenceRange};

static ARROW_GT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-–—]+>").unwrap());
static ARROW_LT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-–—]+<").unwrap());
static TRAILING_DASH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[-–—]+$").unwrap());

/// Repair OCR/model artifacts (`->59`, `-<5`, trailing dashes) and keep the
/// range only if it matches one of the accepted shapes.
pub fn normalize_reference_range(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let repaired = ARROW_GT.replace_all(trimmed, ">");
    let repaired = ARROW_LT.replace_all(&repaired, "<");
    let repaired = TRAILING_DASH.replace_all(&repaired, "");
    let repaired = repaired.trim();

    if let Some((low, high)) = repaired.split_once(" - ") {
        if is_plain_number(low.trim()) && is_plain_number(high.trim()) {
            return Some(repaired.to_string());
        }
        return None;
    }
    if let Some(bound) = repaired.strip_prefix('>').or_else(|| repaired.strip_prefix('<')) {
        if is_plain_number(bound.trim()) {
            return Some(repaired.to_string());
        }
    }
    None
}

/// Turn a range string into a FHIR `referenceRange`. Anything that does not
/// normalize is absent, never an error.
pub fn parse_reference_range(raw: &str, unit: &str) -> Option<ReferenceRange> {
    let range = normalize_reference_range(raw)?;
    let quantity = |value: f64| Quantity {
        value,
        unit: (!unit.is_empty()).then(|| unit.to_string()),
    };

    if let Some((low, high)) = range.split_once(" - ") {
        let low: f64 = low.trim().parse().ok()?;
        let high: f64 = high.trim().parse().ok()?;
        return Some(ReferenceRange {
            low: Some(quantity(low)),
            high: Some(quantity(high)),
        });
    }
    if let Some(low) = range.strip_prefix('>') {
        return Some(ReferenceRange {
            low: Some(quantity(low.trim().parse().ok()?)),
            high: None,
        });
    }
    if let Some(high) = range.strip_prefix('<') {
        return Some(ReferenceRange {
            low: None,
            high: Some(quantity(high.trim().parse().ok()?)),
        });
    }
    None
}

/// Digits with at most one decimal point.
fn is_plain_number(s: &str) -> bool {
    let mut seen_digit = false;
    let mut seen_dot = false;
    for c in s.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_dot => seen_dot = true,
            _ => return false,
        }
    }
    seen_digit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_interval() {
        let range = parse_reference_range("70 - 100", "mg/dL").unwrap();
        assert_eq!(range.low.unwrap().value, 70.0);
        let high = range.high.unwrap();
        assert_eq!(high.value, 100.0);
        assert_eq!(high.unit.as_deref(), Some("mg/dL"));
    }

    #[test]
    fn lower_bound_only() {
        let range = parse_reference_range(">59", "mL/min").unwrap();
        assert_eq!(range.low.unwrap().value, 59.0);
        assert!(range.high.is_none());
    }

    #[test]
    fn upper_bound_only() {
        let range = parse_reference_range("<5", "mg/L").unwrap();
        assert!(range.low.is_none());
        assert_eq!(range.high.unwrap().value, 5.0);
    }

    #[test]
    fn other_shapes_are_absent() {
        for raw in ["", "normal", "70-100", "70 - high", "> abc", "1.2.3 - 4", "-5 - 5", "≥ 10"] {
            assert!(parse_reference_range(raw, "u").is_none(), "{raw:?}");
        }
    }

    #[test]
    fn arrow_artifacts_repaired() {
        assert_eq!(normalize_reference_range("->59").as_deref(), Some(">59"));
        assert_eq!(normalize_reference_range("-<5").as_deref(), Some("<5"));
        assert_eq!(normalize_reference_range("—>1.5").as_deref(), Some(">1.5"));
        assert_eq!(normalize_reference_range(">59-").as_deref(), Some(">59"));
    }

    #[test]
    fn decimals_accepted() {
        assert_eq!(
            normalize_reference_range(" 12.0 - 15.5 ").as_deref(),
            Some("12.0 - 15.5")
        );
        let range = parse_reference_range("12.0 - 15.5", "g/dL").unwrap();
        assert_eq!(range.low.unwrap().value, 12.0);
    }

    #[test]
    fn empty_unit_omitted() {
        let range = parse_reference_range("<5", "").unwrap();
        assert!(range.high.unwrap().unit.is_none());
    }
}
