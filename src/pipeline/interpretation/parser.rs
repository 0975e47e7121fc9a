use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use super::InterpretationError;
use crate::models::ExtractedTest;
use crate::registry::normalize_reference_range;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```json|```").unwrap());

#[derive(Debug, Deserialize)]
struct RawTest {
    name: Option<String>,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    reference_range: Option<String>,
}

/// Numbers, or strings holding one (`"98"`, `"14,2"`).
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', ".").parse().ok(),
        _ => None,
    }
}

/// Parse the model's JSON array. Entries without a name or a numeric value
/// are dropped; reference ranges that do not normalize become `None`.
pub(crate) fn parse_extracted_tests(reply: &str) -> Result<Vec<ExtractedTest>, InterpretationError> {
    let cleaned = CODE_FENCE.replace_all(reply, "");
    let cleaned = cleaned.trim();

    let raw: Vec<RawTest> = serde_json::from_str(cleaned).map_err(|e| {
        InterpretationError::UpstreamParse(format!("{e}: {}", truncate(cleaned, 200)))
    })?;

    let mut tests = Vec::with_capacity(raw.len());
    for entry in raw {
        let Some(name) = entry.name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()) else {
            tracing::warn!("Dropping extracted test without a name");
            continue;
        };
        let Some(value) = numeric_value(&entry.value) else {
            tracing::warn!(test = %name, "Dropping extracted test without a numeric value");
            continue;
        };
        tests.push(ExtractedTest {
            name,
            value,
            unit: entry.unit.map(|u| u.trim().to_string()).unwrap_or_default(),
            reference_range: entry
                .reference_range
                .as_deref()
                .and_then(normalize_reference_range),
        });
    }
    Ok(tests)
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_array_parsed() {
        let reply = "```json\n[\n {\"name\": \"Glucose\", \"value\": 98, \"unit\": \"mg/dL\", \"reference_range\": \"70 - 100\"},\n {\"name\": \"Hemoglobin\", \"value\": 14.2, \"unit\": \"g/dL\", \"reference_range\": null}\n]\n```";
        let tests = parse_extracted_tests(reply).unwrap();
        assert_eq!(
            tests,
            vec![
                ExtractedTest {
                    name: "Glucose".into(),
                    value: 98.0,
                    unit: "mg/dL".into(),
                    reference_range: Some("70 - 100".into()),
                },
                ExtractedTest {
                    name: "Hemoglobin".into(),
                    value: 14.2,
                    unit: "g/dL".into(),
                    reference_range: None,
                },
            ]
        );
    }

    #[test]
    fn ranges_normalized_or_dropped() {
        let reply = r#"[
            {"name": "eGFR", "value": 72, "unit": "mL/min", "reference_range": "->59"},
            {"name": "CRP", "value": 2, "unit": "mg/L", "reference_range": "-<5"},
            {"name": "TSH", "value": 1.9, "unit": "mIU/L", "reference_range": "normal"}
        ]"#;
        let tests = parse_extracted_tests(reply).unwrap();
        assert_eq!(tests[0].reference_range.as_deref(), Some(">59"));
        assert_eq!(tests[1].reference_range.as_deref(), Some("<5"));
        assert_eq!(tests[2].reference_range, None);
    }

    #[test]
    fn string_values_and_missing_units_tolerated() {
        let reply = r#"[{"name": "pH", "value": "7,4"}, {"name": "Note", "value": "see comment"}]"#;
        let tests = parse_extracted_tests(reply).unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].value, 7.4);
        assert_eq!(tests[0].unit, "");
    }

    #[test]
    fn invalid_json_is_upstream_parse() {
        for reply in ["Sorry, no results.", "{\"name\": \"Glucose\"}", ""] {
            assert!(matches!(
                parse_extracted_tests(reply),
                Err(InterpretationError::UpstreamParse(_))
            ));
        }
    }

    #[test]
    fn empty_array_is_ok() {
        assert!(parse_extracted_tests("[]").unwrap().is_empty());
    }
}
