use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::enums::Gender;
use crate::registry::types::{ObservationResource, ReferenceRange};

/// Ages below this many months are described in months, with a pediatric
/// flag in the prompt.
const PEDIATRIC_MONTHS: u32 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgeDescriptor {
    pub text: String,
    pub pediatric: bool,
}

/// Whole years, or `"<n> months"` under two years. Never negative.
pub fn age_descriptor(birth_date: NaiveDate, on: NaiveDate) -> AgeDescriptor {
    let mut months =
        (on.year() - birth_date.year()) * 12 + on.month() as i32 - birth_date.month() as i32;
    if on.day() < birth_date.day() {
        months -= 1;
    }
    let months = months.max(0) as u32;

    if months < PEDIATRIC_MONTHS {
        let unit = if months == 1 { "month" } else { "months" };
        AgeDescriptor {
            text: format!("{months} {unit}"),
            pediatric: true,
        }
    } else {
        AgeDescriptor {
            text: format!("{} years", months / 12),
            pediatric: false,
        }
    }
}

/// What the model sees of one observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationSummary {
    pub name: String,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
}

impl ObservationSummary {
    /// `None` when the resource carries no test name.
    pub fn from_resource(resource: &ObservationResource) -> Option<Self> {
        let name = resource.name()?.to_string();
        let quantity = resource.value_quantity.as_ref();
        Some(Self {
            name,
            value: quantity.map(|q| q.value),
            unit: quantity.and_then(|q| q.unit.clone()),
            reference_range: resource.reference_range.first().and_then(format_range),
        })
    }

    fn prompt_line(&self) -> String {
        let mut line = format!("- {}:", self.name);
        match self.value {
            Some(value) => line.push_str(&format!(" {value}")),
            None => line.push_str(" (no value)"),
        }
        if let Some(unit) = &self.unit {
            line.push_str(&format!(" {unit}"));
        }
        if let Some(range) = &self.reference_range {
            line.push_str(&format!(" (reference range: {range})"));
        }
        line
    }
}

fn format_range(range: &ReferenceRange) -> Option<String> {
    match (&range.low, &range.high) {
        (Some(low), Some(high)) => Some(format!("{} - {}", low.value, high.value)),
        (Some(low), None) => Some(format!(">{}", low.value)),
        (None, Some(high)) => Some(format!("<{}", high.value)),
        (None, None) => None,
    }
}

pub(crate) fn extraction_prompt(ocr_text: &str) -> String {
    format!(
        r#"You are an AI assistant that extracts lab test results from unstructured text.
The input is an OCR-extracted document that contains medical lab tests, along with some irrelevant text.

Your task: identify and extract only the lab test results, structured as a JSON array:

[
    {{"name": "Glucose", "value": 98, "unit": "mg/dL", "reference_range": "70 - 100"}},
    {{"name": "Hemoglobin", "value": 14.2, "unit": "g/dL", "reference_range": "12.0 - 15.5"}}
]

Guidelines:
- Only extract lab test results (ignore patient name, address, doctor name, etc.).
- Use the units exactly as printed (e.g. mg/dL, mmol/L, IU/mL).
- Include reference ranges when available, formatted as "low - high", ">X" or "<X".
- If a reference range is missing from the document, use null for "reference_range". Do not guess it.
- Output only valid JSON, without markdown code fences.

OCR-extracted text:
---
{ocr_text}
---

Return the structured lab results as JSON:"#
    )
}

pub(crate) fn interpretation_prompt(
    observations: &[ObservationSummary],
    gender: Gender,
    age: &AgeDescriptor,
) -> String {
    let results = observations
        .iter()
        .map(ObservationSummary::prompt_line)
        .collect::<Vec<_>>()
        .join("\n");

    let pediatric_note = if age.pediatric {
        "\nThis is a pediatric patient under two years old. Use pediatric reference \
         values and mention that adult ranges do not apply.\n"
    } else {
        ""
    };

    format!(
        r#"You are a medical assistant explaining lab results to a patient in plain language.

Patient: {gender}, age {age}.
{pediatric_note}
Lab results:
{results}

For each result, say whether it is within, above or below its reference range and what that usually means, in terms a non-specialist understands. Then give a short overall summary of how the results relate to each other. Do not make a diagnosis. Recommend discussing any out-of-range values with a doctor."#,
        gender = gender.as_str(),
        age = age.text,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::types::Quantity;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn adult_age_in_whole_years() {
        let age = age_descriptor(date(1990, 5, 17), date(2024, 5, 16));
        assert_eq!(age.text, "33 years");
        assert!(!age.pediatric);
        assert_eq!(age_descriptor(date(1990, 5, 17), date(2024, 5, 17)).text, "34 years");
    }

    #[test]
    fn under_two_years_in_months() {
        let age = age_descriptor(date(2023, 1, 31), date(2024, 3, 1));
        assert_eq!(age.text, "13 months");
        assert!(age.pediatric);
        assert_eq!(age_descriptor(date(2024, 1, 1), date(2024, 2, 1)).text, "1 month");
        assert_eq!(age_descriptor(date(2022, 3, 1), date(2024, 3, 1)).text, "2 years");
    }

    #[test]
    fn future_birth_date_clamps_to_zero() {
        assert_eq!(age_descriptor(date(2025, 1, 1), date(2024, 1, 1)).text, "0 months");
    }

    #[test]
    fn summary_from_resource_formats_range() {
        let json = r#"{
            "resourceType": "Observation", "id": "5", "status": "final",
            "code": {"text": "eGFR"},
            "valueQuantity": {"value": 72.5, "unit": "mL/min"},
            "referenceRange": [{"low": {"value": 59, "unit": "mL/min"}}]
        }"#;
        let resource: ObservationResource = serde_json::from_str(json).unwrap();
        let summary = ObservationSummary::from_resource(&resource).unwrap();
        assert_eq!(summary.name, "eGFR");
        assert_eq!(summary.reference_range.as_deref(), Some(">59"));
        assert_eq!(summary.prompt_line(), "- eGFR: 72.5 mL/min (reference range: >59)");
    }

    #[test]
    fn high_only_range() {
        let range = ReferenceRange {
            low: None,
            high: Some(Quantity {
                value: 5.0,
                unit: None,
            }),
        };
        assert_eq!(format_range(&range).as_deref(), Some("<5"));
    }

    #[test]
    fn extraction_prompt_embeds_text() {
        let prompt = extraction_prompt("WBC 6.1 10^9/L");
        assert!(prompt.contains("WBC 6.1 10^9/L"));
        assert!(prompt.contains("\"reference_range\": \"70 - 100\""));
    }
}
