//! FHIR R4 resource shapes used by the registry client. Only the fields
//! this service reads or writes are modelled; everything else the server
//! returns is ignored.

use serde::{Deserialize, Serialize};

pub const OBSERVATION_CATEGORY_SYSTEM: &str =
    "http://terminology.hl7.org/CodeSystem/observation-category";
pub const FHIR_JSON: &str = "application/fhir+json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientResource {
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Vec<HumanName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanName {
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub name_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default)]
    pub given: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationResource {
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: String,
    #[serde(default)]
    pub category: Vec<CodeableConcept>,
    pub code: CodeableConcept,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Reference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_date_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_quantity: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_range: Vec<ReferenceRange>,
}

impl ObservationResource {
    /// Display name: `code.text`, falling back to the first coding display.
    pub fn name(&self) -> Option<&str> {
        self.code.text.as_deref().or_else(|| {
            self.code
                .coding
                .iter()
                .find_map(|c| c.display.as_deref())
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Closed interval, lower bound only, or upper bound only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub low: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub high: Option<Quantity>,
}

/// Search result page.
#[derive(Debug, Clone, Deserialize)]
pub struct Bundle {
    #[serde(default)]
    pub entry: Vec<BundleEntry>,
    #[serde(default)]
    pub link: Vec<BundleLink>,
}

impl Bundle {
    pub fn next_link(&self) -> Option<&str> {
        self.link
            .iter()
            .find(|l| l.relation == "next")
            .map(|l| l.url.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleEntry {
    #[serde(default)]
    pub resource: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BundleLink {
    pub relation: String,
    pub url: String,
}

/// Response to a create: only the server-assigned id matters.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CreatedResource {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_parses_server_payload() {
        let raw = r#"{
            "resourceType": "Observation",
            "id": "42",
            "meta": {"versionId": "1"},
            "status": "final",
            "category": [{"coding": [{"system": "http://terminology.hl7.org/CodeSystem/observation-category", "code": "laboratory"}]}],
            "code": {"text": "Glucose"},
            "subject": {"reference": "Patient/7"},
            "effectiveDateTime": "2024-03-01",
            "valueQuantity": {"value": 98, "unit": "mg/dL"},
            "referenceRange": [{"low": {"value": 70, "unit": "mg/dL"}, "high": {"value": 100, "unit": "mg/dL"}}]
        }"#;
        let obs: ObservationResource = serde_json::from_str(raw).unwrap();
        assert_eq!(obs.id.as_deref(), Some("42"));
        assert_eq!(obs.name(), Some("Glucose"));
        assert_eq!(obs.value_quantity.unwrap().value, 98.0);
        assert_eq!(obs.reference_range[0].high.as_ref().unwrap().value, 100.0);
    }

    #[test]
    fn name_falls_back_to_coding_display() {
        let obs = ObservationResource {
            resource_type: "Observation".into(),
            id: None,
            status: "final".into(),
            category: vec![],
            code: CodeableConcept {
                coding: vec![Coding {
                    system: None,
                    code: Some("2345-7".into()),
                    display: Some("Glucose [Mass/volume]".into()),
                }],
                text: None,
            },
            subject: None,
            effective_date_time: None,
            value_quantity: None,
            reference_range: vec![],
        };
        assert_eq!(obs.name(), Some("Glucose [Mass/volume]"));
    }

    #[test]
    fn bundle_next_link() {
        let raw = r#"{"resourceType": "Bundle", "link": [
            {"relation": "self", "url": "http://x/Observation?subject=Patient/1"},
            {"relation": "next", "url": "http://x?_getpages=abc"}
        ], "entry": [{"resource": {"resourceType": "Observation", "id": "1"}}]}"#;
        let bundle: Bundle = serde_json::from_str(raw).unwrap();
        assert_eq!(bundle.next_link(), Some("http://x?_getpages=abc"));
        assert_eq!(bundle.entry.len(), 1);
    }

    #[test]
    fn patient_serializes_fhir_names() {
        let patient = PatientResource {
            resource_type: "Patient".into(),
            id: None,
            name: vec![HumanName {
                name_use: Some("official".into()),
                family: Some("Lovelace".into()),
                given: vec!["Ada".into()],
            }],
            birth_date: Some("1990-05-17".into()),
            gender: Some("female".into()),
        };
        let json = serde_json::to_value(&patient).unwrap();
        assert_eq!(json["resourceType"], "Patient");
        assert_eq!(json["name"][0]["use"], "official");
        assert_eq!(json["birthDate"], "1990-05-17");
        assert!(json.get("id").is_none());
    }
}
