//! FHIR wire models for IPS document bundles.
//!
//! These are boundary types: lenient about absent fields (upstream document
//! stores vary in what they populate), strict about field types, and
//! round-trip safe for the fields they model. Resources other than
//! `Composition` stay untyped maps, addressed by their entry `fullUrl`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// LOINC code identifying the IPS patient-summary `Composition`.
pub const IPS_COMPOSITION_CODE: &str = "60591-5";

/// A FHIR document bundle: addressable entries plus document metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<Value>,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, rename = "type")]
    pub bundle_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<Entry>,
}

/// A single bundle entry: the addressing URL and its untyped resource.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    #[serde(default)]
    pub full_url: String,
    #[serde(default)]
    pub resource: Option<Map<String, Value>>,
}

/// The IPS clinical summary document skeleton.
///
/// `url` is transient bookkeeping: it holds the entry `fullUrl` the
/// composition was lifted from while a merge is in flight, and is stripped
/// before the merged bundle is emitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<Value>,
    #[serde(default, rename = "type")]
    pub composition_type: CodeableConcept,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub author: Vec<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub confidentiality: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custodian: Option<Value>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub section: Vec<Section>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
}

/// A minimal coded concept: only the coding list is modelled.
///
/// `coding` stays an `Option` because an absent list and an empty list mean
/// different things to the merge: a section with no `coding` at all is
/// dropped from merge output, one with an empty list survives extraction
/// but never matches by code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coding: Option<Vec<Map<String, Value>>>,
}

/// One composition section: a coded grouping of entry references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default)]
    pub code: CodeableConcept,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entry: Vec<Map<String, Value>>,
}

/// A bare FHIR reference object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(default)]
    pub reference: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bundle_round_trips_through_the_wire_model() {
        let document = json!({
            "id": "3f64f1a9-0e02-4d5c-9e6c-8e74ad25e5c1",
            "identifier": {"system": "urn:ietf:rfc:3986", "value": "urn:uuid:f1f7e7c0"},
            "meta": {"profile": ["http://hl7.org/fhir/uv/ips/StructureDefinition/Bundle-uv-ips"]},
            "resourceType": "Bundle",
            "timestamp": "2026-01-10T09:30:00.000Z",
            "type": "document",
            "entry": [
                {
                    "fullUrl": "urn:uuid:composition-1",
                    "resource": {
                        "resourceType": "Composition",
                        "status": "final",
                        "title": "Patient Summary",
                        "date": "2026-01-09"
                    }
                },
                {
                    "fullUrl": "urn:uuid:patient-1",
                    "resource": {"resourceType": "Patient", "birthDate": "1984-02-20"}
                }
            ]
        });

        let bundle: Bundle = serde_json::from_value(document.clone()).expect("parse bundle");
        assert_eq!(
            serde_json::to_value(&bundle).expect("serialize bundle"),
            document
        );
    }

    #[test]
    fn absent_optional_fields_are_not_serialized() {
        let bundle = Bundle {
            id: "b-1".to_string(),
            resource_type: "Bundle".to_string(),
            timestamp: "2026-01-10T09:30:00.000Z".to_string(),
            bundle_type: "document".to_string(),
            ..Bundle::default()
        };

        let document = serde_json::to_value(&bundle).expect("serialize bundle");
        let object = document.as_object().expect("bundle object");
        assert!(!object.contains_key("identifier"));
        assert!(!object.contains_key("meta"));
        assert!(!object.contains_key("signature"));
        assert!(!object.contains_key("entry"));
    }

    #[test]
    fn entry_without_resource_serializes_an_explicit_null() {
        let entry = Entry {
            full_url: "urn:uuid:gone".to_string(),
            resource: None,
        };
        assert_eq!(
            serde_json::to_value(&entry).expect("serialize entry"),
            json!({"fullUrl": "urn:uuid:gone", "resource": null})
        );
    }

    #[test]
    fn absent_and_empty_codings_stay_distinct() {
        let absent: CodeableConcept = serde_json::from_value(json!({})).expect("parse absent");
        assert!(absent.coding.is_none());

        let empty: CodeableConcept =
            serde_json::from_value(json!({"coding": []})).expect("parse empty");
        assert_eq!(empty.coding, Some(Vec::new()));
    }

    #[test]
    fn composition_parses_from_a_resource_map() {
        let resource = json!({
            "resourceType": "Composition",
            "id": "composition-1",
            "status": "final",
            "title": "Patient Summary",
            "type": {"coding": [{"system": "http://loinc.org", "code": IPS_COMPOSITION_CODE}]},
            "section": [
                {
                    "title": "Allergies",
                    "code": {"coding": [{"code": "48765-2"}]},
                    "entry": [{"reference": "urn:uuid:allergy-1"}]
                }
            ]
        });

        let composition: Composition =
            serde_json::from_value(resource).expect("parse composition");
        assert_eq!(composition.resource_type, "Composition");
        assert_eq!(composition.section.len(), 1);
        assert_eq!(composition.section[0].title, "Allergies");
        assert_eq!(
            composition.section[0].entry[0].get("reference"),
            Some(&json!("urn:uuid:allergy-1"))
        );
    }
}
