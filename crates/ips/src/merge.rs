//! Merging two IPS bundles into one deduplicated superset.
//!
//! The merge is composition-driven: sections are combined by their first
//! coding's `code`, then every referenced entry is materialised from the
//! current bundle first and the new bundle second, with a one-hop expansion
//! through reference fields found on resolved resources. Inputs are read
//! only; the output is a freshly identified bundle stamped at merge time.

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::bundle::{Bundle, Composition, Entry, Reference, Section, IPS_COMPOSITION_CODE};
use crate::{BundleSide, MergeError, MergeResult};

/// Merge two IPS bundle documents.
///
/// Both inputs are generic JSON-shaped documents, as exchanged with the
/// surrounding service layer; they are decoded into the wire model, merged
/// with [`merge_bundles`] and re-encoded.
///
/// # Errors
///
/// [`MergeError::MalformedBundle`] when an input does not decode into the
/// bundle shape (the detail names the failing field path),
/// [`MergeError::MissingComposition`] when a side holds no IPS composition,
/// and [`MergeError::InternalError`] when the merged bundle cannot be
/// re-encoded.
pub fn merge(
    current: &Map<String, Value>,
    new: &Map<String, Value>,
) -> MergeResult<Map<String, Value>> {
    let current_bundle = decode_bundle(current, BundleSide::Current)?;
    let new_bundle = decode_bundle(new, BundleSide::New)?;
    let merged = merge_bundles(&current_bundle, &new_bundle)?;
    match serde_json::to_value(&merged)
        .map_err(|cause| MergeError::InternalError(cause.to_string()))?
    {
        Value::Object(document) => Ok(document),
        _ => Err(MergeError::InternalError(
            "merged bundle did not encode to an object".to_string(),
        )),
    }
}

/// Merge two decoded bundles. See [`merge`] for the document-level entry
/// point.
pub fn merge_bundles(current: &Bundle, new: &Bundle) -> MergeResult<Bundle> {
    let current_composition = extract_composition(&current.entry)
        .ok_or(MergeError::MissingComposition(BundleSide::Current))?;
    let new_composition =
        extract_composition(&new.entry).ok_or(MergeError::MissingComposition(BundleSide::New))?;

    let mut composition = current_composition;
    for section in new_composition.section {
        merge_section(&mut composition.section, section);
    }

    let full_url = std::mem::take(&mut composition.url);
    let resource = composition_resource(&composition)?;

    let mut merged = Bundle {
        id: Uuid::new_v4().to_string(),
        identifier: current.identifier.clone(),
        meta: current.meta.clone(),
        resource_type: current.resource_type.clone(),
        signature: None,
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        bundle_type: current.bundle_type.clone(),
        entry: vec![Entry {
            full_url,
            resource: Some(resource),
        }],
    };

    for section in &composition.section {
        materialize_section(section, &current.entry, &new.entry, &mut merged.entry);
    }

    dedup_entries(&mut merged.entry);
    Ok(merged)
}

fn decode_bundle(document: &Map<String, Value>, side: BundleSide) -> MergeResult<Bundle> {
    serde_path_to_error::deserialize(Value::Object(document.clone())).map_err(|err| {
        let path = err.path().to_string();
        let source = err.into_inner();
        let at = if path.is_empty() {
            "<root>".to_string()
        } else {
            path
        };
        MergeError::MalformedBundle {
            side,
            detail: format!("schema mismatch at {at}: {source}"),
        }
    })
}

/// Find the IPS composition among `entries`: a `Composition` resource whose
/// first type coding carries the patient-summary LOINC code. The returned
/// composition remembers its entry's `fullUrl` in its transient tracking
/// URL and keeps only sections that carry a coding at all.
fn extract_composition(entries: &[Entry]) -> Option<Composition> {
    for entry in entries {
        let Some(resource) = entry.resource.as_ref() else {
            continue;
        };
        if resource.get("resourceType").and_then(Value::as_str) != Some("Composition") {
            continue;
        }
        let Ok(mut composition) =
            serde_json::from_value::<Composition>(Value::Object(resource.clone()))
        else {
            continue;
        };
        let code = composition
            .composition_type
            .coding
            .as_ref()
            .and_then(|coding| coding.first())
            .and_then(|first| first.get("code"))
            .and_then(Value::as_str);
        if code != Some(IPS_COMPOSITION_CODE) {
            continue;
        }
        composition.url = entry.full_url.clone();
        composition
            .section
            .retain(|section| section.code.coding.is_some());
        return Some(composition);
    }
    None
}

/// The merge identity of a section: its first coding's non-null `code`.
fn section_code(section: &Section) -> Option<&Value> {
    let code = section.code.coding.as_ref()?.first()?.get("code")?;
    (!code.is_null()).then_some(code)
}

/// Fold one incoming section into the merged section list: append it whole
/// when its code is unseen, otherwise append only the entry references the
/// matched section does not already hold. Existing entries keep their
/// order; sections without a usable code are skipped.
fn merge_section(merged: &mut Vec<Section>, section: Section) {
    let Some(code) = section_code(&section).cloned() else {
        tracing::debug!(title = %section.title, "skipping section without a coded identity");
        return;
    };
    match merged
        .iter_mut()
        .find(|existing| section_code(existing) == Some(&code))
    {
        None => merged.push(section),
        Some(existing) => {
            for entry in section.entry {
                let known = existing
                    .entry
                    .iter()
                    .any(|held| held.get("reference") == entry.get("reference"));
                if !known {
                    existing.entry.push(entry);
                }
            }
        }
    }
}

fn composition_resource(composition: &Composition) -> MergeResult<Map<String, Value>> {
    match serde_json::to_value(composition)
        .map_err(|cause| MergeError::InternalError(cause.to_string()))?
    {
        Value::Object(resource) => Ok(resource),
        _ => Err(MergeError::InternalError(
            "merged composition did not encode to an object".to_string(),
        )),
    }
}

/// Resolve one section's entry references into bundle entries, looking the
/// current bundle up before the new one. The first unresolvable reference
/// stops this section's resolution (the remaining references stay listed in
/// the composition but are not materialised); each resolved resource gets
/// one extra hop through its reference-bearing fields.
fn materialize_section(section: &Section, current: &[Entry], new: &[Entry], out: &mut Vec<Entry>) {
    for section_entry in &section.entry {
        let Some(reference) = section_entry.get("reference").and_then(Value::as_str) else {
            tracing::warn!(
                title = %section.title,
                "section entry without a reference string, stopping this section"
            );
            break;
        };
        let Some(resolved) = lookup_entry(reference, current, new) else {
            tracing::warn!(reference, "unresolved section reference, stopping this section");
            break;
        };
        out.push(resolved.clone());
        let Some(resource) = resolved.resource.as_ref() else {
            break;
        };
        for (key, value) in resource {
            if !key.to_ascii_lowercase().contains("reference") {
                continue;
            }
            let Some(target) = reference_target(value) else {
                continue;
            };
            if let Some(extra) = lookup_entry(&target, current, new) {
                out.push(extra.clone());
            }
        }
    }
}

/// Interpret a resource field as a reference object, yielding its non-empty
/// target string. Field names are matched by substring, so values that do
/// not look like reference objects are simply passed over.
fn reference_target(value: &Value) -> Option<String> {
    if !value.is_object() {
        return None;
    }
    let reference: Reference = serde_json::from_value(value.clone()).ok()?;
    (!reference.reference.is_empty()).then_some(reference.reference)
}

fn lookup_entry<'a>(reference: &str, current: &'a [Entry], new: &'a [Entry]) -> Option<&'a Entry> {
    current
        .iter()
        .find(|entry| entry.full_url == reference)
        .or_else(|| new.iter().find(|entry| entry.full_url == reference))
}

/// Keep the first occurrence of every `fullUrl`, preserving order.
fn dedup_entries(entries: &mut Vec<Entry>) {
    let mut seen = std::collections::HashSet::new();
    entries.retain(|entry| seen.insert(entry.full_url.clone()));
}
