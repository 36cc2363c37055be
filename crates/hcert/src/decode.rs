//! The certificate decode pipeline.
//!
//! Stages: literal prefix, base45 body, optional zlib, a signed envelope in
//! one of three shapes, then the CBOR claims payload. Every stage fails fast
//! with a typed [`FormatError`]; the only tolerated irregularities are
//! uncompressed envelopes (stage three passes the bytes through) and
//! unsupported map key types in the claims (dropped during
//! canonicalisation).

use std::io::Read;

use ciborium::value::Value as Cbor;
use coset::{CborSerializable, CoseSign, CoseSign1, TaggedCborSerializable};
use flate2::read::ZlibDecoder;

use crate::value::{canonicalize, Value};
use crate::{base45, FormatError, FormatResult};

/// Literal marker carried by every supported certificate.
pub const HCERT_PREFIX: &str = "HC1:";

/// Decode an `HC1:`-prefixed certificate string into its claims document.
///
/// Pure and deterministic: the same input always yields the same output, and
/// no state is shared between calls, so concurrent use needs no
/// coordination. The envelope signature is not verified.
///
/// # Errors
///
/// Each pipeline stage reports its own [`FormatError`] variant; see the
/// crate-level documentation for the taxonomy.
pub fn decode(raw: &str) -> FormatResult<Value> {
    let body = raw
        .strip_prefix(HCERT_PREFIX)
        .ok_or(FormatError::InvalidPrefix)?;
    let decoded = base45::decode(body)?;
    let envelope = inflate(decoded);
    let payload = envelope_payload(&envelope)?;
    decode_claims(&payload)
}

/// Attempt zlib decompression, keeping the raw bytes when the input is not
/// compressed. Envelopes are usually deflated but the format tolerates
/// plain ones.
fn inflate(bytes: Vec<u8>) -> Vec<u8> {
    let mut inflated = Vec::new();
    let result = ZlibDecoder::new(bytes.as_slice()).read_to_end(&mut inflated);
    match result {
        Ok(_) => inflated,
        Err(_) => {
            tracing::debug!("certificate body is not zlib-compressed, using it as is");
            bytes
        }
    }
}

/// Extract the signed-envelope payload, trying the single-signer schema,
/// the multi-signer schema and finally a raw CBOR sequence, in that order.
/// The first success wins; total failure aggregates all three causes.
fn envelope_payload(envelope: &[u8]) -> FormatResult<Vec<u8>> {
    let single = match single_signer_payload(envelope) {
        Ok(payload) => return Ok(payload),
        Err(cause) => cause,
    };
    let multi = match multi_signer_payload(envelope) {
        Ok(payload) => return Ok(payload),
        Err(cause) => cause,
    };
    let raw = match raw_envelope_payload(envelope) {
        Ok(payload) => return Ok(payload),
        Err(cause) => cause,
    };
    Err(FormatError::InvalidCoseEnvelope { single, multi, raw })
}

fn single_signer_payload(envelope: &[u8]) -> Result<Vec<u8>, String> {
    CoseSign1::from_tagged_slice(envelope)
        .or_else(|_| CoseSign1::from_slice(envelope))
        .map(|message| message.payload.unwrap_or_default())
        .map_err(|cause| cause.to_string())
}

fn multi_signer_payload(envelope: &[u8]) -> Result<Vec<u8>, String> {
    CoseSign::from_tagged_slice(envelope)
        .or_else(|_| CoseSign::from_slice(envelope))
        .map(|message| message.payload.unwrap_or_default())
        .map_err(|cause| cause.to_string())
}

/// The fallback for envelopes that fit neither typed schema: a CBOR
/// sequence (optionally behind one tag) whose third element holds the
/// payload bytes.
fn raw_envelope_payload(envelope: &[u8]) -> Result<Vec<u8>, String> {
    let raw: Cbor = ciborium::de::from_reader(envelope).map_err(|cause| cause.to_string())?;
    let items = match raw {
        Cbor::Array(items) => items,
        Cbor::Tag(_, inner) => match *inner {
            Cbor::Array(items) => items,
            _ => return Err("tagged envelope does not wrap a sequence".to_string()),
        },
        _ => return Err("envelope is not a CBOR sequence".to_string()),
    };
    if items.len() < 3 {
        return Err(format!(
            "envelope sequence has {} elements, expected at least 3",
            items.len()
        ));
    }
    match items.into_iter().nth(2) {
        Some(Cbor::Bytes(payload)) => Ok(payload),
        _ => Err("third envelope element is not a byte string".to_string()),
    }
}

fn decode_claims(payload: &[u8]) -> FormatResult<Value> {
    let claims: Cbor = ciborium::de::from_reader(payload)
        .map_err(|cause| FormatError::InvalidPayloadEncoding(cause.to_string()))?;
    if !matches!(claims, Cbor::Map(_)) {
        return Err(FormatError::InvalidPayloadEncoding(
            "claims payload is not a CBOR map".to_string(),
        ));
    }
    Ok(canonicalize(claims))
}
