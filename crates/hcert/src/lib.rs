//! HCERT health-certificate decoding.
//!
//! This crate turns a compact `HC1:`-prefixed certificate string into a
//! structured claims document. The pipeline is base45 text decoding, an
//! optional zlib decompression, a COSE-style signed envelope (single-signer,
//! multi-signer, or a raw CBOR sequence as a last resort) and finally a CBOR
//! claims payload whose heterogeneously typed map keys are canonicalised to
//! strings.
//!
//! Responsibilities:
//! - Decode the base45 body behind the `HC1:` marker
//! - Unwrap the signed envelope without verifying its signature
//! - Render the claims into the string-keyed [`Value`] model
//!
//! Decoding is pure: no I/O, no shared mutable state beyond a compile-time
//! alphabet table, safe to call from any number of threads concurrently.
//! Signature verification is deliberately not performed here; it belongs to
//! the trust layer that owns the signer key material.

pub mod base45;
pub mod decode;
pub mod value;

use thiserror::Error;

pub use decode::{decode, HCERT_PREFIX};
pub use value::Value;

/// Errors returned by the certificate decoding pipeline.
#[derive(Debug, Error)]
pub enum FormatError {
    /// The input does not carry the `HC1:` marker.
    #[error("certificate does not start with the HC1: prefix")]
    InvalidPrefix,

    /// The base45 body holds a symbol outside the alphabet.
    #[error("invalid base45 symbol {character:?} at offset {offset}")]
    InvalidBase45Character { character: char, offset: usize },

    /// A base45 group whose value does not fit the bytes it carries.
    #[error("invalid base45 group at offset {offset}: {reason}")]
    InvalidBase45Encoding { offset: usize, reason: String },

    /// None of the three envelope interpretations accepted the bytes.
    #[error(
        "unrecognised signed envelope (single-signer: {single}; multi-signer: {multi}; raw: {raw})"
    )]
    InvalidCoseEnvelope {
        single: String,
        multi: String,
        raw: String,
    },

    /// The envelope payload is not a CBOR claims map.
    #[error("invalid claims payload: {0}")]
    InvalidPayloadEncoding(String),
}

/// Type alias for Results that can fail with a [`FormatError`].
pub type FormatResult<T> = Result<T, FormatError>;
