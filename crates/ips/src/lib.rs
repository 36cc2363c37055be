//! IPS bundle wire support and merging.
//!
//! This crate carries the FHIR International Patient Summary boundary types
//! (document bundles of `fullUrl`-addressed entries around a `Composition`)
//! and the pure merge engine that combines two IPS bundles into one
//! deduplicated superset.
//!
//! Merging is synchronous and side-effect free: inputs are never mutated,
//! every call allocates a fresh output bundle, and no state is shared
//! between calls, so concurrent callers need no coordination. Fetching
//! bundles from document repositories and serving merge results belongs to
//! the service layer, not here.

pub mod bundle;
pub mod merge;

use std::fmt;

use thiserror::Error;

pub use bundle::{
    Bundle, CodeableConcept, Composition, Entry, Reference, Section, IPS_COMPOSITION_CODE,
};
pub use merge::{merge, merge_bundles};

/// Which input bundle an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleSide {
    /// The bundle already held for the patient.
    Current,
    /// The incoming bundle being merged in.
    New,
}

impl fmt::Display for BundleSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleSide::Current => write!(f, "current"),
            BundleSide::New => write!(f, "new"),
        }
    }
}

/// Errors returned by the bundle merge engine.
#[derive(Debug, Error)]
pub enum MergeError {
    /// An input document does not have the bundle shape.
    #[error("malformed {side} bundle: {detail}")]
    MalformedBundle { side: BundleSide, detail: String },

    /// An input bundle holds no IPS composition entry.
    #[error("{0} bundle has no IPS composition")]
    MissingComposition(BundleSide),

    /// Re-encoding the merged bundle into its document form failed.
    #[error("merged bundle re-encoding failed: {0}")]
    InternalError(String),
}

/// Type alias for Results that can fail with a [`MergeError`].
pub type MergeResult<T> = Result<T, MergeError>;
