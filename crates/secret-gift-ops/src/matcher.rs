//! Opaque biometric capability used by identity verification.
//!
//! Detection and encoding live outside this workspace. The exchange only
//! needs two things from a matcher: turn an image into a fixed-length feature
//! vector, and decide whether two vectors belong to the same person.

use serde::{Deserialize, Serialize};

/// Distance threshold under which two encodings are considered a match.
pub const DEFAULT_TOLERANCE: f64 = 0.6;

/// Fixed-length numeric face descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceEncoding(Vec<f64>);

impl FaceEncoding {
    /// Wrap raw feature values.
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// The raw feature values.
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Number of dimensions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the encoding has no dimensions.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean distance, or `None` when dimensions differ.
    pub fn distance(&self, other: &FaceEncoding) -> Option<f64> {
        if self.len() != other.len() {
            return None;
        }
        let sum: f64 = self
            .0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        Some(sum.sqrt())
    }
}

impl From<Vec<f64>> for FaceEncoding {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

/// External face detection / comparison capability.
pub trait FaceMatcher: Send + Sync {
    /// Detect a face in `image` and encode it. `None` when no face is found.
    fn detect_and_encode(&self, image: &[u8]) -> Option<FaceEncoding>;

    /// Whether `probe` matches `known` within `tolerance`.
    fn compare(&self, known: &FaceEncoding, probe: &FaceEncoding, tolerance: f64) -> bool {
        known
            .distance(probe)
            .is_some_and(|distance| distance <= tolerance)
    }
}

/// Matcher for images that were already encoded upstream.
///
/// The "image" is a JSON array of numbers. Empty or unparsable input counts
/// as no face detected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrecomputedEncodings;

impl FaceMatcher for PrecomputedEncodings {
    fn detect_and_encode(&self, image: &[u8]) -> Option<FaceEncoding> {
        serde_json::from_slice::<Vec<f64>>(image)
            .ok()
            .filter(|values| !values.is_empty())
            .map(FaceEncoding::new)
    }
}
