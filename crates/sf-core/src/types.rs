//! Stable id newtypes shared across every adapter, broker, scheduler, and
//! engine boundary.
//!
//! Plain `String`s would let a `ToolId` be passed where a `WorkflowId` is
//! expected; these wrappers make that a compile error instead of a runtime
//! bug surfacing three subsystems away.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[must_use]
            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_newtype!(ScanId, "Unique identifier for a single scan request.");
id_newtype!(
    FindingId,
    "Deterministic hash-derived identifier of a unified finding, stable across re-runs."
);
id_newtype!(WorkflowId, "Unique identifier of a running or completed workflow.");
id_newtype!(ToolId, "Globally unique identifier of a registered tool adapter.");

/// A CVSS base score, always within `[0.0, 10.0]`.
///
/// Represented as a bounded newtype rather than a bare `f32` so the range
/// invariant is enforced once, at construction, instead of re-checked by
/// every caller that reads a finding's severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct CvssScore(f32);

impl CvssScore {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 10.0;

    pub fn new(value: f32) -> Result<Self, CvssScoreError> {
        if !(Self::MIN..=Self::MAX).contains(&value) || value.is_nan() {
            return Err(CvssScoreError::OutOfRange(value));
        }
        Ok(Self(value))
    }

    #[must_use]
    pub fn get(&self) -> f32 {
        self.0
    }
}

impl TryFrom<f32> for CvssScore {
    type Error = CvssScoreError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CvssScore> for f32 {
    fn from(score: CvssScore) -> Self {
        score.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CvssScoreError {
    #[error("CVSS score {0} outside the valid range [0.0, 10.0]")]
    OutOfRange(f32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_newtypes_round_trip_through_json() {
        let id = ScanId::new("scan-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"scan-1\"");
        let back: ScanId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn cvss_score_rejects_out_of_range() {
        assert!(CvssScore::new(-0.1).is_err());
        assert!(CvssScore::new(10.1).is_err());
        assert!(CvssScore::new(f32::NAN).is_err());
        assert!(CvssScore::new(0.0).is_ok());
        assert!(CvssScore::new(10.0).is_ok());
    }

    #[test]
    fn cvss_score_deserializes_with_validation() {
        let ok: CvssScore = serde_json::from_str("7.5").unwrap();
        assert_eq!(ok.get(), 7.5);
        let err: Result<CvssScore, _> = serde_json::from_str("11.0");
        assert!(err.is_err());
    }
}
