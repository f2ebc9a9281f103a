use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Triage bucket assigned to an email by classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Needs attention now (deadline, overdue, escalation).
    Urgent,
    /// Sender is waiting on a reply.
    NeedsReply,
    /// Something to do that is not a reply (sign, file, schedule).
    ActionRequired,
    /// Ball is in someone else's court.
    Waiting,
    /// Informational only.
    Fyi,
    /// Nothing to do.
    Archive,
}

impl Bucket {
    pub const ALL: [Bucket; 6] = [
        Self::Urgent,
        Self::NeedsReply,
        Self::ActionRequired,
        Self::Waiting,
        Self::Fyi,
        Self::Archive,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::NeedsReply => "needs_reply",
            Self::ActionRequired => "action_required",
            Self::Waiting => "waiting",
            Self::Fyi => "fyi",
            Self::Archive => "archive",
        }
    }

    /// Whether emails in this bucket expect the user to do something.
    pub fn is_actionable(&self) -> bool {
        matches!(self, Self::Urgent | Self::NeedsReply | Self::ActionRequired)
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|bucket| bucket.as_str() == s)
            .ok_or_else(|| TypeError::UnknownBucket(s.to_string()))
    }
}

/// Classification confidence, guaranteed finite and within `[0.0, 1.0]`.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    pub const CERTAIN: Confidence = Confidence(1.0);

    /// Validate a raw score. NaN and infinities are out of range.
    pub fn new(value: f64) -> Result<Self, TypeError> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(TypeError::ConfidenceOutOfRange(value))
        }
    }

    pub const fn value(&self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Confidence {
    type Error = TypeError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(confidence: Confidence) -> Self {
        confidence.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
