//! Fusion of the base score with the behavioral score

use crate::behavioral::{BehavioralDetails, BehavioralFactor, BehavioralResult};
use crate::geolocation::Coordinates;
use serde::{Deserialize, Serialize};

/// Final scores at or above this are always fraud
pub const FRAUD_THRESHOLD: u8 = 75;

/// Combine base and behavioral scores; the stronger one wins
pub fn fuse(base_score: u8, behavioral_score: u8) -> u8 {
    base_score.max(behavioral_score)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,      // 0-25
    Medium,   // 26-50
    High,     // 51-74
    Critical, // 75-100, same cut as FRAUD_THRESHOLD
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=25 => RiskLevel::Low,
            26..=50 => RiskLevel::Medium,
            s if s < FRAUD_THRESHOLD => RiskLevel::High,
            _ => RiskLevel::Critical,
        }
    }
}

/// Where the candidate was compared to where the previous transaction was
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationComparison {
    pub current: Coordinates,
    pub previous: Option<Coordinates>,
}

/// Fused verdict for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedVerdict {
    pub is_fraud: bool,
    pub final_score: u8,
    pub ml_score: u8,
    pub behavioral_score: u8,
    pub factors: Vec<BehavioralFactor>,
    pub details: BehavioralDetails,
    pub location_comparison: LocationComparison,
}

impl FusedVerdict {
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.final_score)
    }
}

/// Applies [`fuse`] and the fraud upgrade rule
#[derive(Debug, Clone, Copy, Default)]
pub struct RiskFusion;

impl RiskFusion {
    /// Fuse a base verdict with a behavioral result.
    ///
    /// `base_is_fraud` is kept when set; a final score of [`FRAUD_THRESHOLD`]
    /// or more turns it on.
    pub fn combine(
        &self,
        base_score: u8,
        base_is_fraud: bool,
        behavioral: BehavioralResult,
        location_comparison: LocationComparison,
    ) -> FusedVerdict {
        let base_score = base_score.min(100);
        let final_score = fuse(base_score, behavioral.score);

        FusedVerdict {
            is_fraud: base_is_fraud || final_score >= FRAUD_THRESHOLD,
            final_score,
            ml_score: base_score,
            behavioral_score: behavioral.score,
            factors: behavioral.factors,
            details: behavioral.details,
            location_comparison,
        }
    }
}
