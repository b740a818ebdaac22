//! # Behavioral Risk Engine
//!
//! Transaction risk scoring that fuses a base score (a pretrained classifier
//! or a rule-based simulation) with behavioral anomaly signals computed over
//! a short rolling history.
//!
//! ## Features
//!
//! - **Behavioral Signals**: transaction velocity, spending deviation and
//!   impossible location jumps
//! - **Max Fusion**: the strongest of the base and behavioral scores wins;
//!   any final score of 75 or more is fraud
//! - **Approximate Geolocation**: city table lookup with a stable fallback
//!   for unknown labels
//! - **Session Histories**: one shared timeline by default, optionally one
//!   history per session
//! - **Guardian Assistant**: canned explanations of flagged transactions
//! - **Demo Accounts**: signup/login persisted to a local JSON workbook

#[cfg(feature = "accounts")]
pub mod accounts;
#[cfg(feature = "assistant")]
pub mod assistant;
pub mod base_score;
pub mod behavioral;
pub mod config;
pub mod fusion;
pub mod geolocation;
pub mod history;
pub mod protocol;

#[cfg(feature = "accounts")]
pub use accounts::{Account, AccountError, AccountStore};
#[cfg(feature = "assistant")]
pub use assistant::{ChatContext, Guardian};
pub use base_score::{BaseScore, BaseScorer, Classifier, ModelError, RuleBasedSimulator};
pub use behavioral::{BehavioralAnalyzer, BehavioralFactor, BehavioralResult, BehavioralThresholds};
pub use fusion::{fuse, FusedVerdict, LocationComparison, RiskFusion, RiskLevel, FRAUD_THRESHOLD};
pub use geolocation::{Coordinates, GeoApproximator};
pub use protocol::{EngineRequest, RequestHandler};
pub use history::{
    HistoryStore, SessionHistories, TransactionRecord, DEFAULT_MAX_SESSIONS, MAX_HISTORY,
};

use base_score::ScoringInput;
use behavioral::BehavioralDetails;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Scoring errors
#[derive(Error, Debug)]
pub enum ScoringError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Classifier failed: {0}")]
    Classifier(#[from] ModelError),
}

/// Scoring service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Records kept per history
    pub max_history: usize,
    /// Keep a separate history per request session instead of one shared timeline
    pub session_isolation: bool,
    /// Session histories kept at once; the least recently used is evicted
    pub max_sessions: usize,
    pub behavioral: BehavioralThresholds,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            max_history: MAX_HISTORY,
            session_isolation: false,
            max_sessions: DEFAULT_MAX_SESSIONS,
            behavioral: BehavioralThresholds::default(),
        }
    }
}

/// A simulated transaction as submitted by the demo form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionRequest {
    pub amount: f64,
    pub merchant: String,
    pub card_type: String,
    /// Free text, usually "City, State"
    pub location: String,
    /// `YYYY-MM-DD`; today when absent
    pub date: Option<String>,
    /// `HH:MM`
    pub time: String,
    pub session_id: Option<String>,
}

impl Default for TransactionRequest {
    fn default() -> Self {
        Self {
            amount: 0.0,
            merchant: "unknown".to_string(),
            card_type: "misc_net".to_string(),
            location: "Unknown, UNK".to_string(),
            date: None,
            time: "00:00".to_string(),
            session_id: None,
        }
    }
}

impl TransactionRequest {
    /// Split the location into city and state (`UNK` when there is no comma)
    pub fn city_and_state(&self) -> (&str, &str) {
        match self.location.split_once(',') {
            Some((city, state)) => (city.trim(), state.trim()),
            None => (self.location.as_str(), "UNK"),
        }
    }

    /// Unix timestamp of the request's date and time, read as UTC.
    ///
    /// Falls back to the current time when either part does not parse.
    pub fn timestamp_unix(&self) -> f64 {
        let date = match &self.date {
            Some(d) => NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d").ok(),
            None => Some(Utc::now().date_naive()),
        };
        let time = NaiveTime::parse_from_str(self.time.trim(), "%H:%M").ok();

        match (date, time) {
            (Some(d), Some(t)) => {
                let naive = NaiveDateTime::new(d, t);
                DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc).timestamp() as f64
            }
            _ => Utc::now().timestamp() as f64,
        }
    }
}

/// Outward verdict for one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResponse {
    pub transaction_id: Uuid,
    pub is_fraud: bool,
    pub risk_score: u8,
    pub ml_score: u8,
    pub behavioral_score: u8,
    pub risk_factors: Vec<BehavioralFactor>,
    pub details: BehavioralDetails,
    pub location_data: LocationComparison,
    pub message: String,
}

impl ScoreResponse {
    fn from_verdict(transaction_id: Uuid, verdict: FusedVerdict) -> Self {
        Self {
            transaction_id,
            is_fraud: verdict.is_fraud,
            risk_score: verdict.final_score,
            ml_score: verdict.ml_score,
            behavioral_score: verdict.behavioral_score,
            risk_factors: verdict.factors,
            details: verdict.details,
            location_data: verdict.location_comparison,
            message: "Analysis complete".to_string(),
        }
    }

    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.risk_score)
    }

    /// Export as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Scores transactions end to end
pub struct ScoringService {
    config: ScoringConfig,
    geo: GeoApproximator,
    analyzer: BehavioralAnalyzer,
    fusion: RiskFusion,
    base: BaseScorer,
    histories: SessionHistories,
}

impl ScoringService {
    /// Create a service that simulates the base score
    pub fn new() -> Self {
        Self::with_config(ScoringConfig::default())
    }

    /// Create a service with custom configuration and a simulated base score
    pub fn with_config(config: ScoringConfig) -> Self {
        Self::with_base_scorer(config, BaseScorer::simulated())
    }

    /// Create a service with custom configuration and base scorer
    pub fn with_base_scorer(config: ScoringConfig, base: BaseScorer) -> Self {
        Self {
            geo: GeoApproximator::new(),
            analyzer: BehavioralAnalyzer::with_thresholds(config.behavioral.clone()),
            fusion: RiskFusion,
            histories: SessionHistories::with_limits(config.max_history, config.max_sessions),
            base,
            config,
        }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn geo(&self) -> &GeoApproximator {
        &self.geo
    }

    /// Number of session histories currently held
    pub fn session_count(&self) -> usize {
        self.histories.session_count()
    }

    /// Score a transaction using the thread-local random generator
    pub fn score(&self, request: &TransactionRequest) -> Result<ScoreResponse, ScoringError> {
        self.score_with(request, &mut rand::thread_rng())
    }

    /// Score a transaction, drawing all randomness from `rng`.
    ///
    /// The candidate is analyzed against the history and then committed to
    /// it under a single lock, so concurrent requests on one history never
    /// interleave.
    pub fn score_with<R: Rng>(
        &self,
        request: &TransactionRequest,
        rng: &mut R,
    ) -> Result<ScoreResponse, ScoringError> {
        validate_amount(request.amount)?;

        let transaction_id = Uuid::new_v4();
        let (city, state) = request.city_and_state();
        let timestamp_unix = request.timestamp_unix();
        let coordinates = self.geo.resolve_with(&request.location, rng);

        let input = ScoringInput {
            amount: request.amount,
            coordinates,
            merchant: &request.merchant,
            category: &request.card_type,
            city,
            state,
            location_label: &request.location,
            timestamp_unix,
        };
        let base = self.base.score(&input, rng)?;

        let candidate = TransactionRecord::new(
            request.amount,
            coordinates.lat,
            coordinates.long,
            timestamp_unix,
        );
        let store = self.histories.store(self.session_key(request));
        let (behavioral, previous) = {
            let mut history = store.lock();
            let previous = history
                .last_record()
                .map(|r| Coordinates::new(r.latitude, r.longitude));
            let behavioral = self.analyzer.analyze(&candidate, &history);
            history.append(candidate);
            (behavioral, previous)
        };

        debug!(
            transaction_id = %transaction_id,
            base_score = base.score,
            source = ?base.source,
            behavioral_score = behavioral.score,
            recent_count = behavioral.details.recent_count,
            distance_km = behavioral.details.distance_km,
            "Signals computed"
        );

        let verdict = self.fusion.combine(
            base.score,
            base.is_fraud,
            behavioral,
            LocationComparison {
                current: coordinates,
                previous,
            },
        );
        let response = ScoreResponse::from_verdict(transaction_id, verdict);

        info!(
            transaction_id = %transaction_id,
            risk_score = response.risk_score,
            is_fraud = response.is_fraud,
            factors = ?response.risk_factors,
            "Transaction scored"
        );

        Ok(response)
    }

    /// Score a batch in order; each transaction sees the ones before it
    pub fn score_batch(
        &self,
        requests: &[TransactionRequest],
    ) -> Vec<Result<ScoreResponse, ScoringError>> {
        requests.iter().map(|r| self.score(r)).collect()
    }

    /// Copy of the history a request would be scored against
    pub fn history_snapshot(&self, session_id: Option<&str>) -> HistoryStore {
        let key = if self.config.session_isolation {
            session_id
        } else {
            None
        };
        self.histories
            .snapshot(key)
            .unwrap_or_else(|| HistoryStore::with_capacity_limit(self.config.max_history))
    }

    fn session_key<'a>(&self, request: &'a TransactionRequest) -> Option<&'a str> {
        if self.config.session_isolation {
            request.session_id.as_deref()
        } else {
            None
        }
    }
}

impl Default for ScoringService {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_amount(amount: f64) -> Result<(), ScoringError> {
    if !amount.is_finite() {
        return Err(ScoringError::InvalidAmount(
            "Amount must be a finite number".to_string(),
        ));
    }
    if amount < 0.0 {
        return Err(ScoringError::InvalidAmount(format!(
            "Amount {} must not be negative",
            amount
        )));
    }
    Ok(())
}
