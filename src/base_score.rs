//! Base risk score: a pretrained classifier when one is available,
//! otherwise a rule-based simulation.

use crate::geolocation::Coordinates;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Number of classifier input features
pub const FEATURE_COUNT: usize = 14;

/// Codes for unseen categorical values fall in `0..UNSEEN_LABEL_MODULUS`
pub const UNSEEN_LABEL_MODULUS: u64 = 10_000;

/// Classifier errors
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid model artifact: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Expected {expected} weights, found {found}")]
    WeightCount { expected: usize, found: usize },

    #[error("Prediction failed: {0}")]
    Prediction(String),
}

/// Classifier input, in training column order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub amount: f64,
    pub lat: f64,
    pub long: f64,
    pub city_pop: f64,
    pub merch_lat: f64,
    pub merch_long: f64,
    pub merchant: f64,
    pub category: f64,
    pub city: f64,
    pub state: f64,
    pub job: f64,
    pub trans_num: f64,
    pub age: f64,
    pub unix_time: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.amount,
            self.lat,
            self.long,
            self.city_pop,
            self.merch_lat,
            self.merch_long,
            self.merchant,
            self.category,
            self.city,
            self.state,
            self.job,
            self.trans_num,
            self.age,
            self.unix_time,
        ]
    }
}

/// Per-column label encodings exported alongside a model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LabelEncoders {
    columns: HashMap<String, HashMap<String, u32>>,
}

impl LabelEncoders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `{"column": {"label": code, ...}, ...}`
    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let columns = serde_json::from_str(json)?;
        Ok(Self { columns })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn insert(&mut self, column: &str, label: &str, code: u32) {
        self.columns
            .entry(column.to_string())
            .or_default()
            .insert(label.to_string(), code);
    }

    /// Encode a categorical value; unknown columns or labels get a stable hash code
    pub fn encode(&self, column: &str, label: &str) -> f64 {
        self.columns
            .get(column)
            .and_then(|labels| labels.get(label))
            .map(|&code| code as f64)
            .unwrap_or_else(|| unseen_label_code(label) as f64)
    }
}

/// Stable code for a label the encoders have never seen
pub fn unseen_label_code(label: &str) -> u64 {
    let digest = Sha256::digest(label.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(prefix) % UNSEEN_LABEL_MODULUS
}

/// What the scorer knows about a transaction
#[derive(Debug, Clone, Copy)]
pub struct ScoringInput<'a> {
    pub amount: f64,
    pub coordinates: Coordinates,
    pub merchant: &'a str,
    pub category: &'a str,
    pub city: &'a str,
    pub state: &'a str,
    pub location_label: &'a str,
    pub timestamp_unix: f64,
}

/// Builds classifier features, filling the demographic fields the
/// demo form does not collect with plausible synthetic values.
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    encoders: LabelEncoders,
}

impl FeatureBuilder {
    pub fn new(encoders: LabelEncoders) -> Self {
        Self { encoders }
    }

    pub fn build<R: Rng>(&self, input: &ScoringInput<'_>, rng: &mut R) -> FeatureVector {
        let job = "Engineer";
        let trans_num = format!("txn_{}", rng.gen_range(100_000..=999_999));

        FeatureVector {
            amount: input.amount,
            lat: input.coordinates.lat,
            long: input.coordinates.long,
            city_pop: rng.gen_range(10_000..=1_000_000) as f64,
            merch_lat: input.coordinates.lat + rng.gen_range(-0.1..=0.1),
            merch_long: input.coordinates.long + rng.gen_range(-0.1..=0.1),
            merchant: self.encoders.encode("merchant", input.merchant),
            category: self.encoders.encode("category", input.category),
            city: self.encoders.encode("city", input.city),
            state: self.encoders.encode("state", input.state),
            job: self.encoders.encode("job", job),
            trans_num: self.encoders.encode("trans_num", &trans_num),
            age: rng.gen_range(18.0..90.0),
            unix_time: input.timestamp_unix,
        }
    }
}

/// Raw classifier output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub is_fraud: bool,
    /// Probability of the fraud class, when the model exposes one
    pub fraud_probability: Option<f64>,
}

impl Prediction {
    /// Convert to a 0-100 score (truncating), or 95/5 from the label alone
    pub fn score(&self) -> u8 {
        match self.fraud_probability {
            Some(p) => (p.clamp(0.0, 1.0) * 100.0) as u8,
            None if self.is_fraud => 95,
            None => 5,
        }
    }
}

/// A pretrained fraud classifier
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Result<Prediction, ModelError>;

    fn name(&self) -> &str {
        "classifier"
    }
}

/// Logistic regression over the feature vector, loaded from a JSON artifact
/// of the form `{"weights": [..14..], "bias": b, "threshold": t}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    pub weights: Vec<f64>,
    pub bias: f64,
    #[serde(default = "default_decision_threshold")]
    pub threshold: f64,
}

fn default_decision_threshold() -> f64 {
    0.5
}

impl LogisticModel {
    pub fn new(weights: Vec<f64>, bias: f64) -> Result<Self, ModelError> {
        let model = Self {
            weights,
            bias,
            threshold: default_decision_threshold(),
        };
        model.check()?;
        Ok(model)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ModelError> {
        let model: Self = serde_json::from_str(json)?;
        model.check()?;
        Ok(model)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn check(&self) -> Result<(), ModelError> {
        if self.weights.len() != FEATURE_COUNT {
            return Err(ModelError::WeightCount {
                expected: FEATURE_COUNT,
                found: self.weights.len(),
            });
        }
        Ok(())
    }
}

impl Classifier for LogisticModel {
    fn predict(&self, features: &FeatureVector) -> Result<Prediction, ModelError> {
        let z: f64 = features
            .to_array()
            .iter()
            .zip(&self.weights)
            .map(|(x, w)| x * w)
            .sum::<f64>()
            + self.bias;

        if !z.is_finite() {
            return Err(ModelError::Prediction(format!("non-finite logit {}", z)));
        }

        let p = 1.0 / (1.0 + (-z).exp());
        Ok(Prediction {
            is_fraud: p >= self.threshold,
            fraud_probability: Some(p),
        })
    }

    fn name(&self) -> &str {
        "logistic"
    }
}

/// Where a base score came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreSource {
    Model,
    Simulation,
}

/// Base score handed to fusion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseScore {
    pub score: u8,
    pub is_fraud: bool,
    pub source: ScoreSource,
}

/// Rule-based stand-in for the classifier
#[derive(Debug, Clone)]
pub struct RuleBasedSimulator {
    pub large_amount: f64,
    pub large_amount_risk: u8,
    pub online_merchant_risk: u8,
    pub foreign_location_risk: u8,
    pub max_noise: u8,
}

impl Default for RuleBasedSimulator {
    fn default() -> Self {
        Self {
            large_amount: 5000.0,
            large_amount_risk: 40,
            online_merchant_risk: 15,
            foreign_location_risk: 30,
            max_noise: 20,
        }
    }
}

impl RuleBasedSimulator {
    pub fn score<R: Rng>(&self, input: &ScoringInput<'_>, rng: &mut R) -> BaseScore {
        let mut score = 0u8;

        if input.amount > self.large_amount {
            score = score.saturating_add(self.large_amount_risk);
        }
        if input.merchant.to_lowercase().contains("online") {
            score = score.saturating_add(self.online_merchant_risk);
        }
        if input.location_label.to_lowercase() == "foreign" {
            score = score.saturating_add(self.foreign_location_risk);
        }
        score = score.saturating_add(rng.gen_range(0..=self.max_noise));
        if score > 100 {
            score = 99;
        }

        BaseScore {
            score,
            is_fraud: score > 75,
            source: ScoreSource::Simulation,
        }
    }
}

/// Chooses between the classifier and the simulator
#[derive(Clone, Default)]
pub struct BaseScorer {
    classifier: Option<Arc<dyn Classifier>>,
    features: FeatureBuilder,
    simulator: RuleBasedSimulator,
}

impl BaseScorer {
    /// Simulation only
    pub fn simulated() -> Self {
        Self::default()
    }

    pub fn with_classifier(classifier: Arc<dyn Classifier>, encoders: LabelEncoders) -> Self {
        Self {
            classifier: Some(classifier),
            features: FeatureBuilder::new(encoders),
            simulator: RuleBasedSimulator::default(),
        }
    }

    pub fn with_simulator(mut self, simulator: RuleBasedSimulator) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn has_classifier(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn score<R: Rng>(
        &self,
        input: &ScoringInput<'_>,
        rng: &mut R,
    ) -> Result<BaseScore, ModelError> {
        match &self.classifier {
            Some(classifier) => {
                let features = self.features.build(input, rng);
                let prediction = classifier.predict(&features)?;
                Ok(BaseScore {
                    score: prediction.score(),
                    is_fraud: prediction.is_fraud,
                    source: ScoreSource::Model,
                })
            }
            None => Ok(self.simulator.score(input, rng)),
        }
    }
}
