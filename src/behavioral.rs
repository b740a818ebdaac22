//! Behavioral anomaly checks over the rolling transaction history

use crate::history::{HistoryStore, TransactionRecord};
use serde::{Deserialize, Serialize};
use std::fmt;

const HIGH_FREQUENCY_RISK: u8 = 80;
const MODERATE_FREQUENCY_RISK: u8 = 40;
const EXTREME_SPIKE_RISK: u8 = 90;
const UNUSUAL_AMOUNT_RISK: u8 = 50;
const IMPOSSIBLE_JUMP_RISK: u8 = 100;
const FAST_TRAVEL_RISK: u8 = 30;

/// Behavioral detection thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehavioralThresholds {
    /// Trailing window for the velocity count
    pub velocity_window_seconds: f64,
    /// Recent transactions that count as high frequency
    pub high_frequency_count: usize,
    /// Recent transactions that count as moderate frequency
    pub moderate_frequency_count: usize,
    /// Amount / (average + 1) above which spending is an extreme spike
    pub extreme_spike_ratio: f64,
    /// Amount / (average + 1) above which spending is unusual
    pub unusual_amount_ratio: f64,
    /// Implied travel speed above which a location jump is impossible
    pub impossible_speed_kmh: f64,
    /// Implied travel speed above which travel is suspiciously fast
    pub fast_travel_speed_kmh: f64,
    /// Lower bound on the time gap used for the speed estimate
    pub min_time_gap_seconds: f64,
    /// Planar approximation of one degree of arc
    pub km_per_degree: f64,
}

impl Default for BehavioralThresholds {
    fn default() -> Self {
        Self {
            velocity_window_seconds: 300.0,
            high_frequency_count: 5,
            moderate_frequency_count: 3,
            extreme_spike_ratio: 5.0,
            unusual_amount_ratio: 3.0,
            impossible_speed_kmh: 900.0,
            fast_travel_speed_kmh: 200.0,
            min_time_gap_seconds: 60.0,
            km_per_degree: 111.0,
        }
    }
}

/// Anomaly tags, in detection order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BehavioralFactor {
    #[serde(rename = "High Transaction Frequency")]
    HighFrequency,
    #[serde(rename = "Moderate Transaction Frequency")]
    ModerateFrequency,
    #[serde(rename = "Extreme Spending Spike")]
    ExtremeSpendingSpike,
    #[serde(rename = "Unusual Spending Amount")]
    UnusualSpendingAmount,
    #[serde(rename = "Impossible Location Jump")]
    ImpossibleLocationJump,
}

impl BehavioralFactor {
    pub fn label(&self) -> &'static str {
        match self {
            BehavioralFactor::HighFrequency => "High Transaction Frequency",
            BehavioralFactor::ModerateFrequency => "Moderate Transaction Frequency",
            BehavioralFactor::ExtremeSpendingSpike => "Extreme Spending Spike",
            BehavioralFactor::UnusualSpendingAmount => "Unusual Spending Amount",
            BehavioralFactor::ImpossibleLocationJump => "Impossible Location Jump",
        }
    }
}

impl fmt::Display for BehavioralFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Measurements behind a behavioral score
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BehavioralDetails {
    #[serde(rename = "velocity")]
    pub recent_count: usize,
    #[serde(rename = "avg_spending")]
    pub average_amount: f64,
    #[serde(rename = "dist_km")]
    pub distance_km: f64,
}

/// Behavioral risk for one candidate transaction
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BehavioralResult {
    pub score: u8,
    pub factors: Vec<BehavioralFactor>,
    pub details: BehavioralDetails,
}

impl BehavioralResult {
    pub fn has_factor(&self, factor: BehavioralFactor) -> bool {
        self.factors.contains(&factor)
    }
}

/// Outcome of one signal
#[derive(Debug, Clone, Copy, PartialEq)]
struct Signal {
    risk: u8,
    factor: Option<BehavioralFactor>,
}

impl Signal {
    fn none() -> Self {
        Self {
            risk: 0,
            factor: None,
        }
    }

    fn flagged(risk: u8, factor: BehavioralFactor) -> Self {
        Self {
            risk,
            factor: Some(factor),
        }
    }
}

/// Scores a candidate transaction against recent history.
///
/// Analysis never mutates the history; the caller commits the candidate
/// afterwards. Three independent signals are evaluated (velocity, amount
/// deviation, location jump) and the strongest one wins.
#[derive(Debug, Clone, Default)]
pub struct BehavioralAnalyzer {
    thresholds: BehavioralThresholds,
}

impl BehavioralAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: BehavioralThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &BehavioralThresholds {
        &self.thresholds
    }

    /// Analyze `candidate` against `history`
    pub fn analyze(&self, candidate: &TransactionRecord, history: &HistoryStore) -> BehavioralResult {
        // No baseline to compare against
        let Some(last) = history.last_record() else {
            return BehavioralResult::default();
        };

        let recent_count = self.recent_count(candidate.timestamp_unix, history);
        let average_amount = history.average_amount();
        let distance_km = self.distance_km(candidate, last);

        let signals = [
            self.check_velocity(recent_count),
            self.check_amount_deviation(candidate.amount, average_amount),
            self.check_location_jump(candidate, last, distance_km),
        ];

        let score = signals.iter().map(|s| s.risk).max().unwrap_or(0);
        let factors = signals.iter().filter_map(|s| s.factor).collect();

        BehavioralResult {
            score,
            factors,
            details: BehavioralDetails {
                recent_count,
                average_amount: round2(average_amount),
                distance_km: round2(distance_km),
            },
        }
    }

    /// Number of history records inside the velocity window
    pub fn recent_count(&self, timestamp_unix: f64, history: &HistoryStore) -> usize {
        history
            .records_within(self.thresholds.velocity_window_seconds, timestamp_unix)
            .len()
    }

    /// Planar distance between two records
    pub fn distance_km(&self, a: &TransactionRecord, b: &TransactionRecord) -> f64 {
        let d_lat = a.latitude - b.latitude;
        let d_long = a.longitude - b.longitude;
        (d_lat.powi(2) + d_long.powi(2)).sqrt() * self.thresholds.km_per_degree
    }

    fn check_velocity(&self, recent_count: usize) -> Signal {
        if recent_count >= self.thresholds.high_frequency_count {
            Signal::flagged(HIGH_FREQUENCY_RISK, BehavioralFactor::HighFrequency)
        } else if recent_count >= self.thresholds.moderate_frequency_count {
            Signal::flagged(MODERATE_FREQUENCY_RISK, BehavioralFactor::ModerateFrequency)
        } else {
            Signal::none()
        }
    }

    fn check_amount_deviation(&self, amount: f64, average_amount: f64) -> Signal {
        // +1 keeps the ratio finite for a zero average
        let ratio = amount / (average_amount + 1.0);

        if ratio > self.thresholds.extreme_spike_ratio {
            Signal::flagged(EXTREME_SPIKE_RISK, BehavioralFactor::ExtremeSpendingSpike)
        } else if ratio > self.thresholds.unusual_amount_ratio {
            Signal::flagged(UNUSUAL_AMOUNT_RISK, BehavioralFactor::UnusualSpendingAmount)
        } else {
            Signal::none()
        }
    }

    fn check_location_jump(
        &self,
        candidate: &TransactionRecord,
        last: &TransactionRecord,
        distance_km: f64,
    ) -> Signal {
        let time_gap = (candidate.timestamp_unix - last.timestamp_unix)
            .abs()
            .max(self.thresholds.min_time_gap_seconds);
        let speed_kmh = distance_km / time_gap * 3600.0;

        if speed_kmh > self.thresholds.impossible_speed_kmh {
            Signal::flagged(IMPOSSIBLE_JUMP_RISK, BehavioralFactor::ImpossibleLocationJump)
        } else if speed_kmh > self.thresholds.fast_travel_speed_kmh {
            Signal {
                risk: FAST_TRAVEL_RISK,
                factor: None,
            }
        } else {
            Signal::none()
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: f64 = 1_769_860_800.0;
    const KOLKATA: (f64, f64) = (22.5726, 88.3639);
    const NEW_YORK: (f64, f64) = (40.7128, -74.0060);

    fn kolkata(amount: f64, ts: f64) -> TransactionRecord {
        TransactionRecord::new(amount, KOLKATA.0, KOLKATA.1, ts)
    }

    fn history_of(records: &[TransactionRecord]) -> HistoryStore {
        let mut store = HistoryStore::new();
        for r in records {
            store.append(*r);
        }
        store
    }

    #[test]
    fn test_empty_history_is_zero_risk() {
        let analyzer = BehavioralAnalyzer::new();
        let result = analyzer.analyze(&kolkata(100.0, NOW), &HistoryStore::new());

        assert_eq!(result.score, 0);
        assert!(result.factors.is_empty());
        assert_eq!(result.details, BehavioralDetails::default());
    }

    #[test]
    fn test_empty_history_ignores_huge_amount() {
        let analyzer = BehavioralAnalyzer::new();
        let result = analyzer.analyze(&kolkata(1_000_000.0, NOW), &HistoryStore::new());
        assert_eq!(result.score, 0);
    }

    #[test]
    fn test_high_frequency() {
        let analyzer = BehavioralAnalyzer::new();
        let records: Vec<_> = (0..5)
            .map(|i| kolkata(100.0, NOW - 250.0 + i as f64 * 50.0))
            .collect();
        let history = history_of(&records);

        let result = analyzer.analyze(&kolkata(100.0, NOW), &history);
        assert_eq!(result.details.recent_count, 5);
        assert_eq!(result.score, 80);
        assert_eq!(result.factors, vec![BehavioralFactor::HighFrequency]);
    }

    #[test]
    fn test_moderate_frequency() {
        let analyzer = BehavioralAnalyzer::new();
        let records = [
            kolkata(100.0, NOW - 10_000.0),
            kolkata(100.0, NOW - 200.0),
            kolkata(100.0, NOW - 100.0),
            kolkata(100.0, NOW - 90.0),
        ];
        let result = analyzer.analyze(&kolkata(100.0, NOW), &history_of(&records));

        assert_eq!(result.details.recent_count, 3);
        assert_eq!(result.score, 40);
        assert!(result.has_factor(BehavioralFactor::ModerateFrequency));
    }

    #[test]
    fn test_two_recent_is_not_frequent() {
        let analyzer = BehavioralAnalyzer::new();
        let records = [kolkata(100.0, NOW - 120.0), kolkata(100.0, NOW - 60.0)];
        let result = analyzer.analyze(&kolkata(100.0, NOW), &history_of(&records));
        assert_eq!(result.score, 0);
        assert!(result.factors.is_empty());
    }

    #[test]
    fn test_recent_count_monotone_in_window() {
        let records: Vec<_> = (0..10)
            .map(|i| kolkata(10.0, NOW - (i as f64) * 97.0))
            .collect();
        let history = history_of(&records);

        let mut previous = 0;
        for window in [0.0, 1.0, 60.0, 97.0, 150.0, 300.0, 500.0, 1_000.0, 10_000.0] {
            let analyzer = BehavioralAnalyzer::with_thresholds(BehavioralThresholds {
                velocity_window_seconds: window,
                ..Default::default()
            });
            let count = analyzer.recent_count(NOW, &history);
            assert!(count >= previous, "window {window} shrank the count");
            previous = count;
        }
        assert_eq!(previous, 10);
    }

    #[test]
    fn test_extreme_spending_spike() {
        let analyzer = BehavioralAnalyzer::new();
        let history = history_of(&[kolkata(100.0, NOW - 86_400.0)]);

        let result = analyzer.analyze(&kolkata(600.0, NOW), &history);
        assert_eq!(result.score, 90);
        assert_eq!(result.factors, vec![BehavioralFactor::ExtremeSpendingSpike]);
        assert_eq!(result.details.average_amount, 100.0);
    }

    #[test]
    fn test_unusual_spending_amount() {
        let analyzer = BehavioralAnalyzer::new();
        let history = history_of(&[kolkata(100.0, NOW - 86_400.0)]);

        // 400 / 101 ~ 3.96
        let result = analyzer.analyze(&kolkata(400.0, NOW), &history);
        assert_eq!(result.score, 50);
        assert_eq!(result.factors, vec![BehavioralFactor::UnusualSpendingAmount]);
    }

    #[test]
    fn test_ratio_of_exactly_five_is_unusual_not_extreme() {
        let analyzer = BehavioralAnalyzer::new();
        let history = history_of(&[kolkata(99.0, NOW - 86_400.0)]);

        let result = analyzer.analyze(&kolkata(500.0, NOW), &history);
        assert_eq!(result.factors, vec![BehavioralFactor::UnusualSpendingAmount]);
    }

    #[test]
    fn test_zero_average_does_not_divide_by_zero() {
        let analyzer = BehavioralAnalyzer::new();
        let history = history_of(&[kolkata(0.0, NOW - 86_400.0)]);

        let result = analyzer.analyze(&kolkata(2.0, NOW), &history);
        assert_eq!(result.score, 0);
        let result = analyzer.analyze(&kolkata(6.0, NOW), &history);
        assert_eq!(result.score, 90);
    }

    #[test]
    fn test_impossible_location_jump() {
        let analyzer = BehavioralAnalyzer::new();
        let history = history_of(&[kolkata(100.0, NOW)]);
        let candidate = TransactionRecord::new(100.0, NEW_YORK.0, NEW_YORK.1, NOW + 60.0);

        let result = analyzer.analyze(&candidate, &history);
        assert!(result.details.distance_km > 12_900.0);
        assert_eq!(result.score, 100);
        assert_eq!(result.factors, vec![BehavioralFactor::ImpossibleLocationJump]);
    }

    #[test]
    fn test_simultaneous_transactions_use_minimum_gap() {
        let analyzer = BehavioralAnalyzer::new();
        let history = history_of(&[kolkata(100.0, NOW - 86_400.0), kolkata(100.0, NOW)]);
        // 0.05 deg * 111 = 5.55 km in a floored 60s gap = 333 km/h
        let candidate = TransactionRecord::new(100.0, KOLKATA.0 + 0.05, KOLKATA.1, NOW);

        let result = analyzer.analyze(&candidate, &history);
        assert!(result.details.distance_km.is_finite());
        assert_eq!(result.score, 30);
        assert!(result.factors.is_empty());
    }

    #[test]
    fn test_slow_travel_is_not_risky() {
        let analyzer = BehavioralAnalyzer::new();
        let history = history_of(&[kolkata(100.0, NOW - 7_200.0)]);
        // ~111 km in two hours
        let candidate = TransactionRecord::new(100.0, KOLKATA.0 + 1.0, KOLKATA.1, NOW);

        let result = analyzer.analyze(&candidate, &history);
        assert_eq!(result.score, 0);
        assert_eq!(result.details.distance_km, 111.0);
    }

    #[test]
    fn test_only_last_record_is_used_for_location() {
        let analyzer = BehavioralAnalyzer::new();
        let history = history_of(&[
            TransactionRecord::new(100.0, NEW_YORK.0, NEW_YORK.1, NOW - 120.0),
            kolkata(100.0, NOW - 86_400.0),
        ]);
        let result = analyzer.analyze(&kolkata(100.0, NOW), &history);
        assert!(!result.has_factor(BehavioralFactor::ImpossibleLocationJump));
        assert_eq!(result.details.distance_km, 0.0);
    }

    #[test]
    fn test_score_is_max_not_sum() {
        let analyzer = BehavioralAnalyzer::new();
        let records: Vec<_> = (0..5).map(|i| kolkata(100.0, NOW - 100.0 + i as f64)).collect();
        let history = history_of(&records);
        let candidate = TransactionRecord::new(1_000.0, NEW_YORK.0, NEW_YORK.1, NOW);

        let result = analyzer.analyze(&candidate, &history);
        assert_eq!(result.score, 100);
        assert_eq!(
            result.factors,
            vec![
                BehavioralFactor::HighFrequency,
                BehavioralFactor::ExtremeSpendingSpike,
                BehavioralFactor::ImpossibleLocationJump,
            ]
        );
    }

    #[test]
    fn test_analyze_does_not_mutate_history() {
        let analyzer = BehavioralAnalyzer::new();
        let history = history_of(&[kolkata(100.0, NOW - 30.0)]);
        let before = history.len();
        analyzer.analyze(&kolkata(900.0, NOW), &history);
        assert_eq!(history.len(), before);
    }

    #[test]
    fn test_details_are_rounded() {
        let analyzer = BehavioralAnalyzer::new();
        let history = history_of(&[
            kolkata(10.0, NOW - 86_400.0),
            kolkata(10.005, NOW - 86_000.0),
            kolkata(10.0, NOW - 80_000.0),
        ]);
        let result = analyzer.analyze(&kolkata(10.0, NOW), &history);
        assert_eq!(result.details.average_amount, 10.0);
    }

    #[test]
    fn test_factor_serializes_as_label() {
        let json = serde_json::to_string(&BehavioralFactor::ImpossibleLocationJump).unwrap();
        assert_eq!(json, "\"Impossible Location Jump\"");
        assert_eq!(
            BehavioralFactor::HighFrequency.to_string(),
            "High Transaction Frequency"
        );
    }

    #[test]
    fn test_details_wire_names() {
        let details = BehavioralDetails {
            recent_count: 2,
            average_amount: 12.5,
            distance_km: 3.25,
        };
        let value = serde_json::to_value(details).unwrap();
        assert_eq!(value["velocity"], 2);
        assert_eq!(value["avg_spending"], 12.5);
        assert_eq!(value["dist_km"], 3.25);
    }
}
