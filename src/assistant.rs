//! Canned, persona-flavored replies from the vault guardian "Yaksha"

use crate::ScoreResponse;
use serde::{Deserialize, Serialize};

/// Reply used when the chat layer itself fails
pub const SYSTEM_ERROR_REPLY: &str = "My vision is clouded (System Error). Please try again.";

const EXPLAIN_TRIGGERS: [&str; 4] = ["explain", "why", "what happened", "details"];
const GREETINGS: [&str; 4] = ["hello", "hi", "hey", "greetings"];
const PREVENTION_TOPICS: [&str; 4] = ["solution", "prevent", "protect", "safe"];

/// The verdict a question refers to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatContext {
    pub risk_score: u8,
    pub risk_factors: Vec<String>,
}

impl ChatContext {
    pub fn from_response(response: &ScoreResponse) -> Self {
        Self {
            risk_score: response.risk_score,
            risk_factors: response
                .risk_factors
                .iter()
                .map(|f| f.label().to_string())
                .collect(),
        }
    }
}

/// Keyword-driven guardian persona
#[derive(Debug, Clone, Copy, Default)]
pub struct Guardian;

impl Guardian {
    pub fn new() -> Self {
        Self
    }

    /// Answer a chat message, optionally about a scored transaction
    pub fn reply(&self, message: &str, context: Option<&ChatContext>) -> String {
        let msg = message.to_lowercase();

        if let Some(ctx) = context {
            if !ctx.risk_factors.is_empty() && contains_any(&msg, &EXPLAIN_TRIGGERS) {
                return self.explain(ctx);
            }
        }

        if contains_any(&msg, &GREETINGS) {
            return "Greetings, traveler. The Vault is secure. How may I assist you in protecting your wealth?".to_string();
        }

        if msg.contains("who are you") || msg.contains("what are you") {
            return "I am Yaksha, the Ancient Guardian of Digital Wealth. My vigil is eternal, my vision absolute.".to_string();
        }

        if contains_any(&msg, &PREVENTION_TOPICS) {
            return [
                "To protect your treasure: ",
                "1. Enable 2-Factor Authentication (The Double Lock).",
                "2. Set transaction limits (The Gatekeeper).",
                "3. Monitor your alerts (The Watchtower).",
                "4. Never share your OTP (The Key) with anyone.",
            ]
            .join("\n");
        }

        if msg.contains("credit card") || msg.contains("card") {
            if msg.contains("lost") || msg.contains("stolen") {
                return "If your key (card) is lost, you must seal the gates instantly. Contact your bank to freeze the card. Do not hesitate.".to_string();
            }
            if msg.contains("cvv") {
                return "The CVV is the secret rune on the back of your card. Never share it. If compromised, the lock is broken.".to_string();
            }
            return "The credit card is a powerful tool, but dangerous if unguarded. Keep it close, check your statements for shadows, and never lend it to strangers.".to_string();
        }

        "I hear you, but the path is unclear. Ask me about 'fraud prevention', 'credit card security', or show me a transaction to analyze.".to_string()
    }

    /// Narrate the anomalies behind a verdict
    pub fn explain(&self, context: &ChatContext) -> String {
        let mut response = format!(
            "I have analyzed the transaction. The threat level is {}%. ",
            context.risk_score
        );

        for factor in &context.risk_factors {
            if factor.contains("Impossible Location") {
                response.push_str(" I detected the 'Superman Effect'. The card was used in two distant locations nearly simultaneously. This is physical impossibility and a sign of cloning. ");
            } else if factor.contains("Frequency") {
                response.push_str(" The 'Swift Hand' anomaly was present. Too many transactions occurred in a short span, suggesting a bot or a thief testing the card. ");
            } else if factor.contains("Spike") || factor.contains("Amount") {
                response.push_str(" The 'Heavy Coffer' alert. A withdrawal or purchase was made that vastly exceeds typical patterns. ");
            }
        }

        response.push_str(" I recommend freezing the card immediately.");
        response
    }

    /// Explanation for a scored transaction, `None` when nothing was flagged
    pub fn explain_verdict(&self, response: &ScoreResponse) -> Option<String> {
        if response.risk_factors.is_empty() {
            return None;
        }
        Some(self.explain(&ChatContext::from_response(response)))
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|n| haystack.contains(n))
}
