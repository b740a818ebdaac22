//! Behavioral scoring walkthrough
//!
//! Replays the four classic anomaly demos against one scoring service:
//! a quiet first purchase, a burst of purchases, a spending spike and an
//! impossible location jump.

use behavioral_risk_engine::{Guardian, ScoreResponse, ScoringService, TransactionRequest};

fn request(amount: f64, location: &str, date: &str, time: &str) -> TransactionRequest {
    TransactionRequest {
        amount,
        merchant: "corner_store".to_string(),
        card_type: "grocery_pos".to_string(),
        location: location.to_string(),
        date: Some(date.to_string()),
        time: time.to_string(),
        session_id: None,
    }
}

fn print_verdict(response: &ScoreResponse) {
    println!("   Transaction ID: {}", response.transaction_id);
    println!("   Fraud: {}", response.is_fraud);
    println!(
        "   Risk Score: {}/100 ({:?})",
        response.risk_score,
        response.risk_level()
    );
    println!(
        "   Base: {}  Behavioral: {}",
        response.ml_score, response.behavioral_score
    );
    println!("   Factors: {:?}", response.risk_factors);
    println!(
        "   Velocity: {}  Avg Spending: {:.2}  Distance: {:.2} km",
        response.details.recent_count, response.details.average_amount, response.details.distance_km
    );
    println!();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Behavioral Risk Engine ===\n");

    let service = ScoringService::new();
    let guardian = Guardian::new();

    println!("1. First Purchase (no history)");
    let first = service.score(&request(120.0, "Kolkata", "2026-02-01", "09:00"))?;
    print_verdict(&first);

    println!("2. Rapid Burst (six purchases within five minutes)");
    let mut last = first;
    for minute in ["10:00", "10:01", "10:02", "10:03", "10:04", "10:04"] {
        last = service.score(&request(110.0, "Kolkata", "2026-02-01", minute))?;
    }
    print_verdict(&last);

    println!("3. Spending Spike (ten times the usual amount)");
    let spike = service.score(&request(1_200.0, "Kolkata", "2026-02-01", "18:00"))?;
    print_verdict(&spike);

    println!("4. Impossible Location Jump (Kolkata to New York in a minute)");
    let jump = service.score(&request(90.0, "New York", "2026-02-01", "18:01"))?;
    print_verdict(&jump);

    if let Some(explanation) = guardian.explain_verdict(&jump) {
        println!("Guardian says:\n   {}", explanation);
    }

    println!("\nJSON verdict:\n{}", serde_json::to_string_pretty(&jump)?);
    Ok(())
}
