//! Custom Test Assertions
//!
//! Assertion helpers for scoring results that report the offending numbers
//! instead of a bare `assertion failed`.

use domain_fraud::{Action, ClaimOutcome, Explanation};

/// Asserts that a value is a probability
pub fn assert_probability(value: f64) {
    assert!(
        value.is_finite() && (0.0..=1.0).contains(&value),
        "Expected a probability in [0, 1], got {value}"
    );
}

/// Asserts `|baseline + sum(contributions) - risk_score| <= tolerance`
pub fn assert_explanation_consistent(explanation: &Explanation, tolerance: f64) {
    let reconstructed = explanation.reconstructed();
    let gap = (reconstructed - explanation.risk_score).abs();
    assert!(
        gap <= tolerance,
        "Explanation reconstructs {reconstructed} but the score is {}: gap {gap} exceeds {tolerance}",
        explanation.risk_score
    );
}

/// Asserts contributions are ordered by descending magnitude
pub fn assert_sorted_by_magnitude(explanation: &Explanation) {
    for pair in explanation.contributions.windows(2) {
        assert!(
            pair[0].contribution.abs() >= pair[1].contribution.abs(),
            "`{}` ({}) is ordered before larger `{}` ({})",
            pair[0].feature,
            pair[0].contribution,
            pair[1].feature,
            pair[1].contribution
        );
    }
}

/// Asserts the outcome was scored and routed to `expected`
pub fn assert_routed_to(outcome: &ClaimOutcome, expected: Action) {
    match outcome {
        ClaimOutcome::Scored(decision) => assert_eq!(
            decision.disposition.action, expected,
            "Claim {} scored {} and was routed to {:?}, expected {:?}",
            decision.score.claim_id, decision.score.risk_score, decision.disposition.action, expected
        ),
        ClaimOutcome::Rejected(failure) => panic!(
            "Claim {} was rejected at {}: {}",
            failure.claim_id, failure.stage, failure.error
        ),
    }
}
