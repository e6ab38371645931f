//! Decision routing
//!
//! Maps a calibrated score onto a disposition band and priority, then emits a
//! routing event to case management.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use core_kernel::{ClaimId, EventId};
use crate::error::FraudError;
use crate::events::{CaseManagementSink, RoutingEvent};
use crate::explainer::Explanation;
use crate::scorer::ScoreResult;

/// Score thresholds separating the disposition bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolicyThresholds {
    /// Lowest score routed to manual review
    pub review: f64,
    /// Lowest score routed to investigation
    pub investigate: f64,
}

impl PolicyThresholds {
    pub fn new(review: f64, investigate: f64) -> Result<Self, FraudError> {
        let thresholds = Self { review, investigate };
        thresholds.validate()?;
        Ok(thresholds)
    }

    pub fn validate(&self) -> Result<(), FraudError> {
        for (name, value) in [("review", self.review), ("investigate", self.investigate)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(FraudError::configuration(format!(
                    "{name} threshold must be within [0, 1], got {value}"
                )));
            }
        }
        if self.review >= self.investigate {
            return Err(FraudError::configuration(format!(
                "review threshold {} must be below investigate threshold {}",
                self.review, self.investigate
            )));
        }
        Ok(())
    }
}

/// Disposition band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    FastTrack,
    Review,
    Investigate,
}

/// Queue priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// Final outcome for a scored claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disposition {
    pub claim_id: ClaimId,
    pub action: Action,
    pub priority: Priority,
    pub score_result: ScoreResult,
}

/// Routes scored claims and notifies case management
#[derive(Clone)]
pub struct DecisionRouter {
    sink: Arc<dyn CaseManagementSink>,
    top_n: usize,
}

impl DecisionRouter {
    pub fn new(sink: Arc<dyn CaseManagementSink>, top_n: usize) -> Self {
        Self { sink, top_n }
    }

    /// Band and priority for a score; a score on a threshold takes the higher band
    pub fn classify(risk_score: f64, thresholds: &PolicyThresholds) -> (Action, Priority) {
        let PolicyThresholds { review, investigate } = *thresholds;
        if risk_score >= investigate {
            let midpoint = investigate + (1.0 - investigate) / 2.0;
            let priority = if risk_score >= midpoint { Priority::Critical } else { Priority::High };
            (Action::Investigate, priority)
        } else if risk_score >= review {
            let midpoint = review + (investigate - review) / 2.0;
            let priority = if risk_score >= midpoint { Priority::High } else { Priority::Medium };
            (Action::Review, priority)
        } else {
            (Action::FastTrack, Priority::Low)
        }
    }

    /// Routes a score and emits the routing event
    ///
    /// # Errors
    ///
    /// `FraudError::Configuration` when the thresholds are invalid.
    pub fn route(
        &self,
        score: &ScoreResult,
        explanation: &Explanation,
        thresholds: &PolicyThresholds,
    ) -> Result<Disposition, FraudError> {
        thresholds.validate()?;
        let (action, priority) = Self::classify(score.risk_score, thresholds);

        let event = RoutingEvent {
            event_id: EventId::new_v7(),
            claim_id: score.claim_id,
            action,
            priority,
            risk_score: score.risk_score,
            model_version: score.model_version.clone(),
            top_features: explanation.top(self.top_n).to_vec(),
            emitted_at: Utc::now(),
        };
        self.sink.publish_routing(&event);
        debug!(claim_id = %score.claim_id, ?action, ?priority, "Routing event emitted");

        Ok(Disposition {
            claim_id: score.claim_id,
            action,
            priority,
            score_result: score.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::InMemorySink;
    use crate::explainer::{Attribution, ExplanationMethod};
    use crate::model::ModelVersionId;

    fn thresholds() -> PolicyThresholds {
        PolicyThresholds::new(0.3, 0.7).unwrap()
    }

    fn scored(risk_score: f64) -> (ScoreResult, Explanation) {
        let score = ScoreResult {
            claim_id: ClaimId::new(),
            risk_score,
            model_version: ModelVersionId::new("unit-v1"),
            computed_at: Utc::now(),
        };
        let explanation = Explanation {
            claim_id: score.claim_id,
            model_version: score.model_version.clone(),
            method: ExplanationMethod::Local,
            baseline_score: 0.1,
            risk_score,
            contributions: vec![
                Attribution {
                    feature: "claim_to_premium_ratio".to_string(),
                    contribution: risk_score - 0.1,
                },
                Attribution {
                    feature: "claimant_age".to_string(),
                    contribution: 0.0,
                },
            ],
        };
        (score, explanation)
    }

    #[test]
    fn test_bands() {
        let t = thresholds();
        assert_eq!(DecisionRouter::classify(0.1, &t), (Action::FastTrack, Priority::Low));
        assert_eq!(DecisionRouter::classify(0.4, &t), (Action::Review, Priority::Medium));
        assert_eq!(DecisionRouter::classify(0.6, &t), (Action::Review, Priority::High));
        assert_eq!(DecisionRouter::classify(0.75, &t), (Action::Investigate, Priority::High));
        assert_eq!(DecisionRouter::classify(0.9, &t), (Action::Investigate, Priority::Critical));
    }

    #[test]
    fn test_threshold_boundaries_take_higher_band() {
        let t = thresholds();
        assert_eq!(DecisionRouter::classify(0.3, &t).0, Action::Review);
        assert_eq!(DecisionRouter::classify(0.7, &t).0, Action::Investigate);
    }

    #[test]
    fn test_route_emits_event_with_top_features() {
        let sink = Arc::new(InMemorySink::new());
        let router = DecisionRouter::new(sink.clone(), 1);
        let (score, explanation) = scored(0.85);

        let disposition = router.route(&score, &explanation, &thresholds()).unwrap();
        assert_eq!(disposition.action, Action::Investigate);

        let events = sink.routing_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].claim_id, score.claim_id);
        assert_eq!(events[0].top_features.len(), 1);
        assert_eq!(events[0].top_features[0].feature, "claim_to_premium_ratio");
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        assert!(PolicyThresholds::new(0.7, 0.3).is_err());
        assert!(PolicyThresholds::new(0.5, 0.5).is_err());
        assert!(PolicyThresholds::new(-0.1, 0.5).is_err());
        assert!(PolicyThresholds::new(0.2, f64::NAN).is_err());

        let sink = Arc::new(InMemorySink::new());
        let router = DecisionRouter::new(sink.clone(), 3);
        let (score, explanation) = scored(0.5);
        let bad = PolicyThresholds {
            review: 0.8,
            investigate: 0.2,
        };
        assert!(matches!(
            router.route(&score, &explanation, &bad),
            Err(FraudError::Configuration(_))
        ));
        assert!(sink.routing_events().is_empty());
    }
}
