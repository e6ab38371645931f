//! Scoring pipeline tests against the reference model

use std::sync::Arc;

use domain_fraud::{
    Action, ClaimOutcome, Explainer, ExplanationMethod, FeatureBuilder, ModelSelector, Priority,
    ScoringRequest, ScoringService, Stage,
};
use proptest::prelude::*;
use test_utils::*;

mod scenarios {
    use super::*;

    #[test]
    fn test_large_early_claim_with_beneficiary_change_is_investigated() {
        let harness = ScoringHarness::reference();
        let decision = harness
            .service
            .score_claim(&ScenarioClaims::suspicious_large_claim(), &ModelSelector::Active)
            .expect("scenario claim scores");

        assert!(
            decision.score.risk_score >= 0.7,
            "expected investigation-level risk, got {}",
            decision.score.risk_score
        );
        assert_eq!(decision.disposition.action, Action::Investigate);
        assert!(decision.disposition.priority >= Priority::High);
        assert_eq!(decision.score.model_version.as_str(), REFERENCE_VERSION);

        let top: Vec<&str> = decision.explanation.top(5).iter().map(|a| a.feature.as_str()).collect();
        assert!(
            ["claim_to_premium_ratio", "log_claim_amount", "recent_beneficiary_change"]
                .iter()
                .any(|name| top.contains(name)),
            "expected claim size or beneficiary change among top drivers, got {top:?}"
        );
    }

    #[test]
    fn test_routine_claim_is_fast_tracked() {
        let harness = ScoringHarness::reference();
        let decision = harness
            .service
            .score_claim(&ScenarioClaims::routine_claim(), &ModelSelector::Active)
            .unwrap();

        assert!(decision.score.risk_score < 0.3);
        assert_eq!(decision.disposition.action, Action::FastTrack);
        assert_probability(decision.score.risk_score);
    }

    #[test]
    fn test_routing_event_emitted_per_disposition() {
        let harness = ScoringHarness::reference();
        let claims = vec![
            ScenarioClaims::routine_claim(),
            ScenarioClaims::suspicious_large_claim(),
            ScenarioClaims::claim_missing_amount(),
        ];
        harness
            .service
            .score_request(&ScoringRequest {
                claims,
                model: ModelSelector::Active,
            })
            .unwrap();

        let events = harness.sink.routing_events();
        assert_eq!(events.len(), 2);
        assert!(events.iter().any(|e| e.action == Action::Investigate));
        assert!(events.iter().all(|e| e.model_version.as_str() == REFERENCE_VERSION));
    }

    #[test]
    fn test_missing_amount_rejects_only_that_claim() {
        let harness = ScoringHarness::reference();
        let response = harness
            .service
            .score_request(&ScoringRequest {
                claims: vec![ScenarioClaims::claim_missing_amount(), ScenarioClaims::routine_claim()],
                model: ModelSelector::Active,
            })
            .unwrap();

        match &response.outcomes[0] {
            ClaimOutcome::Rejected(failure) => {
                assert_eq!(failure.stage, Stage::FeatureBuild);
                assert!(!failure.retryable);
                assert!(failure.error.contains("claim_amount"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_routed_to(&response.outcomes[1], Action::FastTrack);
    }

    #[test]
    fn test_missing_premium_is_imputed() {
        let harness = ScoringHarness::reference();
        let claim = TestClaimBuilder::new().without_premium().build();
        let decision = harness.service.score_claim(&claim, &ModelSelector::Active).unwrap();
        assert!(decision.imputed.iter().any(|name| name == "claim_to_premium_ratio"));
    }
}

mod determinism {
    use super::*;

    #[test]
    fn test_scoring_twice_is_bit_identical() {
        let harness = ScoringHarness::reference();
        let claim = ScenarioClaims::suspicious_large_claim();

        let first = harness.service.score_claim(&claim, &ModelSelector::Active).unwrap();
        let second = harness.service.score_claim(&claim, &ModelSelector::Active).unwrap();

        assert_eq!(first.score.risk_score.to_bits(), second.score.risk_score.to_bits());
        assert_eq!(first.explanation.contributions, second.explanation.contributions);
    }

    #[test]
    fn test_request_order_does_not_change_results() {
        let harness = ScoringHarness::reference();
        let a = ScenarioClaims::suspicious_large_claim();
        let b = TestClaimBuilder::new().with_amount(40_000).with_previous_claims(2).build();

        let forward = harness
            .service
            .score_request(&ScoringRequest {
                claims: vec![a.clone(), b.clone()],
                model: ModelSelector::Active,
            })
            .unwrap();
        let reversed = harness
            .service
            .score_request(&ScoringRequest {
                claims: vec![b, a],
                model: ModelSelector::Active,
            })
            .unwrap();

        for (i, j) in [(0, 1), (1, 0)] {
            let x = forward.outcomes[i].decision().unwrap();
            let y = reversed.outcomes[j].decision().unwrap();
            assert_eq!(x.score.claim_id, y.score.claim_id);
            assert_eq!(x.score.risk_score.to_bits(), y.score.risk_score.to_bits());
            assert_eq!(x.disposition.action, y.disposition.action);
            assert_eq!(x.explanation.contributions, y.explanation.contributions);
        }
    }

    #[test]
    fn test_parallel_batch_matches_sequential() {
        let claims: Vec<_> = synthetic_claims(40, 3).into_iter().map(|c| c.claim).collect();

        let parallel = ScoringHarness::reference();
        let mut sequential_config = reference_config();
        sequential_config.batch.parallel_threshold = 1_000;
        let sequential = ScoringHarness::with_models(sequential_config, vec![reference_model()]);

        let request = ScoringRequest {
            claims: claims.clone(),
            model: ModelSelector::Active,
        };
        let p = parallel.service.score_request(&request).unwrap();
        let s = sequential.service.score_request(&request).unwrap();

        assert_eq!(p.outcomes.len(), claims.len());
        assert_eq!(p.summary, s.summary);
        for ((claim, x), y) in claims.iter().zip(&p.outcomes).zip(&s.outcomes) {
            assert_eq!(x.claim_id(), claim.claim_id);
            assert_eq!(
                x.decision().map(|d| d.score.risk_score.to_bits()),
                y.decision().map(|d| d.score.risk_score.to_bits())
            );
        }
    }
}

mod explanations {
    use super::*;

    #[test]
    fn test_explanations_reconstruct_the_score() {
        let harness = ScoringHarness::reference();
        let tolerance = reference_config().explanation.tolerance;
        for labeled in synthetic_claims(25, 8) {
            let decision = harness.service.score_claim(&labeled.claim, &ModelSelector::Active).unwrap();
            assert_eq!(decision.explanation.method, ExplanationMethod::Local);
            assert_explanation_consistent(&decision.explanation, tolerance);
            assert_sorted_by_magnitude(&decision.explanation);
        }
    }

    #[test]
    fn test_unreconstructable_score_falls_back_to_global_importance() {
        let model = reference_model();
        let claim = ScenarioClaims::suspicious_large_claim();
        let vector = FeatureBuilder::new(&model.feature_schema).build(&claim).unwrap();
        let mut score = domain_fraud::AnomalyScorer::new().score(&vector, &model).unwrap();
        // A score the model did not produce cannot be reconstructed locally
        score.risk_score = (score.risk_score - 0.25).max(0.0);

        let explainer = Explainer::new(reference_config().explanation);
        assert!(explainer.explain_local(&model, &vector, &score).is_err());

        let explanation = explainer.explain(&model, &vector, &score).unwrap();
        assert_eq!(explanation.method, ExplanationMethod::GlobalFallback);
        assert_explanation_consistent(&explanation, 1e-9);
        assert_sorted_by_magnitude(&explanation);
    }
}

mod concurrency {
    use super::*;

    #[test]
    fn test_service_is_shareable_across_threads() {
        let harness = ScoringHarness::reference();
        let service: Arc<ScoringService> = Arc::clone(&harness.service);
        let claim = ScenarioClaims::suspicious_large_claim();
        let expected = service.score_claim(&claim, &ModelSelector::Active).unwrap().score.risk_score;

        std::thread::scope(|scope| {
            for _ in 0..4 {
                let service = Arc::clone(&service);
                let claim = claim.clone();
                scope.spawn(move || {
                    for _ in 0..10 {
                        let decision = service.score_claim(&claim, &ModelSelector::Active).unwrap();
                        assert_eq!(decision.score.risk_score.to_bits(), expected.to_bits());
                    }
                });
            }
        });
        assert_eq!(harness.sink.routing_events().len(), 41);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_valid_claims_build_schema_length_vectors(claim in valid_claim_strategy()) {
        let model = reference_model();
        let vector = FeatureBuilder::new(&model.feature_schema).build(&claim).unwrap();
        prop_assert_eq!(vector.len(), model.feature_schema.len());
        prop_assert!(vector.values.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn prop_scores_are_probabilities(claim in valid_claim_strategy()) {
        let model = reference_model();
        let vector = FeatureBuilder::new(&model.feature_schema).build(&claim).unwrap();
        let score = domain_fraud::AnomalyScorer::new().score(&vector, &model).unwrap();
        prop_assert!((0.0..=1.0).contains(&score.risk_score));
    }
}
