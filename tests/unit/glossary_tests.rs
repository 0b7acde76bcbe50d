/*!
 * Tests for glossary extraction over the lead of a document
 */

use yadtwai::app_config::GlossaryConfig;
use yadtwai::errors::{AppError, ProviderError};
use yadtwai::providers::mock::MockProvider;
use yadtwai::translation::prompts::PAIRS_HEADER;
use yadtwai::translation::{ContextBuilder, GlossaryExtractor};

use crate::common;

fn extractor(min_terms: usize, max_terms: usize) -> GlossaryExtractor {
    let config = GlossaryConfig {
        lead_fraction: 0.5,
        min_terms,
        max_terms,
        ..GlossaryConfig::default()
    };
    GlossaryExtractor::new(config, 2, ContextBuilder::default())
}

#[test]
fn test_leadCount_shouldClampToAtLeastOneSegment() {
    let extractor = extractor(20, 200);
    assert_eq!(extractor.lead_count(0), 0);
    assert_eq!(extractor.lead_count(1), 1);
    assert_eq!(extractor.lead_count(21), 10);
}

#[tokio::test]
async fn test_build_belowMinimum_shouldTranslateWholeLeadAndMergeTerms() {
    let dir = common::create_temp_dir().unwrap();
    let state = common::run_state(dir.path(), common::text_segments(20));
    let provider = MockProvider::working().with_glossary_terms(&[("Sentence", "Phrase"), ("number", "numéro")]);
    let orchestrator = common::orchestrator(provider.clone(), 0);

    let glossary = extractor(20, 200).build(&orchestrator, &state).await.unwrap();

    assert_eq!(glossary.len(), 2);
    assert_eq!(glossary.get("Sentence"), Some("Phrase"));
    // Five lead batches, each followed by one extraction request
    assert_eq!(provider.request_count(), 10);
    assert_eq!(common::completed_on_disk(dir.path()), (0..10).collect::<Vec<u64>>());
    assert_eq!(state.lock().await.segments.translated_count(), 10);
}

#[tokio::test]
async fn test_build_atMaximum_shouldStopAfterFirstBatch() {
    let dir = common::create_temp_dir().unwrap();
    let state = common::run_state(dir.path(), common::text_segments(20));
    let provider = MockProvider::working().with_glossary_terms(&[("Sentence", "Phrase")]);
    let orchestrator = common::orchestrator(provider.clone(), 0);

    let glossary = extractor(1, 1).build(&orchestrator, &state).await.unwrap();

    assert_eq!(glossary.len(), 1);
    assert_eq!(provider.request_count(), 2);
    assert_eq!(common::completed_on_disk(dir.path()), vec![0, 1]);
}

#[tokio::test]
async fn test_build_withExhaustedVocabulary_shouldStopBeforeEndOfLead() {
    let dir = common::create_temp_dir().unwrap();
    let state = common::run_state(dir.path(), common::text_segments(40));
    let owned: Vec<(String, String)> = (0..25).map(|i| (format!("term {}", i), format!("terme {}", i))).collect();
    let terms: Vec<(&str, &str)> = owned.iter().map(|(s, t)| (s.as_str(), t.as_str())).collect();
    let provider = MockProvider::working().with_glossary_terms(&terms);
    let orchestrator = common::orchestrator(provider.clone(), 0);

    let glossary = extractor(20, 200).build(&orchestrator, &state).await.unwrap();

    assert_eq!(glossary.len(), 25);
    // Five of ten lead batches: one new-term batch, then two stagnant checks
    assert_eq!(provider.request_count(), 10);
    assert_eq!(common::completed_on_disk(dir.path()), (0..10).collect::<Vec<u64>>());
    assert_eq!(state.lock().await.segments.translated_count(), 10);
}

#[tokio::test]
async fn test_build_withFailingExtraction_shouldCountAsBatchWithoutTerms() {
    let dir = common::create_temp_dir().unwrap();
    let state = common::run_state(dir.path(), common::text_segments(4));
    let echo = MockProvider::working();
    let provider = MockProvider::working().with_responder(move |request, _| {
        if request.user.contains(PAIRS_HEADER) {
            Err(ProviderError::ApiError {
                status_code: 503,
                message: "overloaded".to_string(),
            })
        } else {
            Ok(echo.well_formed_reply(request, usize::MAX))
        }
    });
    let orchestrator = common::orchestrator(provider, 0);

    let glossary = extractor(20, 200).build(&orchestrator, &state).await.unwrap();

    assert!(glossary.is_empty());
    assert_eq!(common::completed_on_disk(dir.path()), vec![0, 1]);
}

#[tokio::test]
async fn test_build_withRevokedKey_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let state = common::run_state(dir.path(), common::text_segments(10));
    let provider = MockProvider::failing(ProviderError::AuthenticationError("bad key".to_string()));
    let orchestrator = common::orchestrator(provider, 2);

    let result = extractor(20, 200).build(&orchestrator, &state).await;

    assert!(matches!(result, Err(AppError::Translation(_))));
    assert!(common::completed_on_disk(dir.path()).is_empty());
}
