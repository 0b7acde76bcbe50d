/*!
 * Resume behavior of the controller across runs
 */

use std::sync::Arc;

use yadtwai::app_controller::Controller;
use yadtwai::errors::ProviderError;
use yadtwai::providers::mock::MockProvider;

use crate::common;

fn unavailable() -> ProviderError {
    ProviderError::ApiError {
        status_code: 503,
        message: "service unavailable".to_string(),
    }
}

#[tokio::test]
async fn test_rerun_afterCompletedRun_shouldNotContactBackend() {
    common::init_logging();
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_unit_file(dir.path(), "book.json", 6, 2).unwrap();
    let controller = Controller::new_unchecked(common::test_config(&dir.path().join("out")));

    let first = MockProvider::working();
    let report = controller
        .run_with_provider(Arc::new(first.clone()), &input, None, None)
        .await
        .unwrap();
    assert_eq!(report.progress.completed, 6);
    assert_eq!(first.request_count(), 3);

    let second = MockProvider::working();
    let report = controller
        .run_with_provider(Arc::new(second.clone()), &input, None, None)
        .await
        .unwrap();
    assert_eq!(second.request_count(), 0);
    assert_eq!(report.batches, 0);
    assert!(report.progress.is_complete());
}

#[tokio::test]
async fn test_rerun_afterUnavailableBackend_shouldRetryFailedSegments() {
    common::init_logging();
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_unit_file(dir.path(), "book.json", 6, 2).unwrap();
    let controller = Controller::new_unchecked(common::test_config(&dir.path().join("out")));

    let down = MockProvider::failing(unavailable());
    let report = controller
        .run_with_provider(Arc::new(down.clone()), &input, None, None)
        .await
        .unwrap();
    assert_eq!(report.failed_segments, 6);
    assert_eq!(report.progress.completed, 0);
    assert_eq!(report.progress.failed, 6);
    // Two attempts for each of the three batches
    assert_eq!(down.request_count(), 6);

    let up = MockProvider::working();
    let report = controller
        .run_with_provider(Arc::new(up.clone()), &input, None, None)
        .await
        .unwrap();
    assert_eq!(up.request_count(), 3);
    assert_eq!(report.progress.completed, 6);
    assert_eq!(report.progress.failed, 0);
}

#[tokio::test]
async fn test_rerun_afterFatalError_shouldOnlySendRemainingBatches() {
    common::init_logging();
    let dir = common::create_temp_dir().unwrap();
    let input = common::create_unit_file(dir.path(), "book.json", 6, 2).unwrap();
    let controller = Controller::new_unchecked(common::test_config(&dir.path().join("out")));

    let echo = MockProvider::working();
    let revoked = MockProvider::working().with_responder(move |request, count| {
        if count >= 1 {
            Err(ProviderError::AuthenticationError("key revoked".to_string()))
        } else {
            Ok(echo.well_formed_reply(request, usize::MAX))
        }
    });
    let result = controller
        .run_with_provider(Arc::new(revoked), &input, None, None)
        .await;
    assert!(result.is_err());

    let stats = controller.status(&input).unwrap();
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.pending, 4);

    let working = MockProvider::working();
    let report = controller
        .run_with_provider(Arc::new(working.clone()), &input, None, None)
        .await
        .unwrap();
    assert_eq!(working.request_count(), 2);
    assert_eq!(report.progress.completed, 6);

    let first_ids: Vec<u64> = working
        .requests()
        .iter()
        .map(|r| MockProvider::batch_items(&r.user)[0].0)
        .collect();
    assert_eq!(first_ids, vec![2, 4]);
}
