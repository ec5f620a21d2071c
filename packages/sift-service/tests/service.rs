use std::{sync::Arc, time::Duration};

use sift_config::Config;
use sift_domain::ScanStatus;
use sift_service::{
	ContinueScanRequest, Error, ProgressRequest, Providers, ResultsRequest, ScanService,
	StartScanRequest,
};
use sift_storage::KvStore;
use sift_testkit::{Behavior, FlakyStore, ScriptedCandidates, ScriptedEvaluator, item_ids};

fn matching(score: f64) -> Behavior {
	Behavior::Score { score, constraint: Some(12.5) }
}

fn service_with(
	cfg: Config,
	candidates: ScriptedCandidates,
	evaluator: &ScriptedEvaluator,
) -> (ScanService, Arc<FlakyStore>) {
	let store = Arc::new(FlakyStore::new());
	let providers = Providers::new(Arc::new(candidates), Arc::new(evaluator.clone()));

	(ScanService::with_providers(cfg, store.clone(), providers), store)
}

fn service(items: usize, evaluator: &ScriptedEvaluator) -> (ScanService, Arc<FlakyStore>) {
	service_with(sift_testkit::test_config(), ScriptedCandidates::new(item_ids(items)), evaluator)
}

fn continue_req(scan_id: &str) -> ContinueScanRequest {
	ContinueScanRequest { scan_id: scan_id.to_string() }
}

#[tokio::test(start_paused = true)]
async fn scan_of_130_items_runs_in_three_batches() {
	let evaluator = ScriptedEvaluator::rejecting()
		.with("item-0007", matching(0.97))
		.with("item-0101", matching(0.91));
	let (service, _) = service(130, &evaluator);
	let started = service.start_scan(StartScanRequest::default()).await.expect("start");

	assert!(started.success);
	assert_eq!((started.batch, started.total_batches, started.has_more), (1, 3, true));
	assert_eq!(started.progress.current, 50);
	assert_eq!(started.progress.found, 1);

	let second = service.continue_scan(continue_req(&started.scan_id)).await.expect("batch 2");

	assert_eq!((second.batch, second.has_more, second.is_complete), (2, true, false));
	assert_eq!(second.progress.current, 100);

	let third = service.continue_scan(continue_req(&started.scan_id)).await.expect("batch 3");
	let summary = third.summary.expect("batch summary");

	assert_eq!((third.batch, third.has_more, third.is_complete), (3, false, true));
	assert_eq!(summary.processed_in_batch, 30);
	assert_eq!(summary.cumulative_found, 2);
	assert_eq!(third.progress.percentage, 100.0);
	assert_eq!(third.progress.status, ScanStatus::Complete);
	assert_eq!(evaluator.call_count(), 130);

	let results = service
		.get_results(ResultsRequest { scan_id: started.scan_id.clone() })
		.await
		.expect("results");

	assert_eq!(results.matches.iter().map(|m| m.item_id.as_str()).collect::<Vec<_>>(), [
		"item-0007",
		"item-0101"
	]);
	assert_eq!(results.total_scanned, 130);
}

#[tokio::test(start_paused = true)]
async fn timeouts_skip_items_but_advance_the_cursor() {
	let evaluator = ScriptedEvaluator::new(Behavior::Hang);
	let (service, _) = service(60, &evaluator);
	let started = service.start_scan(StartScanRequest::default()).await.expect("start");
	let summary = started.summary.expect("batch summary");

	assert_eq!(summary.processed_in_batch, 50);
	assert_eq!(summary.timed_out_in_batch, 50);
	assert_eq!(summary.found_in_batch, 0);
	assert_eq!(started.progress.current, 50);
	assert!(started.has_more);

	let last = service.continue_scan(continue_req(&started.scan_id)).await.expect("batch 2");

	assert!(last.is_complete);
	assert_eq!(last.progress.found, 0);
}

#[tokio::test(start_paused = true)]
async fn soft_deadline_skips_the_tail_of_the_slice() {
	let mut cfg = sift_testkit::test_config();

	cfg.scan.batch_size = 10;
	cfg.scan.concurrency = 1;
	cfg.scan.item_timeout_ms = 1_000;
	cfg.scan.invocation_limit_ms = 5_000;
	cfg.scan.persist_margin_ms = 1_000;

	let evaluator = ScriptedEvaluator::new(Behavior::Hang);
	let (service, _) =
		service_with(cfg, ScriptedCandidates::new(item_ids(10)), &evaluator);
	let started = service.start_scan(StartScanRequest::default()).await.expect("start");
	let summary = started.summary.expect("batch summary");

	assert_eq!(summary.timed_out_in_batch, 4);
	assert_eq!(summary.skipped_in_batch, 6);
	assert_eq!(summary.processed_in_batch, 10);
	assert_eq!(evaluator.call_count(), 4);
	assert!(started.progress.status == ScanStatus::Complete);
}

#[tokio::test(start_paused = true)]
async fn completed_scan_is_returned_unchanged() {
	let evaluator = ScriptedEvaluator::new(matching(0.95));
	let (service, store) = service(20, &evaluator);
	let started = service.start_scan(StartScanRequest::default()).await.expect("start");

	assert!(!started.has_more);

	let writes = store.write_count();
	let first = service.continue_scan(continue_req(&started.scan_id)).await.expect("repeat");
	let second = service.continue_scan(continue_req(&started.scan_id)).await.expect("repeat");

	assert!(first.is_complete && second.is_complete);
	assert_eq!(first.summary, started.summary);
	assert_eq!(first.progress, second.progress);
	assert_eq!(store.write_count(), writes);
	assert_eq!(evaluator.call_count(), 20);
}

#[tokio::test(start_paused = true)]
async fn concurrent_continuations_yield_one_busy() {
	let evaluator =
		ScriptedEvaluator::new(Behavior::Slow { delay: Duration::from_millis(200), score: 0.95 });
	let (service, _) = service(150, &evaluator);
	let started = service.start_scan(StartScanRequest::default()).await.expect("start");
	let before =
		service.repo.load(&started.scan_id).await.expect("load").expect("present").session;

	assert_eq!((before.version, before.cursor), (0, 50));

	let (left, right) = tokio::join!(
		service.continue_scan(continue_req(&started.scan_id)),
		service.continue_scan(continue_req(&started.scan_id)),
	);
	let (ok, busy) = match (left, right) {
		(Ok(ok), Err(busy)) | (Err(busy), Ok(ok)) => (ok, busy),
		other => panic!("expected exactly one busy continuation, got {other:?}"),
	};

	assert!(matches!(busy, Error::Busy { retry_after_secs, .. } if retry_after_secs >= 1));
	assert_eq!(ok.batch, 2);
	assert_eq!(ok.progress.current, 100);
	assert_eq!(evaluator.call_count(), 100);

	let after =
		service.repo.load(&started.scan_id).await.expect("load").expect("present").session;

	assert_eq!(after.version, 1);
	assert_eq!(after.cursor, 100);
	assert_eq!(after.current_batch_index, 2);
	assert_eq!(after.lease_until, None);

	let last = service.continue_scan(continue_req(&started.scan_id)).await.expect("batch 3");

	assert!(last.is_complete);
	assert_eq!(last.progress.found, 150);
}

#[tokio::test(start_paused = true)]
async fn scans_run_on_spawned_tasks() {
	let evaluator = ScriptedEvaluator::new(matching(0.95));
	let (service, _) = service(120, &evaluator);
	let service = Arc::new(service);
	let started = tokio::spawn({
		let service = service.clone();

		async move { service.start_scan(StartScanRequest::default()).await }
	})
	.await
	.expect("start task")
	.expect("start");
	let mut batches = vec![started.batch];

	loop {
		let task_service = service.clone();
		let req = continue_req(&started.scan_id);
		let response = tokio::spawn(async move { task_service.continue_scan(req).await })
			.await
			.expect("continue task")
			.expect("continue");

		batches.push(response.batch);

		if !response.has_more {
			assert!(response.is_complete);
			assert_eq!(response.progress.found, 120);

			break;
		}
	}

	assert_eq!(batches, [1, 2, 3]);
	assert_eq!(evaluator.call_count(), 120);
}

#[tokio::test]
async fn unknown_and_blank_ids_are_rejected() {
	let evaluator = ScriptedEvaluator::rejecting();
	let (service, _) = service(5, &evaluator);

	assert!(matches!(
		service.continue_scan(continue_req("nonexistent-id")).await,
		Err(Error::NotFound { .. })
	));
	assert!(matches!(
		service.get_progress(ProgressRequest { scan_id: "nonexistent-id".to_string() }).await,
		Err(Error::NotFound { .. })
	));
	assert!(matches!(
		service.continue_scan(continue_req("  ")).await,
		Err(Error::InvalidRequest { .. })
	));
}

#[tokio::test]
async fn empty_candidate_list_completes_immediately() {
	let evaluator = ScriptedEvaluator::rejecting();
	let (service, _) = service(0, &evaluator);
	let started = service.start_scan(StartScanRequest::default()).await.expect("start");

	assert_eq!((started.batch, started.total_batches, started.has_more), (0, 0, false));
	assert_eq!(started.progress.percentage, 100.0);
	assert_eq!(started.progress.status, ScanStatus::Complete);
	assert!(started.summary.is_none());

	let again = service.continue_scan(continue_req(&started.scan_id)).await.expect("continue");

	assert!(again.is_complete);
	assert_eq!(evaluator.call_count(), 0);
}

#[tokio::test]
async fn result_cap_stops_evaluation_once_reached() {
	let evaluator = ScriptedEvaluator::new(matching(0.95));
	let (service, _) = service(120, &evaluator);
	let started = service
		.start_scan(StartScanRequest { limit: Some(3), ..Default::default() })
		.await
		.expect("start");

	assert_eq!(started.progress.found, 3);

	let second = service.continue_scan(continue_req(&started.scan_id)).await.expect("batch 2");
	let summary = second.summary.expect("batch summary");

	assert_eq!(summary.skipped_in_batch, 50);
	assert_eq!(summary.found_in_batch, 0);
	assert_eq!(second.progress.current, 100);
	assert_eq!(evaluator.call_count(), 50);

	let last = service.continue_scan(continue_req(&started.scan_id)).await.expect("batch 3");

	assert!(last.is_complete);
	assert_eq!(last.progress.found, 3);
}

#[tokio::test]
async fn failed_and_partial_items_are_skipped() {
	let evaluator = ScriptedEvaluator::new(matching(0.95))
		.with("item-0001", Behavior::Fail)
		.with("item-0002", Behavior::Partial)
		.with("item-0003", Behavior::Score { score: 0.99, constraint: Some(250.0) })
		.with("item-0004", Behavior::Score { score: 0.99, constraint: None });
	let (service, _) = service(5, &evaluator);
	let started = service.start_scan(StartScanRequest::default()).await.expect("start");
	let summary = started.summary.expect("batch summary");

	assert_eq!(summary.failed_in_batch, 2);
	assert_eq!(summary.found_in_batch, 2);
	assert!(started.progress.status == ScanStatus::Complete);

	let results = service
		.get_results(ResultsRequest { scan_id: started.scan_id })
		.await
		.expect("results");

	assert_eq!(results.matches.iter().map(|m| m.item_id.as_str()).collect::<Vec<_>>(), [
		"item-0000",
		"item-0004"
	]);
}

#[tokio::test]
async fn filters_are_validated_before_anything_is_written() {
	let evaluator = ScriptedEvaluator::rejecting();
	let (service, store) = service(5, &evaluator);
	let err = service
		.start_scan(StartScanRequest { min_score: Some(1.5), ..Default::default() })
		.await
		.expect_err("min_score out of range");

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert_eq!(store.write_count(), 0);
	assert_eq!(evaluator.call_count(), 0);
}

#[tokio::test]
async fn unavailable_candidates_create_nothing() {
	let evaluator = ScriptedEvaluator::rejecting();
	let (service, store) =
		service_with(sift_testkit::test_config(), ScriptedCandidates::unavailable(), &evaluator);
	let err = service.start_scan(StartScanRequest::default()).await.expect_err("provider down");

	assert!(matches!(err, Error::Provider { .. }));
	assert_eq!(store.write_count(), 0);
}

#[tokio::test]
async fn store_outage_surfaces_as_storage_error() {
	let evaluator = ScriptedEvaluator::rejecting();
	let (service, store) = service(60, &evaluator);
	let started = service.start_scan(StartScanRequest::default()).await.expect("start");

	store.fail_writes(true);

	let err = service
		.continue_scan(continue_req(&started.scan_id))
		.await
		.expect_err("claim cannot be written");

	assert!(matches!(err, Error::Storage { .. }));

	store.fail_writes(false);

	let progress = service
		.get_progress(ProgressRequest { scan_id: started.scan_id.clone() })
		.await
		.expect("progress");

	assert_eq!(progress.progress.current, 50);
	assert_eq!(progress.progress.status, ScanStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn expired_sessions_are_not_found() {
	let mut cfg = sift_testkit::test_config();

	cfg.storage.session_ttl_seconds = 60;

	let evaluator = ScriptedEvaluator::rejecting();
	let (service, _) = service_with(cfg, ScriptedCandidates::new(item_ids(80)), &evaluator);
	let started = service.start_scan(StartScanRequest::default()).await.expect("start");

	tokio::time::advance(Duration::from_secs(61)).await;

	assert!(matches!(
		service.get_progress(ProgressRequest { scan_id: started.scan_id.clone() }).await,
		Err(Error::NotFound { .. })
	));
	assert!(matches!(
		service.continue_scan(continue_req(&started.scan_id)).await,
		Err(Error::NotFound { .. })
	));
}

#[tokio::test]
async fn inconsistent_record_is_marked_failed() {
	let evaluator = ScriptedEvaluator::rejecting();
	let (service, store) = service(120, &evaluator);
	let started = service.start_scan(StartScanRequest::default()).await.expect("start");
	let mut stored = service
		.repo
		.load(&started.scan_id)
		.await
		.expect("load")
		.expect("present")
		.session;

	stored.candidates.truncate(10);

	let raw = serde_json::to_vec(&stored).expect("encode");

	store
		.set(&service.repo.key(&started.scan_id), &raw, Duration::from_secs(600))
		.await
		.expect("overwrite");

	let failed = service.continue_scan(continue_req(&started.scan_id)).await.expect("continue");

	assert_eq!(failed.progress.status, ScanStatus::Failed);
	assert!(!failed.has_more && !failed.is_complete);

	let progress = service
		.get_progress(ProgressRequest { scan_id: started.scan_id.clone() })
		.await
		.expect("progress");

	assert_eq!(progress.progress.status, ScanStatus::Failed);
	assert_eq!(evaluator.call_count(), 50);

	let repeated = service.continue_scan(continue_req(&started.scan_id)).await.expect("repeat");

	assert_eq!(failed.summary, None);
	assert_eq!(repeated.summary, failed.summary);
	assert_eq!(repeated.progress, failed.progress);
	assert_eq!(evaluator.call_count(), 50);
}

#[tokio::test(start_paused = true)]
async fn matches_keep_candidate_order_under_concurrency() {
	let evaluator = ScriptedEvaluator::new(matching(0.95))
		.with("item-0000", Behavior::Slow { delay: Duration::from_millis(900), score: 0.95 })
		.with("item-0001", Behavior::Slow { delay: Duration::from_millis(300), score: 0.95 });
	let (service, _) = service(6, &evaluator);
	let started = service.start_scan(StartScanRequest::default()).await.expect("start");
	let results = service
		.get_results(ResultsRequest { scan_id: started.scan_id })
		.await
		.expect("results");

	assert_eq!(
		results.matches.iter().map(|m| m.item_id.clone()).collect::<Vec<_>>(),
		item_ids(6)
	);
}
