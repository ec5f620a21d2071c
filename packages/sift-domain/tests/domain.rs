use serde_json::json;
use time::{Duration, OffsetDateTime, macros::datetime};

use sift_domain::{
	BatchOutcome, Error, Progress, ResultRecord, ScanFilters, ScanSession, ScanStatus,
};

const T0: OffsetDateTime = datetime!(2026-01-05 07:00 UTC);

fn candidates(n: usize) -> Vec<String> {
	(0..n).map(|idx| format!("item-{idx:04}")).collect()
}

fn record(item_id: &str, score: f64) -> ResultRecord {
	ResultRecord {
		item_id: item_id.to_string(),
		score,
		constraint: None,
		matched_attributes: json!({ "window": 40 }),
		evaluated_at: T0,
	}
}

fn running_session(n: usize, batch_size: usize, limit: Option<u32>) -> ScanSession {
	let filters = ScanFilters::new(0.9, 100.0, limit, 1_000).expect("valid filters");
	let mut session =
		ScanSession::new("scan-1".to_string(), filters, candidates(n), batch_size, 3_600, T0)
			.expect("valid session");

	session.transition(ScanStatus::Running).expect("pending -> running");

	session
}

fn outcome_for(session: &ScanSession, matches: Vec<ResultRecord>) -> BatchOutcome {
	BatchOutcome { attempted: session.next_slice().len(), matches, ..Default::default() }
}

#[test]
fn batches_walk_the_list_in_order() {
	let mut session = running_session(130, 50, None);

	assert_eq!(session.total_batches, 3);
	assert_eq!(session.pending_items().first().map(String::as_str), Some("item-0000"));

	let first = session.record_batch(outcome_for(&session, Vec::new()), T0).expect("batch 1");

	assert_eq!((first.batch, first.processed_in_batch), (1, 50));
	assert!(session.has_more());

	session.record_batch(outcome_for(&session, Vec::new()), T0).expect("batch 2");

	assert_eq!(session.next_slice(), 100..130);

	let last = session
		.record_batch(outcome_for(&session, vec![record("item-0101", 0.95)]), T0)
		.expect("batch 3");

	assert_eq!(last.batch, 3);
	assert_eq!(last.processed_in_batch, 30);
	assert_eq!(last.found_in_batch, 1);
	assert_eq!(last.percentage, 100.0);
	assert_eq!(session.status, ScanStatus::Complete);
	assert_eq!(session.cursor, 130);
	assert!(!session.has_more());
}

#[test]
fn cap_stops_appending_but_not_the_cursor() {
	let mut session = running_session(10, 5, Some(2));
	let matches = vec![record("item-0000", 0.91), record("item-0001", 0.92), record("item-0002", 0.93)];
	let summary = session.record_batch(outcome_for(&session, matches), T0).expect("batch 1");

	assert_eq!(summary.found_in_batch, 2);
	assert_eq!(session.remaining_capacity(), Some(0));

	let summary = session
		.record_batch(outcome_for(&session, vec![record("item-0007", 0.99)]), T0)
		.expect("batch 2");

	assert_eq!(summary.found_in_batch, 0);
	assert_eq!(summary.cumulative_found, 2);
	assert_eq!(session.cursor, 10);
	assert_eq!(session.matches.iter().map(|m| m.item_id.as_str()).collect::<Vec<_>>(), [
		"item-0000",
		"item-0001"
	]);
}

#[test]
fn short_outcome_is_rejected_without_mutation() {
	let mut session = running_session(10, 5, None);
	let before = session.clone();
	let err = session
		.record_batch(BatchOutcome { attempted: 3, ..Default::default() }, T0)
		.expect_err("attempted must cover the whole slice");

	assert!(matches!(err, Error::Inconsistent { .. }));
	assert_eq!(session, before);
}

#[test]
fn status_never_regresses() {
	let mut session = running_session(1, 5, None);

	session.record_batch(outcome_for(&session, Vec::new()), T0).expect("only batch");

	assert_eq!(session.status, ScanStatus::Complete);

	let err = session.transition(ScanStatus::Running).expect_err("complete is terminal");

	assert!(matches!(
		err,
		Error::InvalidTransition { from: ScanStatus::Complete, to: ScanStatus::Running }
	));
	assert!(session.fail("late failure", T0).is_err());
	assert!(session.record_batch(BatchOutcome::default(), T0).is_err());
}

#[test]
fn empty_list_completes_without_batches() {
	let mut session = running_session(0, 50, None);

	session.complete_if_exhausted().expect("exhausted");

	assert_eq!(session.status, ScanStatus::Complete);
	assert_eq!(session.total_batches, 0);
	assert_eq!(session.percentage(), 100.0);
}

#[test]
fn claim_bumps_version_and_leases() {
	let mut session = running_session(10, 5, None);

	session.claim(T0, Duration::seconds(60)).expect("claim running scan");

	assert_eq!(session.version, 1);
	assert!(session.lease_active(T0 + Duration::seconds(59)));
	assert!(!session.lease_active(T0 + Duration::seconds(60)));

	session.release();

	assert!(!session.lease_active(T0));
}

#[test]
fn unrepresentable_lease_is_refused_without_mutation() {
	let mut session = running_session(10, 5, None);
	let before = session.clone();
	let err = session.claim(T0, Duration::MAX).expect_err("lease past the time range");

	assert!(matches!(err, Error::Inconsistent { .. }));
	assert_eq!(session, before);
}

#[test]
fn oversized_ttl_is_clamped_to_ten_years() {
	let filters = ScanFilters::new(0.9, 100.0, None, 1_000).expect("valid filters");
	let session = ScanSession::new("scan-1".to_string(), filters, candidates(3), 2, u64::MAX, T0)
		.expect("valid session");

	assert_eq!(session.expires_at, T0 + Duration::seconds(sift_domain::MAX_TTL_SECONDS as i64));
}

#[test]
fn touch_extends_expiry() {
	let mut session = running_session(10, 5, None);

	assert!(session.is_expired(T0 + Duration::hours(1)));

	session.touch(T0 + Duration::minutes(30));

	assert!(!session.is_expired(T0 + Duration::hours(1)));
	assert_eq!(session.expires_at, T0 + Duration::minutes(90));
}

#[test]
fn truncated_snapshot_is_inconsistent() {
	let mut session = running_session(10, 5, None);

	assert!(session.check_consistency().is_ok());

	session.candidates.truncate(4);

	assert!(matches!(session.check_consistency(), Err(Error::Inconsistent { .. })));
}

#[test]
fn filter_validation_rejects_bad_ranges() {
	assert!(ScanFilters::new(-0.1, 1.0, None, 10).is_err());
	assert!(ScanFilters::new(0.5, 0.0, None, 10).is_err());
	assert!(ScanFilters::new(0.5, f64::INFINITY, None, 10).is_err());
	assert!(ScanFilters::new(0.5, 1.0, Some(0), 10).is_err());
	assert!(ScanFilters::new(0.5, 1.0, Some(11), 10).is_err());
	assert!(ScanFilters::new(0.5, 1.0, Some(10), 10).is_ok());
}

#[test]
fn progress_reports_recent_matches_and_round_trips() {
	let mut session = running_session(30, 10, None);
	let matches = (0..4).map(|idx| record(&format!("item-{idx:04}"), 0.95)).collect();

	session.record_batch(outcome_for(&session, matches), T0).expect("batch 1");

	let progress = Progress::from_session(&session, 2);

	assert_eq!(progress.kind, "scan");
	assert_eq!((progress.current, progress.total, progress.found), (10, 30, 4));
	assert_eq!((progress.batch, progress.total_batches), (1, 3));
	assert_eq!(progress.percentage, 33.3);
	assert_eq!(progress.recent.len(), 2);
	assert_eq!(progress.recent[1].item_id, "item-0003");
	assert!(progress.detail.contains("Batch 1/3"));

	let encoded = serde_json::to_value(&progress).expect("encode progress");

	assert_eq!(encoded["type"], "scan");
	assert_eq!(encoded["status"], "running");

	let decoded: Progress = serde_json::from_value(encoded).expect("decode progress");

	assert_eq!(decoded, progress);
}

#[test]
fn session_survives_serialization() {
	let mut session = running_session(12, 5, Some(3));

	session.record_batch(outcome_for(&session, vec![record("item-0002", 0.97)]), T0).expect("batch");
	session.claim(T0, Duration::seconds(30)).expect("claim");

	let bytes = serde_json::to_vec(&session).expect("encode session");
	let decoded: ScanSession = serde_json::from_slice(&bytes).expect("decode session");

	assert_eq!(decoded, session);
}
