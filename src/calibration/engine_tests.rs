use super::*;
use crate::config::CalibrationConfig;
use approx::assert_relative_eq;
use chrono::{Duration, TimeZone};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 2, 9, 30, 0).unwrap()
}

/// Fresh fix `offset_ms` after t0 with the timestamp equal to the arrival time
fn fix_at(offset_ms: i64, lat: f64, lon: f64, accuracy_m: f64) -> (PositionSample, DateTime<Utc>) {
    let at = t0() + Duration::milliseconds(offset_ms);
    (PositionSample::new(lat, lon, accuracy_m, at), at)
}

fn engine_with(min_good_samples: u32, policy: StartPolicy) -> CalibrationEngine {
    CalibrationEngine::new(CalibrationConfig {
        min_good_samples,
        start_policy: policy,
        ..CalibrationConfig::default()
    })
}

#[test]
fn test_new_engine_is_idle() {
    let engine = CalibrationEngine::new(CalibrationConfig::default());
    assert_eq!(engine.status(), CalibrationStatus::Idle);
    assert!(!engine.is_running());
    assert!(engine.current_run().is_none());
    assert!(engine.progress(t0()).is_none());
}

#[test]
fn test_start_sets_running_and_deadline() {
    let mut engine = CalibrationEngine::new(CalibrationConfig::default());
    let start = engine.start(CalibrationKind::Center, t0()).unwrap();

    assert_eq!(start.run_id, RunId(1));
    assert_eq!(start.kind, CalibrationKind::Center);
    assert_eq!(start.deadline, t0() + Duration::milliseconds(20_000));
    assert!(start.cancelled.is_none());
    assert!(engine.is_running());
    assert_eq!(engine.active_run_id(), Some(RunId(1)));

    let run = engine.current_run().unwrap();
    assert_eq!(run.sample_count(), 0);
    assert_eq!(run.progress(), 0.0);
    assert_eq!(run.started_at(), t0());
}

#[test]
fn test_ingest_while_idle_is_noop() {
    let mut engine = CalibrationEngine::new(CalibrationConfig::default());
    let (sample, at) = fix_at(0, 47.0, 8.0, 3.0);
    assert_eq!(engine.ingest(&sample, at), IngestOutcome::Idle);
    assert_eq!(engine.status(), CalibrationStatus::Idle);
}

#[test]
fn test_ingest_rejects_poor_and_invalid_fixes() {
    let mut engine = CalibrationEngine::new(CalibrationConfig::default());
    engine.start(CalibrationKind::Rig, t0()).unwrap();

    let (poor, at) = fix_at(100, 47.0, 8.0, 12.0);
    assert!(matches!(
        engine.ingest(&poor, at),
        IngestOutcome::Rejected(Rejection::PoorAccuracy { .. })
    ));

    let (invalid, at) = fix_at(200, 47.0, 8.0, -1.0);
    assert!(matches!(
        engine.ingest(&invalid, at),
        IngestOutcome::Rejected(Rejection::InvalidAccuracy { .. })
    ));

    // fix is 6 s old on arrival
    let stale = PositionSample::new(47.0, 8.0, 3.0, t0());
    assert!(matches!(
        engine.ingest(&stale, t0() + Duration::seconds(6)),
        IngestOutcome::Rejected(Rejection::Stale { .. })
    ));

    assert_eq!(engine.current_run().unwrap().sample_count(), 0);
}

#[test]
fn test_ingest_updates_progress_from_elapsed_time() {
    let mut engine = CalibrationEngine::new(CalibrationConfig::default());
    engine.start(CalibrationKind::Center, t0()).unwrap();

    let (sample, at) = fix_at(5_000, 47.0, 8.0, 3.0);
    match engine.ingest(&sample, at) {
        IngestOutcome::Accepted {
            collected,
            progress,
        } => {
            assert_eq!(collected, 1);
            assert_relative_eq!(progress, 0.25);
        }
        other => panic!("expected Accepted, got {:?}", other),
    }

    let progress = engine.progress(t0() + Duration::seconds(10)).unwrap();
    assert_eq!(progress.samples_collected, 1);
    assert_eq!(progress.samples_needed, 10);
    assert_relative_eq!(progress.elapsed_fraction, 0.5);
}

#[test]
fn test_twelve_fixes_complete_once_with_first_ten() {
    let mut engine = CalibrationEngine::new(CalibrationConfig::default());
    engine.start(CalibrationKind::Center, t0()).unwrap();

    let mut finished = Vec::new();
    for i in 0..12 {
        // fixes 10 and 11 are far away; they must not move the result
        let (lat, lon) = if i < 10 { (47.0, 8.0) } else { (10.0, 10.0) };
        let (sample, at) = fix_at(i * 100, lat, lon, 2.0);
        match engine.ingest(&sample, at) {
            IngestOutcome::Finished(outcome) => finished.push(outcome),
            IngestOutcome::Accepted { .. } => assert!(i < 9),
            IngestOutcome::Idle => assert!(i >= 10),
            other => panic!("unexpected {:?} at fix {}", other, i),
        }
    }

    assert_eq!(finished.len(), 1);
    match &finished[0] {
        CalibrationOutcome::Completed { kind, result, .. } => {
            assert_eq!(*kind, CalibrationKind::Center);
            assert_eq!(result.sample_count, 10);
            assert_relative_eq!(result.coordinate.latitude, 47.0, epsilon = 1e-9);
            assert_relative_eq!(result.coordinate.longitude, 8.0, epsilon = 1e-9);
            assert_relative_eq!(result.average_accuracy_m, 2.0);
        }
        other => panic!("expected Completed, got {:?}", other),
    }
    assert_eq!(engine.current_run().unwrap().sample_count(), 10);
}

#[test]
fn test_deadline_after_early_completion_is_noop() {
    let mut engine = engine_with(3, StartPolicy::Reject);
    let start = engine.start(CalibrationKind::Rig, t0()).unwrap();

    let mut outcome = None;
    for i in 0..3 {
        let (sample, at) = fix_at(i * 10, 47.0, 8.0, 1.0);
        if let IngestOutcome::Finished(o) = engine.ingest(&sample, at) {
            outcome = Some(o);
        }
    }
    assert!(outcome.unwrap().is_completed());

    // both triggers in the same tick
    assert!(engine.deadline_elapsed(start.run_id, t0()).is_none());
    assert!(engine.poll_deadline(start.deadline).is_none());
    assert!(matches!(
        engine.status(),
        CalibrationStatus::Completed { .. }
    ));
}

#[test]
fn test_repeated_deadline_fires_once() {
    let mut engine = engine_with(3, StartPolicy::Reject);
    let start = engine.start(CalibrationKind::Center, t0()).unwrap();

    let first = engine.deadline_elapsed(start.run_id, start.deadline);
    let second = engine.deadline_elapsed(start.run_id, start.deadline);
    assert!(first.is_some());
    assert!(second.is_none());
}

#[test]
fn test_deadline_with_too_few_fixes_fails() {
    let mut engine = CalibrationEngine::new(CalibrationConfig::default());
    let start = engine.start(CalibrationKind::Center, t0()).unwrap();

    for i in 0..4 {
        let (sample, at) = fix_at(i * 500, 47.0, 8.0, 3.0);
        engine.ingest(&sample, at);
    }

    let outcome = engine.deadline_elapsed(start.run_id, start.deadline).unwrap();
    assert_eq!(
        outcome,
        CalibrationOutcome::Failed {
            run_id: start.run_id,
            kind: CalibrationKind::Center,
            reason: CalibrationError::InsufficientSamples {
                required: 10,
                collected: 4,
            },
        }
    );
    assert!(engine.status().is_terminal());
    assert_eq!(engine.current_run().unwrap().progress(), 1.0);
}

#[test]
fn test_poll_deadline_waits_for_deadline() {
    let mut engine = CalibrationEngine::new(CalibrationConfig::default());
    let start = engine.start(CalibrationKind::Center, t0()).unwrap();

    assert!(engine
        .poll_deadline(start.deadline - Duration::milliseconds(1))
        .is_none());
    assert!(engine.is_running());

    let outcome = engine.poll_deadline(start.deadline).unwrap();
    assert!(!outcome.is_completed());
    assert!(!engine.is_running());
}

#[test]
fn test_stale_run_id_deadline_is_ignored() {
    let mut engine = engine_with(10, StartPolicy::CancelActive);
    let first = engine.start(CalibrationKind::Center, t0()).unwrap();
    let second = engine.start(CalibrationKind::Rig, t0()).unwrap();

    assert!(engine.deadline_elapsed(first.run_id, first.deadline).is_none());
    assert_eq!(engine.active_run_id(), Some(second.run_id));
}

#[test]
fn test_second_start_rejected_by_default() {
    let mut engine = CalibrationEngine::new(CalibrationConfig::default());
    engine.start(CalibrationKind::Center, t0()).unwrap();

    let err = engine.start(CalibrationKind::Rig, t0()).unwrap_err();
    assert_eq!(err, CalibrationError::AlreadyRunning);
    assert_eq!(engine.current_run().unwrap().kind(), CalibrationKind::Center);
}

#[test]
fn test_second_start_cancels_active_when_configured() {
    let mut engine = engine_with(10, StartPolicy::CancelActive);
    let first = engine.start(CalibrationKind::Center, t0()).unwrap();
    let (sample, at) = fix_at(100, 47.0, 8.0, 3.0);
    engine.ingest(&sample, at);

    let second = engine.start(CalibrationKind::Rig, at).unwrap();
    assert_eq!(second.cancelled, Some(first.run_id));
    assert_ne!(second.run_id, first.run_id);

    let run = engine.current_run().unwrap();
    assert_eq!(run.kind(), CalibrationKind::Rig);
    assert_eq!(run.sample_count(), 0);
}

#[test]
fn test_cancel_discards_samples() {
    let mut engine = CalibrationEngine::new(CalibrationConfig::default());
    engine.start(CalibrationKind::Rig, t0()).unwrap();
    for i in 0..5 {
        let (sample, at) = fix_at(i * 100, 47.0, 8.0, 3.0);
        engine.ingest(&sample, at);
    }

    let cancelled = engine.cancel().unwrap();
    assert_eq!(cancelled, RunId(1));
    assert_eq!(engine.status(), CalibrationStatus::Cancelled);
    assert!(engine.current_run().unwrap().samples().is_empty());

    // no further fixes counted after leaving Running
    let (sample, at) = fix_at(600, 47.0, 8.0, 3.0);
    assert_eq!(engine.ingest(&sample, at), IngestOutcome::Idle);

    let restart = engine.start(CalibrationKind::Rig, at).unwrap();
    assert_eq!(restart.run_id, RunId(2));
    let run = engine.current_run().unwrap();
    assert_eq!(run.sample_count(), 0);
    assert!(run.samples().is_empty());
}

#[test]
fn test_zero_total_weight_fails_with_no_average() {
    let mut engine = CalibrationEngine::new(CalibrationConfig {
        min_good_samples: 1,
        weight_floor_m: 0.0,
        ..CalibrationConfig::default()
    });
    engine.start(CalibrationKind::Center, t0()).unwrap();

    // (1e-200)^2 underflows to zero, so the weight is infinite
    let (sample, at) = fix_at(10, 47.0, 8.0, 1e-200);
    match engine.ingest(&sample, at) {
        IngestOutcome::Finished(CalibrationOutcome::Failed { reason, .. }) => {
            assert_eq!(reason, CalibrationError::NoAverage);
        }
        other => panic!("expected Failed(NoAverage), got {:?}", other),
    }
    assert_eq!(
        engine.status(),
        CalibrationStatus::Failed {
            reason: CalibrationError::NoAverage
        }
    );

    assert!(engine.start(CalibrationKind::Center, at).is_ok());
    assert!(engine.is_running());
}

#[test]
fn test_stale_deadline_reports_unknown_run() {
    let mut engine = engine_with(10, StartPolicy::CancelActive);
    let first = engine.start(CalibrationKind::Center, t0()).unwrap();
    let second = engine.start(CalibrationKind::Rig, t0()).unwrap();

    assert_eq!(
        engine.run_status(first.run_id),
        Err(CalibrationError::UnknownRun { run_id: 1 })
    );
    assert!(engine.deadline_elapsed(first.run_id, first.deadline).is_none());
    assert_eq!(engine.run_status(second.run_id), Ok(&CalibrationStatus::Running));
}

#[test]
fn test_huge_sample_target_does_not_preallocate() {
    let mut engine = engine_with(u32::MAX, StartPolicy::Reject);
    let start = engine.start(CalibrationKind::Center, t0()).unwrap();
    assert_eq!(start.deadline, t0() + Duration::seconds(20));
    assert!(engine.current_run().unwrap().samples.capacity() <= 64);
}

#[test]
fn test_cancel_when_not_running() {
    let mut engine = CalibrationEngine::new(CalibrationConfig::default());
    assert_eq!(engine.cancel(), Err(CalibrationError::NotRunning));
}

#[test]
fn test_terminal_state_is_restartable() {
    let mut engine = engine_with(1, StartPolicy::Reject);
    engine.start(CalibrationKind::Center, t0()).unwrap();
    let (sample, at) = fix_at(10, 47.0, 8.0, 3.0);
    assert!(matches!(
        engine.ingest(&sample, at),
        IngestOutcome::Finished(_)
    ));

    let restart = engine.start(CalibrationKind::Center, at).unwrap();
    assert_eq!(restart.run_id, RunId(2));
    assert!(engine.is_running());
    assert_eq!(engine.current_run().unwrap().sample_count(), 0);
}

#[test]
fn test_weighting_prefers_precise_fixes() {
    let mut engine = engine_with(2, StartPolicy::Reject);
    engine.start(CalibrationKind::Center, t0()).unwrap();

    let (a, at_a) = fix_at(0, 1.0, 1.0, 1.0);
    let (b, at_b) = fix_at(10, 3.0, 3.0, 3.0);
    engine.ingest(&a, at_a);
    match engine.ingest(&b, at_b) {
        IngestOutcome::Finished(CalibrationOutcome::Completed { result, .. }) => {
            assert_relative_eq!(result.coordinate.latitude, 1.2, epsilon = 1e-12);
            assert_relative_eq!(result.coordinate.longitude, 1.2, epsilon = 1e-12);
            assert_relative_eq!(result.average_accuracy_m, 2.0);
        }
        other => panic!("expected Completed, got {:?}", other),
    }
}
