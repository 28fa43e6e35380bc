use crate::engine::{ThresholdEvaluator, TransitionKind};
use crate::state::{has_recovered, PairPhase, PairState, Step};
use chrono::{DateTime, Duration, TimeZone, Utc};
use prodgap_common::id::IdKind;
use prodgap_common::types::{AlertStatus, AlertType, KpiThreshold, Severity, ThresholdScope};
use std::sync::Arc;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 9, 6, 0, 0).unwrap()
}

fn at(minutes: i64) -> DateTime<Utc> {
    t0() + Duration::minutes(minutes)
}

/// upper=80, hysteresis=5%, minimum duration=10 minutes.
fn pressure_threshold() -> KpiThreshold {
    KpiThreshold {
        id: "thr-sep-pressure".into(),
        threshold_name: "Separator pressure high".into(),
        scope: ThresholdScope::Equipment("SEP-01".into()),
        kpi_name: "pressure".into(),
        kpi_description: None,
        measurement_unit: Some("bar".into()),
        upper_limit: Some(80.0),
        lower_limit: None,
        target_value: Some(65.0),
        alert_severity: Severity::Critical,
        hysteresis_percentage: Some(5.0),
        minimum_duration_minutes: Some(10),
        is_active: true,
        effective_from: t0() - Duration::days(30),
        effective_to: None,
        created_by: Some("ops".into()),
        approved_by: None,
        comments: None,
        created_at: t0(),
        updated_at: t0(),
    }
}

fn evaluator(thresholds: Vec<KpiThreshold>) -> ThresholdEvaluator {
    prodgap_common::id::init(1, 1);
    ThresholdEvaluator::new(thresholds)
}

fn raised(ev: &ThresholdEvaluator, value: f64, minutes: i64) -> usize {
    ev.evaluate_sample("SEP-01", "pressure", value, at(minutes))
        .transitions
        .iter()
        .filter(|t| t.kind == TransitionKind::Raised)
        .count()
}

#[test]
fn sustained_breach_raises_exactly_one_alert() {
    let ev = evaluator(vec![pressure_threshold()]);

    let mut total = 0;
    for minute in [0, 2, 4, 6, 8] {
        total += raised(&ev, 85.0, minute);
    }
    assert_eq!(total, 0, "breach shorter than minimum duration");

    let outcome = ev.evaluate_sample("SEP-01", "pressure", 85.0, at(10));
    assert_eq!(outcome.transitions.len(), 1);
    let transition = &outcome.transitions[0];
    assert_eq!(transition.kind, TransitionKind::Raised);
    assert_eq!(transition.threshold_id, "thr-sep-pressure");

    let alert = transition.alert.as_ref().unwrap();
    assert_eq!(Some(alert.id.clone()), transition.alert_id);
    assert_eq!(IdKind::of(&alert.id), Some(IdKind::Alert));
    assert_eq!(alert.status, AlertStatus::New);
    assert_eq!(alert.alert_type, AlertType::ThresholdBreach);
    assert_eq!(alert.severity, Severity::Critical);
    assert_eq!(alert.priority, 8);
    assert_eq!(alert.measured_value, Some(85.0));
    assert_eq!(alert.threshold_value, Some(80.0));
    assert_eq!(alert.equipment_id.as_deref(), Some("SEP-01"));
    assert!(!alert.safety_critical);

    for minute in [12, 14, 20] {
        assert_eq!(raised(&ev, 85.0, minute), 0, "no duplicate while alerted");
    }
}

#[test]
fn short_breach_then_recovery_raises_nothing() {
    let ev = evaluator(vec![pressure_threshold()]);
    assert_eq!(raised(&ev, 85.0, 0), 0);
    assert_eq!(raised(&ev, 85.0, 5), 0);
    let outcome = ev.evaluate_sample("SEP-01", "pressure", 70.0, at(6));
    assert!(outcome.transitions.is_empty());
    assert_eq!(ev.pair_phase("SEP-01", "thr-sep-pressure"), Some(PairPhase::Clear));

    // The duration restarts after returning to bounds.
    assert_eq!(raised(&ev, 85.0, 7), 0);
    assert_eq!(raised(&ev, 85.0, 16), 0);
    assert_eq!(raised(&ev, 85.0, 17), 1);
}

#[test]
fn alert_clears_only_below_hysteresis_band() {
    let ev = evaluator(vec![pressure_threshold()]);
    raised(&ev, 85.0, 0);
    assert_eq!(raised(&ev, 85.0, 10), 1);

    for (value, minute) in [(79.0, 11), (77.0, 12), (76.0, 13)] {
        let outcome = ev.evaluate_sample("SEP-01", "pressure", value, at(minute));
        assert!(outcome.transitions.is_empty(), "{value} must not clear");
    }

    let outcome = ev.evaluate_sample("SEP-01", "pressure", 75.9, at(14));
    assert_eq!(outcome.transitions.len(), 1);
    assert_eq!(outcome.transitions[0].kind, TransitionKind::Cleared);
    assert!(outcome.transitions[0].alert_id.is_some());
    assert_eq!(ev.pair_phase("SEP-01", "thr-sep-pressure"), Some(PairPhase::Clear));
}

#[test]
fn zero_minimum_duration_alerts_immediately() {
    let mut threshold = pressure_threshold();
    threshold.minimum_duration_minutes = None;
    let ev = evaluator(vec![threshold]);
    assert_eq!(raised(&ev, 81.0, 0), 1);
}

#[test]
fn lower_limit_uses_its_own_band() {
    let mut threshold = pressure_threshold();
    threshold.upper_limit = None;
    threshold.lower_limit = Some(20.0);
    threshold.hysteresis_percentage = Some(10.0);
    threshold.minimum_duration_minutes = Some(0);
    let ev = evaluator(vec![threshold.clone()]);

    assert_eq!(raised(&ev, 15.0, 0), 1);
    assert!(ev.evaluate_sample("SEP-01", "pressure", 22.0, at(1)).transitions.is_empty());
    let outcome = ev.evaluate_sample("SEP-01", "pressure", 22.5, at(2));
    assert_eq!(outcome.transitions[0].kind, TransitionKind::Cleared);

    assert!(has_recovered(&threshold, 22.1));
    assert!(!has_recovered(&threshold, 22.0));
}

#[test]
fn missing_limits_are_skipped_not_failed() {
    let mut broken = pressure_threshold();
    broken.id = "thr-broken".into();
    broken.upper_limit = None;
    broken.lower_limit = None;
    let ev = evaluator(vec![broken, pressure_threshold()]);

    let outcome = ev.evaluate_sample("SEP-01", "pressure", 85.0, at(0));
    assert_eq!(outcome.skipped.len(), 1);
    assert_eq!(outcome.skipped[0].threshold_id, "thr-broken");
    assert!(outcome.transitions.is_empty());
    assert_eq!(
        ev.pair_phase("SEP-01", "thr-sep-pressure"),
        Some(PairPhase::Breaching { since: at(0) })
    );
}

#[test]
fn inactive_and_expired_thresholds_are_excluded() {
    let mut inactive = pressure_threshold();
    inactive.is_active = false;
    inactive.minimum_duration_minutes = None;
    let mut expired = pressure_threshold();
    expired.id = "thr-expired".into();
    expired.effective_to = Some(t0() - Duration::days(1));
    expired.minimum_duration_minutes = None;
    let mut future = pressure_threshold();
    future.id = "thr-future".into();
    future.effective_from = t0() + Duration::days(1);
    future.minimum_duration_minutes = None;

    let ev = evaluator(vec![inactive, expired, future]);
    let outcome = ev.evaluate_sample("SEP-01", "pressure", 500.0, at(0));
    assert!(outcome.transitions.is_empty());
    assert!(outcome.skipped.is_empty());
}

#[test]
fn other_entities_and_kpis_do_not_match() {
    let ev = evaluator(vec![pressure_threshold()]);
    assert!(ev.evaluate_sample("SEP-02", "pressure", 500.0, at(0)).transitions.is_empty());
    assert!(ev.evaluate_sample("SEP-01", "temperature", 500.0, at(0)).transitions.is_empty());
    assert_eq!(ev.pair_phase("SEP-02", "thr-sep-pressure"), None);
}

#[test]
fn stale_samples_are_ignored() {
    let mut state = PairState::default();
    let threshold = pressure_threshold();
    assert_eq!(state.apply(&threshold, 85.0, at(10), || "a".into()), Step::Hold);
    assert_eq!(state.apply(&threshold, 70.0, at(5), || "a".into()), Step::Stale);
    assert_eq!(state.phase, PairPhase::Breaching { since: at(10) });
}

#[test]
fn emergency_alerts_are_safety_critical() {
    let mut threshold = pressure_threshold();
    threshold.alert_severity = Severity::Emergency;
    threshold.minimum_duration_minutes = None;
    let ev = evaluator(vec![threshold]);
    let outcome = ev.evaluate_sample("SEP-01", "pressure", 90.0, at(0));
    let alert = outcome.transitions[0].alert.as_ref().unwrap();
    assert!(alert.safety_critical);
    assert_eq!(alert.priority, 10);
}

#[test]
fn restored_alert_is_cleared_on_recovery() {
    let ev = evaluator(vec![pressure_threshold()]);
    ev.restore_open_alert("SEP-01", "thr-sep-pressure", "alert-42", at(0));
    assert_eq!(raised(&ev, 90.0, 1), 0);
    let outcome = ev.evaluate_sample("SEP-01", "pressure", 60.0, at(2));
    assert_eq!(outcome.transitions[0].alert_id.as_deref(), Some("alert-42"));
}

#[test]
fn upsert_and_remove_threshold() {
    let ev = evaluator(vec![]);
    ev.upsert_threshold(pressure_threshold());
    let mut changed = pressure_threshold();
    changed.upper_limit = Some(90.0);
    ev.upsert_threshold(changed);
    assert_eq!(ev.threshold_count(), 1);
    assert_eq!(ev.thresholds()[0].upper_limit, Some(90.0));

    raised(&ev, 95.0, 0);
    assert!(ev.pair_phase("SEP-01", "thr-sep-pressure").is_some());
    assert!(ev.remove_threshold("thr-sep-pressure"));
    assert!(ev.pair_phase("SEP-01", "thr-sep-pressure").is_none());
    assert!(!ev.remove_threshold("thr-sep-pressure"));
}

#[test]
fn concurrent_samples_for_one_pair_raise_once() {
    let mut threshold = pressure_threshold();
    threshold.minimum_duration_minutes = None;
    let ev = Arc::new(evaluator(vec![threshold]));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let ev = ev.clone();
            std::thread::spawn(move || raised(&ev, 95.0, i))
        })
        .collect();
    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 1);
}

#[test]
fn clear_waits_for_the_raise_to_be_persisted() {
    use std::sync::{Barrier, Mutex};
    use std::time::Duration as StdDuration;

    let mut threshold = pressure_threshold();
    threshold.minimum_duration_minutes = None;
    let ev = Arc::new(evaluator(vec![threshold]));
    let persisted: Arc<Mutex<Vec<TransitionKind>>> = Arc::default();
    let barrier = Arc::new(Barrier::new(2));

    let raise = {
        let (ev, persisted, barrier) = (ev.clone(), persisted.clone(), barrier.clone());
        std::thread::spawn(move || {
            barrier.wait();
            ev.evaluate_sample_with("SEP-01", "pressure", 95.0, at(0), |t| {
                // slow write: the clearing sample arrives meanwhile
                std::thread::sleep(StdDuration::from_millis(50));
                persisted.lock().unwrap().push(t.kind);
                Ok::<(), ()>(())
            })
            .unwrap()
        })
    };
    let clear = {
        let (ev, persisted, barrier) = (ev.clone(), persisted.clone(), barrier.clone());
        std::thread::spawn(move || {
            barrier.wait();
            std::thread::sleep(StdDuration::from_millis(10));
            ev.evaluate_sample_with("SEP-01", "pressure", 60.0, at(1), |t| {
                persisted.lock().unwrap().push(t.kind);
                Ok::<(), ()>(())
            })
            .unwrap()
        })
    };
    raise.join().unwrap();
    clear.join().unwrap();

    let persisted = persisted.lock().unwrap().clone();
    assert_eq!(persisted, vec![TransitionKind::Raised, TransitionKind::Cleared]);
    assert_eq!(ev.pair_phase("SEP-01", "thr-sep-pressure"), Some(PairPhase::Clear));
}

#[test]
fn failed_persist_rolls_the_pair_back() {
    let mut threshold = pressure_threshold();
    threshold.minimum_duration_minutes = None;
    let ev = evaluator(vec![threshold]);

    let err = ev
        .evaluate_sample_with("SEP-01", "pressure", 95.0, at(0), |_| Err("disk full"))
        .unwrap_err();
    assert_eq!(err, "disk full");
    assert_eq!(ev.pair_phase("SEP-01", "thr-sep-pressure"), Some(PairPhase::Clear));

    // the same breach is raised again once storage recovers
    assert_eq!(raised(&ev, 95.0, 0), 1);
}
