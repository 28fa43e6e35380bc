use crate::state::{Bound, Breach, PairPhase, PairState, Step};
use chrono::{DateTime, Utc};
use prodgap_common::types::{AlertStatus, AlertType, KpiThreshold, PerformanceAlert, Severity};
use serde::Serialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

/// Key: (entity_id, threshold_id)
type PairKey = (String, String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Raised,
    Cleared,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertTransition {
    pub kind: TransitionKind,
    pub entity_id: String,
    pub threshold_id: String,
    pub kpi_name: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    /// The raised alert's id, or the open alert being cleared.
    pub alert_id: Option<String>,
    /// Present on `Raised`; the record to persist.
    #[serde(skip)]
    pub alert: Option<PerformanceAlert>,
}

/// A threshold that matched a sample but could not be evaluated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedThreshold {
    pub threshold_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvaluationOutcome {
    pub transitions: Vec<AlertTransition>,
    pub skipped: Vec<SkippedThreshold>,
}

impl EvaluationOutcome {
    pub fn merge(&mut self, other: EvaluationOutcome) {
        self.transitions.extend(other.transitions);
        self.skipped.extend(other.skipped);
    }
}

/// Evaluates samples against the registered thresholds.
///
/// Each (entity, threshold) pair has its own lock: concurrent samples for the
/// same pair are serialised, different pairs never contend beyond the short
/// lookup in the pair table.
pub struct ThresholdEvaluator {
    thresholds: RwLock<Vec<KpiThreshold>>,
    pairs: Mutex<HashMap<PairKey, Arc<Mutex<PairState>>>>,
}

impl ThresholdEvaluator {
    pub fn new(thresholds: Vec<KpiThreshold>) -> Self {
        Self {
            thresholds: RwLock::new(thresholds),
            pairs: Mutex::new(HashMap::new()),
        }
    }

    pub fn thresholds(&self) -> Vec<KpiThreshold> {
        self.thresholds
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn threshold_count(&self) -> usize {
        self.thresholds
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Adds a threshold or replaces the one with the same id.
    pub fn upsert_threshold(&self, threshold: KpiThreshold) {
        let mut thresholds = self
            .thresholds
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match thresholds.iter_mut().find(|t| t.id == threshold.id) {
            Some(existing) => *existing = threshold,
            None => thresholds.push(threshold),
        }
    }

    /// Removes a threshold and forgets every pair state built on it.
    pub fn remove_threshold(&self, id: &str) -> bool {
        let removed = {
            let mut thresholds = self
                .thresholds
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let before = thresholds.len();
            thresholds.retain(|t| t.id != id);
            thresholds.len() < before
        };
        if removed {
            self.lock_pairs().retain(|(_, threshold_id), _| threshold_id != id);
        }
        removed
    }

    /// Marks a pair as alerted, e.g. from open alerts found at startup, so a
    /// later recovery clears that alert instead of raising a duplicate.
    pub fn restore_open_alert(
        &self,
        entity_id: &str,
        threshold_id: &str,
        alert_id: &str,
        since: DateTime<Utc>,
    ) {
        self.lock_pairs().insert(
            (entity_id.to_string(), threshold_id.to_string()),
            Arc::new(Mutex::new(PairState::alerted(alert_id, since))),
        );
    }

    pub fn pair_phase(&self, entity_id: &str, threshold_id: &str) -> Option<PairPhase> {
        let pair = self
            .lock_pairs()
            .get(&(entity_id.to_string(), threshold_id.to_string()))
            .cloned()?;
        let state = pair.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(state.phase.clone())
    }

    /// Feeds one measurement into every matching threshold.
    ///
    /// Thresholds that are inactive or outside their effective window at
    /// `timestamp` are ignored. Thresholds with neither limit are reported in
    /// [`EvaluationOutcome::skipped`].
    pub fn evaluate_sample(
        &self,
        entity_id: &str,
        kpi_name: &str,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> EvaluationOutcome {
        match self.evaluate_sample_with(entity_id, kpi_name, value, timestamp, |_| {
            Ok::<(), Infallible>(())
        }) {
            Ok(outcome) => outcome,
            Err(never) => match never {},
        }
    }

    /// Like [`evaluate_sample`](Self::evaluate_sample), but hands every
    /// transition to `persist` while the pair lock is still held.
    ///
    /// A later sample for the same pair cannot observe the new state before
    /// `persist` returns. If `persist` fails the pair is rolled back to its
    /// previous state and the error is returned; transitions of pairs
    /// evaluated before the failure stay applied.
    pub fn evaluate_sample_with<E>(
        &self,
        entity_id: &str,
        kpi_name: &str,
        value: f64,
        timestamp: DateTime<Utc>,
        mut persist: impl FnMut(&AlertTransition) -> Result<(), E>,
    ) -> Result<EvaluationOutcome, E> {
        let candidates: Vec<KpiThreshold> = self
            .thresholds
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|t| t.scope.entity_id() == entity_id && t.kpi_name == kpi_name)
            .filter(|t| t.is_effective_at(timestamp))
            .cloned()
            .collect();

        let mut outcome = EvaluationOutcome::default();
        for threshold in &candidates {
            if !threshold.has_limits() {
                tracing::warn!(
                    threshold_id = %threshold.id,
                    entity_id,
                    kpi_name,
                    "Threshold has neither upper nor lower limit, skipping"
                );
                outcome.skipped.push(SkippedThreshold {
                    threshold_id: threshold.id.clone(),
                    reason: "threshold has neither upper nor lower limit".to_string(),
                });
                continue;
            }

            let pair = self.pair(entity_id, &threshold.id);
            let mut state = pair.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            let previous = state.clone();
            let step = state.apply(threshold, value, timestamp, prodgap_common::id::alert_id);

            let transition = match step {
                Step::Hold => None,
                Step::Stale => {
                    tracing::warn!(
                        threshold_id = %threshold.id,
                        entity_id,
                        %timestamp,
                        "Ignoring sample older than the last one evaluated"
                    );
                    None
                }
                Step::Raise { alert_id, breach } => {
                    let alert = build_alert(threshold, value, breach, timestamp, &alert_id);
                    Some(AlertTransition {
                        kind: TransitionKind::Raised,
                        entity_id: entity_id.to_string(),
                        threshold_id: threshold.id.clone(),
                        kpi_name: kpi_name.to_string(),
                        value,
                        timestamp,
                        alert_id: Some(alert_id),
                        alert: Some(alert),
                    })
                }
                Step::Clear { alert_id } => Some(AlertTransition {
                    kind: TransitionKind::Cleared,
                    entity_id: entity_id.to_string(),
                    threshold_id: threshold.id.clone(),
                    kpi_name: kpi_name.to_string(),
                    value,
                    timestamp,
                    alert_id: Some(alert_id),
                    alert: None,
                }),
            };

            let Some(transition) = transition else {
                continue;
            };
            if let Err(e) = persist(&transition) {
                *state = previous;
                return Err(e);
            }
            drop(state);

            tracing::info!(
                threshold_id = %threshold.id,
                entity_id,
                kpi_name,
                value,
                alert_id = transition.alert_id.as_deref().unwrap_or_default(),
                kind = ?transition.kind,
                "Threshold alert transition"
            );
            outcome.transitions.push(transition);
        }
        Ok(outcome)
    }

    fn pair(&self, entity_id: &str, threshold_id: &str) -> Arc<Mutex<PairState>> {
        self.lock_pairs()
            .entry((entity_id.to_string(), threshold_id.to_string()))
            .or_default()
            .clone()
    }

    fn lock_pairs(&self) -> MutexGuard<'_, HashMap<PairKey, Arc<Mutex<PairState>>>> {
        self.pairs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn build_alert(
    threshold: &KpiThreshold,
    value: f64,
    breach: Breach,
    at: DateTime<Utc>,
    alert_id: &str,
) -> PerformanceAlert {
    let unit = threshold.measurement_unit.clone().unwrap_or_default();
    let (side, direction) = match breach.bound {
        Bound::Upper => ("upper", "above"),
        Bound::Lower => ("lower", "below"),
    };
    let recommendation = threshold.target_value.map(|target| {
        format!(
            "Bring {} back towards its target of {target}{unit}",
            threshold.kpi_name
        )
    });

    PerformanceAlert {
        id: alert_id.to_string(),
        equipment_id: threshold.scope.equipment_id().map(str::to_string),
        facility_id: threshold.scope.facility_id().map(str::to_string),
        well_id: threshold.scope.well_id().map(str::to_string),
        alert_type: AlertType::ThresholdBreach,
        severity: threshold.alert_severity,
        priority: threshold.alert_severity.default_priority(),
        title: format!("{}: {side} limit breached", threshold.threshold_name),
        description: format!(
            "{} measured {value}{unit}, {direction} the {side} limit of {}{unit}",
            threshold.kpi_name, breach.limit
        ),
        recommendation,
        status: AlertStatus::New,
        alert_timestamp: at,
        acknowledged_at: None,
        resolved_at: None,
        threshold_id: Some(threshold.id.clone()),
        measured_value: Some(value),
        threshold_value: Some(breach.limit),
        measurement_unit: threshold.measurement_unit.clone(),
        production_impact_bpd: None,
        estimated_downtime_hours: None,
        safety_critical: threshold.alert_severity == Severity::Emergency,
        acknowledged_by: None,
        resolved_by: None,
        resolution_notes: None,
        created_at: at,
        updated_at: at,
    }
}
