use chrono::{DateTime, Duration, Utc};
use prodgap_common::types::KpiThreshold;
use serde::Serialize;

/// Which configured limit a value crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bound {
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Breach {
    pub bound: Bound,
    pub limit: f64,
}

/// Returns the crossed limit, checking the upper limit first.
pub fn breach_of(threshold: &KpiThreshold, value: f64) -> Option<Breach> {
    if let Some(upper) = threshold.upper_limit {
        if value > upper {
            return Some(Breach {
                bound: Bound::Upper,
                limit: upper,
            });
        }
    }
    if let Some(lower) = threshold.lower_limit {
        if value < lower {
            return Some(Breach {
                bound: Bound::Lower,
                limit: lower,
            });
        }
    }
    None
}

/// Whether an alerted value is back inside every configured limit by the
/// hysteresis band (`|limit| * hysteresis% / 100`).
///
/// With no hysteresis the value only has to be back within bounds.
pub fn has_recovered(threshold: &KpiThreshold, value: f64) -> bool {
    let pct = threshold.hysteresis_percentage.unwrap_or(0.0).max(0.0);
    let band = |limit: f64| limit.abs() * pct / 100.0;

    let upper_ok = threshold.upper_limit.map_or(true, |upper| {
        let b = band(upper);
        if b > 0.0 {
            value < upper - b
        } else {
            value <= upper
        }
    });
    let lower_ok = threshold.lower_limit.map_or(true, |lower| {
        let b = band(lower);
        if b > 0.0 {
            value > lower + b
        } else {
            value >= lower
        }
    });
    upper_ok && lower_ok
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum PairPhase {
    #[default]
    Clear,
    /// Out of bounds since `since`, alert not yet raised.
    Breaching { since: DateTime<Utc> },
    /// An alert is open for this pair.
    Alerted {
        since: DateTime<Utc>,
        alert_id: String,
    },
}

impl PairPhase {
    pub fn name(&self) -> &'static str {
        match self {
            PairPhase::Clear => "clear",
            PairPhase::Breaching { .. } => "breaching",
            PairPhase::Alerted { .. } => "alerted",
        }
    }
}

/// Outcome of feeding one sample into a pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Nothing to report.
    Hold,
    /// The sample is older than the last one applied.
    Stale,
    Raise { alert_id: String, breach: Breach },
    Clear { alert_id: String },
}

#[derive(Debug, Clone, Default)]
pub struct PairState {
    pub phase: PairPhase,
    pub last_sample_at: Option<DateTime<Utc>>,
}

impl PairState {
    /// Resumes a pair whose alert was raised before a restart.
    pub fn alerted(alert_id: impl Into<String>, since: DateTime<Utc>) -> Self {
        Self {
            phase: PairPhase::Alerted {
                since,
                alert_id: alert_id.into(),
            },
            last_sample_at: None,
        }
    }

    /// Advances the state machine by one sample.
    ///
    /// `new_alert_id` is only called when an alert is raised.
    pub fn apply(
        &mut self,
        threshold: &KpiThreshold,
        value: f64,
        at: DateTime<Utc>,
        new_alert_id: impl FnOnce() -> String,
    ) -> Step {
        if self.last_sample_at.is_some_and(|last| at < last) {
            return Step::Stale;
        }
        self.last_sample_at = Some(at);

        let min_duration = Duration::minutes(threshold.minimum_duration_minutes.unwrap_or(0).max(0));
        let breach = breach_of(threshold, value);

        match (&self.phase, breach) {
            (PairPhase::Clear, None) => Step::Hold,
            (PairPhase::Clear, Some(breach)) => {
                if min_duration <= Duration::zero() {
                    self.raise(at, breach, new_alert_id)
                } else {
                    self.phase = PairPhase::Breaching { since: at };
                    Step::Hold
                }
            }
            (PairPhase::Breaching { .. }, None) => {
                self.phase = PairPhase::Clear;
                Step::Hold
            }
            (PairPhase::Breaching { since }, Some(breach)) => {
                if at - *since >= min_duration {
                    self.raise(at, breach, new_alert_id)
                } else {
                    Step::Hold
                }
            }
            (PairPhase::Alerted { alert_id, .. }, _) => {
                if breach.is_none() && has_recovered(threshold, value) {
                    let alert_id = alert_id.clone();
                    self.phase = PairPhase::Clear;
                    Step::Clear { alert_id }
                } else {
                    Step::Hold
                }
            }
        }
    }

    fn raise(
        &mut self,
        at: DateTime<Utc>,
        breach: Breach,
        new_alert_id: impl FnOnce() -> String,
    ) -> Step {
        let alert_id = new_alert_id();
        self.phase = PairPhase::Alerted {
            since: at,
            alert_id: alert_id.clone(),
        };
        Step::Raise { alert_id, breach }
    }
}
