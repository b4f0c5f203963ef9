use parking_lot::Mutex;
use pingboard_model::{HostRecord, ProbeOutcome, RunId, RunSnapshot, UNKNOWN_ADDRESS};

/// Consistent copy of a series' counters and samples.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeriesState {
    pub run_id: RunId,
    pub success_count: u32,
    pub failure_count: u32,
    pub ttl_samples: Vec<u32>,
    pub rtt_samples: Vec<u64>,
    pub resolved_address: Option<String>,
}

impl SeriesState {
    pub fn completed(&self) -> u32 {
        self.success_count + self.failure_count
    }
}

/// One host's probe statistics for the current run.
///
/// Only the host's worker writes to a series, but readers may take
/// [`snapshot`](Self::snapshot) or [`state`](Self::state) at any time; all
/// fields sit behind a single lock so a reader never sees a half-applied probe.
#[derive(Debug)]
pub struct HostProbeSeries {
    record: HostRecord,
    state: Mutex<SeriesState>,
}

impl HostProbeSeries {
    pub fn new(record: HostRecord) -> Self {
        Self {
            record,
            state: Mutex::new(SeriesState::default()),
        }
    }

    pub fn record(&self) -> &HostRecord {
        &self.record
    }

    pub fn run_id(&self) -> RunId {
        self.state.lock().run_id
    }

    /// Clears all counters and samples and makes `run_id` the current run.
    /// Outcomes tagged with any other run are discarded from now on.
    pub fn reset(&self, run_id: RunId) {
        let mut state = self.state.lock();
        *state = SeriesState {
            run_id,
            ..SeriesState::default()
        };
    }

    /// Applies one outcome and returns the snapshot taken right after it.
    ///
    /// Returns `None` when the outcome belongs to a superseded run or the
    /// series already holds `click_target` outcomes.
    pub fn apply(&self, run_id: RunId, outcome: ProbeOutcome) -> Option<RunSnapshot> {
        let mut state = self.state.lock();
        if state.run_id != run_id || state.completed() >= self.record.click_target {
            return None;
        }

        match outcome {
            ProbeOutcome::Success { ip, ttl, rtt_ms } => {
                state.success_count += 1;
                state.ttl_samples.push(ttl);
                state.rtt_samples.push(rtt_ms);
                if state.resolved_address.is_none() {
                    state.resolved_address = Some(ip);
                }
            }
            ProbeOutcome::Failure => state.failure_count += 1,
        }

        Some(summarize(&state, self.record.click_target))
    }

    pub fn record_success(
        &self,
        run_id: RunId,
        ip: impl Into<String>,
        ttl: u32,
        rtt_ms: u64,
    ) -> Option<RunSnapshot> {
        self.apply(
            run_id,
            ProbeOutcome::Success {
                ip: ip.into(),
                ttl,
                rtt_ms,
            },
        )
    }

    pub fn record_failure(&self, run_id: RunId) -> Option<RunSnapshot> {
        self.apply(run_id, ProbeOutcome::Failure)
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().completed() == self.record.click_target
    }

    pub fn snapshot(&self) -> RunSnapshot {
        summarize(&self.state.lock(), self.record.click_target)
    }

    pub fn state(&self) -> SeriesState {
        self.state.lock().clone()
    }
}

fn summarize(state: &SeriesState, click_target: u32) -> RunSnapshot {
    let completed = state.completed();

    let latency = spread(&state.rtt_samples)
        .map(|(mean, min, max)| format!("{mean} ms ({min} ms - {max} ms)"))
        .unwrap_or_default();
    let ttl = spread(&state.ttl_samples)
        .map(|(mean, min, max)| format!("{mean} ({min} - {max})"))
        .unwrap_or_default();

    let failed = if state.failure_count > 0 {
        let percent = u64::from(state.failure_count) * 100 / u64::from(completed);
        format!("{} ({percent}%)", state.failure_count)
    } else {
        String::new()
    };

    RunSnapshot {
        address: state
            .resolved_address
            .clone()
            .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string()),
        latency,
        ttl,
        progress: format!("{completed}/{click_target}"),
        failed,
        finished: completed == click_target,
    }
}

/// Truncated mean, min and max; `None` for no samples.
fn spread<T>(samples: &[T]) -> Option<(u64, u64, u64)>
where
    T: Copy + Into<u64>,
{
    let values = samples.iter().map(|&value| -> u64 { value.into() });
    let min = values.clone().min()?;
    let max = values.clone().max()?;
    // widened so huge samples cannot overflow; the mean always fits back into u64
    let sum: u128 = values.map(u128::from).sum();
    let mean = (sum / samples.len() as u128) as u64;
    Some((mean, min, max))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(click_target: u32) -> HostProbeSeries {
        HostProbeSeries::new(HostRecord::new("example", 0, click_target))
    }

    #[test]
    fn mixed_run_summary() {
        let series = series(4);
        series.reset(1);
        series.record_success(1, "93.184.216.34", 55, 10);
        series.record_failure(1);
        series.record_success(1, "93.184.216.34", 56, 12);
        series.record_success(1, "93.184.216.34", 55, 11);

        let snapshot = series.snapshot();
        assert!(series.is_finished());
        assert_eq!(snapshot.address, "93.184.216.34");
        assert_eq!(snapshot.progress, "4/4");
        assert_eq!(snapshot.failed, "1 (25%)");
        assert_eq!(snapshot.ttl, "55 (55 - 56)");
        assert_eq!(snapshot.latency, "11 ms (10 ms - 12 ms)");
        assert!(snapshot.finished);
    }

    #[test]
    fn all_failures_still_finish() {
        let series = series(5);
        series.reset(1);
        for _ in 0..5 {
            series.record_failure(1);
        }

        let snapshot = series.snapshot();
        assert!(series.is_finished());
        assert_eq!(snapshot.progress, "5/5");
        assert_eq!(snapshot.failed, "5 (100%)");
        assert_eq!(snapshot.latency, "");
        assert_eq!(snapshot.ttl, "");
        assert_eq!(snapshot.address, UNKNOWN_ADDRESS);
    }

    #[test]
    fn first_successful_address_wins() {
        let series = series(3);
        series.reset(1);
        series.record_failure(1);
        series.record_success(1, "10.0.0.1", 64, 1);
        series.record_success(1, "10.0.0.2", 63, 2);

        assert_eq!(series.state().resolved_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(series.snapshot().address, "10.0.0.1");
    }

    #[test]
    fn reset_clears_everything() {
        let series = series(10);
        series.reset(1);
        series.record_success(1, "10.0.0.1", 64, 3);
        series.record_failure(1);

        series.reset(2);
        let snapshot = series.snapshot();
        assert_eq!(snapshot.progress, "0/10");
        assert_eq!(snapshot.failed, "");
        assert_eq!(snapshot.latency, "");
        assert_eq!(snapshot.ttl, "");
        assert_eq!(snapshot.address, UNKNOWN_ADDRESS);
        assert!(!snapshot.finished);
        assert_eq!(
            series.state(),
            SeriesState {
                run_id: 2,
                ..SeriesState::default()
            }
        );
    }

    #[test]
    fn stale_outcome_is_discarded() {
        let series = series(4);
        series.reset(1);
        assert!(series.record_success(1, "10.0.0.1", 64, 5).is_some());

        series.reset(2);
        assert!(series.record_success(1, "10.0.0.9", 60, 99).is_none());
        assert!(series.record_failure(1).is_none());

        assert_eq!(
            series.state(),
            SeriesState {
                run_id: 2,
                ..SeriesState::default()
            }
        );
    }

    #[test]
    fn outcomes_beyond_target_are_dropped() {
        let series = series(2);
        series.reset(1);
        assert!(series.record_failure(1).is_some());
        assert!(series.record_failure(1).is_some());
        assert!(series.record_failure(1).is_none());

        let state = series.state();
        assert_eq!(state.completed(), 2);
    }

    #[test]
    fn huge_samples_do_not_overflow_the_mean() {
        let series = series(2);
        series.reset(1);
        series.record_success(1, "10.0.0.1", 64, u64::MAX);
        series.record_success(1, "10.0.0.1", 64, u64::MAX - 2);

        let max = u64::MAX;
        let min = u64::MAX - 2;
        assert_eq!(
            series.snapshot().latency,
            format!("{} ms ({min} ms - {max} ms)", u64::MAX - 1)
        );
    }

    #[test]
    fn samples_track_success_count() {
        let series = series(6);
        series.reset(7);
        for attempt in 0..6u32 {
            if attempt % 3 == 0 {
                series.record_failure(7);
            } else {
                series.record_success(7, "10.0.0.1", 60 + attempt, u64::from(attempt));
            }
            let state = series.state();
            assert_eq!(state.ttl_samples.len() as u32, state.success_count);
            assert_eq!(state.rtt_samples.len() as u32, state.success_count);
        }
        assert_eq!(series.snapshot().failed, "2 (33%)");
    }
}
