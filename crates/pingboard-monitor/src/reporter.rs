use pingboard_model::{ProgressEvent, RunId, RunSnapshot};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    /// Event belonged to an older run or an unknown host.
    Ignored,
    Updated,
    /// Row updated and it was the last unfinished host of the run.
    RunComplete(RunId),
}

/// Folds progress events into per-host rows and signals run completion
/// once per run.
#[derive(Debug, Clone)]
pub struct Reporter {
    rows: Vec<Option<RunSnapshot>>,
    current_run: Option<RunId>,
    pending: BTreeSet<usize>,
    complete: bool,
}

impl Reporter {
    pub fn new(host_count: usize) -> Self {
        Self {
            rows: vec![None; host_count],
            current_run: None,
            pending: BTreeSet::new(),
            complete: false,
        }
    }

    /// Starts tracking `run_id` and clears all rows. Returns `false` if a run
    /// at least as recent is already tracked.
    pub fn begin_run(&mut self, run_id: RunId) -> bool {
        if matches!(self.current_run, Some(current) if current >= run_id) {
            return false;
        }
        if let Some(previous) = self.current_run.filter(|_| !self.complete) {
            debug!(previous, run_id, "dropping rows of superseded run");
        }

        self.current_run = Some(run_id);
        self.rows.iter_mut().for_each(|row| *row = None);
        self.pending = (0..self.rows.len()).collect();
        self.complete = self.pending.is_empty();
        true
    }

    pub fn apply(&mut self, event: ProgressEvent) -> ReportOutcome {
        match self.current_run.map(|current| event.run_id.cmp(&current)) {
            Some(Ordering::Less) => {
                debug!(run_id = event.run_id, host = event.host_index, "ignoring stale event");
                return ReportOutcome::Ignored;
            }
            Some(Ordering::Equal) => {}
            Some(Ordering::Greater) | None => {
                self.begin_run(event.run_id);
            }
        }

        let Some(row) = self.rows.get_mut(event.host_index) else {
            warn!(host = event.host_index, "progress event for unknown host");
            return ReportOutcome::Ignored;
        };

        let finished = event.snapshot.finished;
        *row = Some(event.snapshot);
        if finished {
            self.pending.remove(&event.host_index);
        }

        if self.pending.is_empty() && !self.complete {
            self.complete = true;
            info!(run_id = event.run_id, "all hosts finished");
            return ReportOutcome::RunComplete(event.run_id);
        }
        ReportOutcome::Updated
    }

    pub fn rows(&self) -> &[Option<RunSnapshot>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&RunSnapshot> {
        self.rows.get(index).and_then(Option::as_ref)
    }

    pub fn current_run(&self) -> Option<RunId> {
        self.current_run
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Hosts of the current run that have not finished yet, in index order.
    pub fn pending(&self) -> impl Iterator<Item = usize> + '_ {
        self.pending.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(done: u32, target: u32) -> RunSnapshot {
        RunSnapshot {
            address: "10.0.0.1".to_string(),
            latency: "1 ms (1 ms - 1 ms)".to_string(),
            ttl: "64 (64 - 64)".to_string(),
            progress: format!("{done}/{target}"),
            failed: String::new(),
            finished: done == target,
        }
    }

    fn event(run_id: RunId, host_index: usize, done: u32, target: u32) -> ProgressEvent {
        ProgressEvent {
            run_id,
            host_index,
            snapshot: snapshot(done, target),
        }
    }

    #[test]
    fn completion_fires_once_after_last_host() {
        let mut reporter = Reporter::new(2);
        assert!(reporter.begin_run(1));

        assert_eq!(reporter.apply(event(1, 1, 1, 2)), ReportOutcome::Updated);
        assert_eq!(reporter.apply(event(1, 1, 2, 2)), ReportOutcome::Updated);
        assert_eq!(reporter.pending().collect::<Vec<_>>(), vec![0]);
        assert_eq!(reporter.apply(event(1, 0, 1, 2)), ReportOutcome::Updated);
        assert_eq!(reporter.apply(event(1, 0, 2, 2)), ReportOutcome::RunComplete(1));
        assert!(reporter.is_complete());

        assert_eq!(reporter.apply(event(1, 0, 2, 2)), ReportOutcome::Updated);
    }

    #[test]
    fn stale_events_do_not_touch_the_current_run() {
        let mut reporter = Reporter::new(1);
        reporter.begin_run(1);
        reporter.apply(event(1, 0, 1, 3));

        reporter.begin_run(2);
        assert!(reporter.row(0).is_none());

        assert_eq!(reporter.apply(event(1, 0, 3, 3)), ReportOutcome::Ignored);
        assert!(reporter.row(0).is_none());
        assert!(!reporter.is_complete());

        assert_eq!(reporter.apply(event(2, 0, 3, 3)), ReportOutcome::RunComplete(2));
    }

    #[test]
    fn newer_run_id_starts_tracking_implicitly() {
        let mut reporter = Reporter::new(2);
        assert_eq!(reporter.apply(event(4, 0, 1, 1)), ReportOutcome::Updated);
        assert_eq!(reporter.current_run(), Some(4));
        assert!(!reporter.begin_run(3));
        assert!(!reporter.begin_run(4));
        assert_eq!(reporter.apply(event(4, 1, 1, 1)), ReportOutcome::RunComplete(4));
    }

    #[test]
    fn unknown_host_is_ignored() {
        let mut reporter = Reporter::new(1);
        reporter.begin_run(1);
        assert_eq!(reporter.apply(event(1, 5, 1, 1)), ReportOutcome::Ignored);
        assert!(!reporter.is_complete());
    }
}
