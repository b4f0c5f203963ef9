use crate::series::HostProbeSeries;
use crate::MonitorSettings;
use anyhow::{ensure, Context, Result};
use parking_lot::{Condvar, Mutex};
use pingboard_model::{HostRecord, ProgressEvent, RunId, RunSnapshot};
use pingboard_probe::{PingRunner, ProbeExecutor};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Running,
    Completing,
}

#[derive(Debug)]
struct Status {
    state: CoordinatorState,
    current_run: Option<RunId>,
    next_run_id: RunId,
}

#[derive(Debug)]
struct Shared {
    status: Mutex<Status>,
    idle: Condvar,
}

impl Shared {
    /// Called by the worker that finished last. Runs that were superseded
    /// in the meantime leave the status untouched.
    fn finish_run(&self, run_id: RunId) {
        let mut status = self.status.lock();
        if status.current_run != Some(run_id) || status.state != CoordinatorState::Running {
            debug!(run_id, "ignoring completion of superseded run");
            return;
        }
        // Completing only exists while the lock is held; observers see Running then Idle.
        status.state = CoordinatorState::Completing;
        info!(run_id, state = ?status.state, "run complete");
        status.state = CoordinatorState::Idle;
        self.idle.notify_all();
    }

    /// Drops a run whose workers could not all be started. Workers that did
    /// start keep going, but their completion no longer changes the state.
    fn abandon_run(&self, run_id: RunId) {
        let mut status = self.status.lock();
        if status.current_run == Some(run_id) && status.state == CoordinatorState::Running {
            warn!(run_id, "run abandoned before all workers started");
            status.state = CoordinatorState::Idle;
            self.idle.notify_all();
        }
    }
}

#[derive(Debug)]
struct RunTracker {
    id: RunId,
    remaining: AtomicUsize,
}

/// Launches one worker thread per host on every refresh and publishes a
/// [`ProgressEvent`] after each recorded probe.
///
/// A refresh issued while a run is still in flight supersedes it: every
/// series is reset to the new run id and outcomes still arriving from the
/// old run are dropped by [`HostProbeSeries::apply`].
pub struct ProbeCoordinator<R> {
    series: Vec<Arc<HostProbeSeries>>,
    executor: Arc<ProbeExecutor<R>>,
    sender: Sender<ProgressEvent>,
    shared: Arc<Shared>,
}

impl<R: PingRunner + 'static> ProbeCoordinator<R> {
    pub fn new(
        hosts: Vec<HostRecord>,
        settings: &MonitorSettings,
        runner: R,
        sender: Sender<ProgressEvent>,
    ) -> Result<Self> {
        ensure!(
            settings.click_target > 0,
            "probe count per host must be at least 1"
        );
        for (position, host) in hosts.iter().enumerate() {
            ensure!(
                host.index == position,
                "host {} has index {} but sits at position {position}",
                host.host_name,
                host.index
            );
            ensure!(
                host.click_target == settings.click_target,
                "host {} expects {} probes, coordinator runs {}",
                host.host_name,
                host.click_target,
                settings.click_target
            );
        }

        Ok(Self {
            series: hosts
                .into_iter()
                .map(|host| Arc::new(HostProbeSeries::new(host)))
                .collect(),
            executor: Arc::new(ProbeExecutor::new(runner, settings.probe.clone())),
            sender,
            shared: Arc::new(Shared {
                status: Mutex::new(Status {
                    state: CoordinatorState::Idle,
                    current_run: None,
                    next_run_id: 1,
                }),
                idle: Condvar::new(),
            }),
        })
    }

    /// Resets every series and starts a new run, superseding any run in flight.
    pub fn refresh(&self) -> Result<RunId> {
        let run = {
            let mut status = self.shared.status.lock();
            let run_id = status.next_run_id;
            status.next_run_id += 1;

            if let (CoordinatorState::Running, Some(previous)) = (status.state, status.current_run)
            {
                info!(previous, run_id, "superseding in-flight run");
            }

            for series in &self.series {
                series.reset(run_id);
            }
            status.current_run = Some(run_id);

            if self.series.is_empty() {
                status.state = CoordinatorState::Idle;
                self.shared.idle.notify_all();
                return Ok(run_id);
            }
            status.state = CoordinatorState::Running;

            Arc::new(RunTracker {
                id: run_id,
                remaining: AtomicUsize::new(self.series.len()),
            })
        };

        info!(run_id = run.id, hosts = self.series.len(), "starting run");

        for series in &self.series {
            let worker = Worker {
                series: Arc::clone(series),
                executor: Arc::clone(&self.executor),
                sender: self.sender.clone(),
                shared: Arc::clone(&self.shared),
                run: Arc::clone(&run),
            };
            let spawned = thread::Builder::new()
                .name(format!("probe-{}", series.record().index))
                .spawn(move || worker.run())
                .with_context(|| {
                    format!(
                        "failed to spawn probe worker for {}",
                        series.record().host_name
                    )
                });
            if let Err(err) = spawned {
                self.shared.abandon_run(run.id);
                return Err(err);
            }
        }

        Ok(run.id)
    }

    pub fn state(&self) -> CoordinatorState {
        self.shared.status.lock().state
    }

    pub fn current_run(&self) -> Option<RunId> {
        self.shared.status.lock().current_run
    }

    /// Blocks until no run is in flight or `timeout` elapses. Returns whether idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut status = self.shared.status.lock();
        while status.state != CoordinatorState::Idle {
            if self.shared.idle.wait_until(&mut status, deadline).timed_out() {
                return status.state == CoordinatorState::Idle;
            }
        }
        true
    }

    pub fn series(&self, index: usize) -> Option<&HostProbeSeries> {
        self.series.get(index).map(|series| series.as_ref())
    }

    pub fn snapshots(&self) -> Vec<RunSnapshot> {
        self.series.iter().map(|series| series.snapshot()).collect()
    }
}

struct Worker<R> {
    series: Arc<HostProbeSeries>,
    executor: Arc<ProbeExecutor<R>>,
    sender: Sender<ProgressEvent>,
    shared: Arc<Shared>,
    run: Arc<RunTracker>,
}

impl<R: PingRunner> Worker<R> {
    fn run(self) {
        let record = self.series.record();

        for attempt in 0..record.click_target {
            if self.series.run_id() != self.run.id {
                debug!(host = %record.host_name, run_id = self.run.id, attempt, "run superseded");
                return;
            }

            let outcome = self.executor.probe(&record.host_name);

            let Some(snapshot) = self.series.apply(self.run.id, outcome) else {
                debug!(host = %record.host_name, run_id = self.run.id, "discarding stale outcome");
                return;
            };

            let event = ProgressEvent {
                run_id: self.run.id,
                host_index: record.index,
                snapshot,
            };
            if self.sender.send(event).is_err() {
                trace!(host = %record.host_name, "progress receiver dropped");
            }
        }

        if self.run.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.shared.finish_run(self.run.id);
        }
    }
}
