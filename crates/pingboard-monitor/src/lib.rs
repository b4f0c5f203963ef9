//! Parallel probe runs across many hosts and their aggregation.

pub mod coordinator;
pub mod hosts;
pub mod reporter;
pub mod series;

pub use coordinator::{CoordinatorState, ProbeCoordinator};
pub use hosts::{load_hosts, parse_hosts};
pub use reporter::{ReportOutcome, Reporter};
pub use series::{HostProbeSeries, SeriesState};

use pingboard_probe::ProbeSettings;

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Probes issued per host in every run.
    pub click_target: u32,
    pub probe: ProbeSettings,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            click_target: 10,
            probe: ProbeSettings::default(),
        }
    }
}
