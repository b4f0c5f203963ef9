use crate::parser::parse_ping_reply;
use crate::runner::{PingRunner, ProbeSettings};
use pingboard_model::ProbeOutcome;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, warn};

/// Runs one timed echo probe and classifies it. Never returns an error:
/// spawn failures, timeouts, unparseable output and a panicking runner all
/// become `ProbeOutcome::Failure`.
#[derive(Debug, Clone)]
pub struct ProbeExecutor<R> {
    runner: R,
    settings: ProbeSettings,
}

impl<R: PingRunner> ProbeExecutor<R> {
    pub fn new(runner: R, settings: ProbeSettings) -> Self {
        Self { runner, settings }
    }

    pub fn probe(&self, host: &str) -> ProbeOutcome {
        if !is_probeable(host) {
            warn!(host, "host name cannot be probed");
            return ProbeOutcome::Failure;
        }

        let ran = panic::catch_unwind(AssertUnwindSafe(|| self.runner.run(host, &self.settings)));
        let raw = match ran {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => {
                debug!(host, error = %err, "probe failed");
                return ProbeOutcome::Failure;
            }
            Err(payload) => {
                warn!(host, reason = %panic_message(payload.as_ref()), "ping runner panicked");
                return ProbeOutcome::Failure;
            }
        };

        match parse_ping_reply(&raw) {
            Ok(reply) => ProbeOutcome::Success {
                ip: reply.ip,
                ttl: reply.ttl,
                rtt_ms: reply.rtt_ms,
            },
            Err(err) => {
                debug!(host, error = %err, "unparseable ping output");
                ProbeOutcome::Failure
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

// A leading '-' would be read by ping as an option.
fn is_probeable(host: &str) -> bool {
    !host.is_empty() && !host.starts_with('-') && !host.chars().any(char::is_whitespace)
}
