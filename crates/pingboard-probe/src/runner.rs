use anyhow::{anyhow, Context, Result};
use std::process::Command;

#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub timeout_ms: u64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self { timeout_ms: 1000 }
    }
}

impl ProbeSettings {
    /// `ping` only accepts whole seconds for its reply deadline.
    pub fn timeout_secs(&self) -> u64 {
        ((self.timeout_ms + 999) / 1000).max(1)
    }
}

/// Produces the raw text of one single-packet echo exchange.
pub trait PingRunner: Send + Sync {
    fn run(&self, host: &str, settings: &ProbeSettings) -> Result<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPingRunner;

impl PingRunner for SystemPingRunner {
    fn run(&self, host: &str, settings: &ProbeSettings) -> Result<String> {
        run_ping(host, settings)
    }
}

fn timeout_flag() -> &'static str {
    if cfg!(any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd"
    )) {
        "-t"
    } else {
        "-W"
    }
}

pub fn run_ping(host: &str, settings: &ProbeSettings) -> Result<String> {
    let output = Command::new("ping")
        .arg("-n")
        .arg("-c")
        .arg("1")
        .arg(timeout_flag())
        .arg(settings.timeout_secs().to_string())
        .arg(host)
        .output()
        .with_context(|| format!("failed to spawn ping for {host}"))?;

    if !output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "ping failed for {host} (status: {}): {}{}",
            output.status,
            stderr.trim(),
            stdout.trim()
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
