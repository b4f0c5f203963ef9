mod board;
mod watch;

use anyhow::{anyhow, Context, Result};
use board::{board_file, progress_line, render_board};
use clap::{Args, Parser, Subcommand};
use pingboard_model::HostRecord;
use pingboard_monitor::{load_hosts, MonitorSettings, ProbeCoordinator, ReportOutcome, Reporter};
use pingboard_probe::{ProbeSettings, SystemPingRunner};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_HOSTS_FILE: &str = "Hosts";

#[derive(Parser)]
#[command(name = "pingboard", version, about = "Parallel ICMP reachability board")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Probe(ProbeArgs),
    Watch(WatchArgs),
}

#[derive(Args)]
struct HostArgs {
    /// Newline-separated host list (defaults to ./Hosts when no --host is given).
    #[arg(long)]
    hosts: Option<PathBuf>,

    #[arg(long = "host")]
    host_list: Vec<String>,

    /// Echo probes per host in every run.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    count: u32,

    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,
}

impl HostArgs {
    fn settings(&self) -> MonitorSettings {
        MonitorSettings {
            click_target: self.count,
            probe: ProbeSettings {
                timeout_ms: self.timeout_ms,
            },
        }
    }

    fn resolve(&self) -> Result<Vec<HostRecord>> {
        let mut hosts = match &self.hosts {
            Some(path) => load_hosts(path, self.count)?,
            None if self.host_list.is_empty() && Path::new(DEFAULT_HOSTS_FILE).exists() => {
                load_hosts(Path::new(DEFAULT_HOSTS_FILE), self.count)?
            }
            None => Vec::new(),
        };

        for name in &self.host_list {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            let index = hosts.len();
            hosts.push(HostRecord::new(name, index, self.count));
        }

        if hosts.is_empty() {
            return Err(anyhow!("no hosts provided (use --hosts or --host)"));
        }
        Ok(hosts)
    }
}

#[derive(Args)]
#[command(about = "Probe every host and print the board. Only probe hosts you may test.")]
struct ProbeArgs {
    #[command(flatten)]
    hosts: HostArgs,

    /// Print the final board as JSON instead of a table.
    #[arg(long)]
    json: bool,

    #[arg(long, default_value_t = 1)]
    rounds: u32,

    #[arg(long, default_value_t = 0)]
    interval_ms: u64,
}

#[derive(Args)]
#[command(about = "Interactive board: r refreshes, f forces a refresh, q quits")]
struct WatchArgs {
    #[command(flatten)]
    hosts: HostArgs,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Probe(args) => {
            init_tracing("warn");
            run_probe(args)
        }
        Commands::Watch(args) => {
            // stderr output would tear the alternate screen
            init_tracing("off");
            watch::run_watch(&args.hosts)
        }
    }
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run_probe(args: ProbeArgs) -> Result<()> {
    let hosts = args.hosts.resolve()?;
    let settings = args.hosts.settings();

    let (tx, rx) = mpsc::channel();
    let coordinator = ProbeCoordinator::new(hosts.clone(), &settings, SystemPingRunner, tx)?;
    let mut reporter = Reporter::new(hosts.len());

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = Arc::clone(&interrupted);
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .context("failed to install Ctrl-C handler")?;
    }

    for round in 0..args.rounds {
        let run_id = coordinator.refresh()?;
        reporter.begin_run(run_id);

        while !reporter.is_complete() && !interrupted.load(Ordering::SeqCst) {
            let event = match rx.recv_timeout(Duration::from_millis(100)) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            let index = event.host_index;
            if reporter.apply(event) == ReportOutcome::Ignored || args.json {
                continue;
            }
            if let (Some(host), Some(row)) = (hosts.get(index), reporter.row(index)) {
                eprintln!("{}", progress_line(host, row));
            }
        }

        let stopped = interrupted.load(Ordering::SeqCst);
        if stopped {
            warn!(run_id, "interrupted; board is partial");
        }

        if args.json {
            let board = board_file(&hosts, &reporter, settings.click_target);
            println!("{}", serde_json::to_string_pretty(&board)?);
        } else {
            println!("{}", render_board(&hosts, reporter.rows()));
        }

        if stopped {
            break;
        }
        if args.interval_ms > 0 && round + 1 < args.rounds {
            sleep(Duration::from_millis(args.interval_ms));
        }
    }

    Ok(())
}
