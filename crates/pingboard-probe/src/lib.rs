//! Single echo probes: running the system `ping` and parsing its reply.

pub mod executor;
pub mod parser;
pub mod runner;

pub use executor::ProbeExecutor;
pub use parser::{parse_ping_reply, PingReply};
pub use runner::{run_ping, PingRunner, ProbeSettings, SystemPingRunner};
