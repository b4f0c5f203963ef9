use anyhow::{anyhow, Result};
use std::net::IpAddr;

/// Upper bound for a reported round-trip time; anything above is a garbled reply.
const MAX_RTT_MS: f64 = u32::MAX as f64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingReply {
    pub ip: String,
    pub ttl: u32,
    pub rtt_ms: u64,
}

/// Parses the output of a single-packet `ping`.
///
/// The peer address comes from the parenthesised address on the `PING` header,
/// falling back to the `from <addr>` part of the reply line. TTL and round-trip
/// time come from the first line carrying `ttl=`; the time is truncated to whole
/// milliseconds.
pub fn parse_ping_reply(text: &str) -> Result<PingReply> {
    let mut header: Option<&str> = None;
    let mut reply: Option<&str> = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if header.is_none() {
            header = Some(line);
            continue;
        }
        if line.to_ascii_lowercase().contains("ttl=") {
            reply = Some(line);
            break;
        }
    }

    let header = header.ok_or_else(|| anyhow!("empty ping output"))?;
    let reply = reply.ok_or_else(|| anyhow!("no echo reply in ping output"))?;

    let ip = parse_header_address(header)
        .or_else(|| parse_reply_address(reply))
        .ok_or_else(|| anyhow!("missing peer address in ping output"))?;

    let mut ttl: Option<u32> = None;
    let mut rtt_ms: Option<u64> = None;

    let tokens: Vec<&str> = reply.split_whitespace().collect();
    for (i, tok) in tokens.iter().enumerate() {
        let lower = tok.to_ascii_lowercase();
        if let Some(value) = lower.strip_prefix("ttl=") {
            ttl = Some(
                value
                    .parse()
                    .map_err(|_| anyhow!("invalid ttl token: {tok}"))?,
            );
        } else if let Some(value) = lower.strip_prefix("time=") {
            rtt_ms = Some(parse_time(value, tokens.get(i + 1).copied())?);
        }
    }

    Ok(PingReply {
        ip,
        ttl: ttl.ok_or_else(|| anyhow!("missing ttl in reply line: {reply}"))?,
        rtt_ms: rtt_ms.ok_or_else(|| anyhow!("missing time in reply line: {reply}"))?,
    })
}

fn parse_header_address(line: &str) -> Option<String> {
    let start = line.find('(')?;
    let end = line[start + 1..].find(')')?;
    as_address(&line[start + 1..start + 1 + end])
}

fn parse_reply_address(line: &str) -> Option<String> {
    let lower = line.to_ascii_lowercase();
    let idx = lower.find(" from ")?;
    let token = line[idx + " from ".len()..]
        .split(|c: char| c.is_whitespace() || c == ':')
        .next()?;
    as_address(token)
}

fn as_address(token: &str) -> Option<String> {
    let trimmed = token.trim();
    trimmed
        .parse::<IpAddr>()
        .ok()
        .map(|_| trimmed.to_string())
}

fn parse_time(value: &str, next: Option<&str>) -> Result<u64> {
    let (number, has_unit) = match value.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (value, matches!(next, Some(unit) if unit.starts_with("ms"))),
    };

    if !has_unit {
        return Err(anyhow!("time is not in milliseconds: {value}"));
    }

    let ms: f64 = number
        .parse()
        .map_err(|_| anyhow!("invalid time token: {value}"))?;
    if !ms.is_finite() || ms < 0.0 {
        return Err(anyhow!("invalid time token: {value}"));
    }
    if ms > MAX_RTT_MS {
        return Err(anyhow!("implausible round-trip time: {value}"));
    }

    Ok(ms.trunc() as u64)
}
