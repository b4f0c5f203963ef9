use chrono::{SecondsFormat, Utc};
use pingboard_model::{BoardFile, BoardRow, HostRecord, RunSnapshot};
use pingboard_monitor::Reporter;

const HEADERS: [&str; 6] = ["Host Name", "IP Address", "time", "ttl", "Progress", "Failed"];

fn cells(host: &HostRecord, row: Option<&RunSnapshot>) -> [String; 6] {
    match row {
        Some(snapshot) => [
            host.host_name.clone(),
            snapshot.address.clone(),
            snapshot.latency.clone(),
            snapshot.ttl.clone(),
            snapshot.progress.clone(),
            snapshot.failed.clone(),
        ],
        None => [
            host.host_name.clone(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        ],
    }
}

/// Plain-text table, one line per host in index order.
pub fn render_board(hosts: &[HostRecord], rows: &[Option<RunSnapshot>]) -> String {
    let table: Vec<[String; 6]> = hosts
        .iter()
        .map(|host| cells(host, rows.get(host.index).and_then(Option::as_ref)))
        .collect();

    let mut widths = HEADERS.map(str::len);
    for line in &table {
        for (width, cell) in widths.iter_mut().zip(line.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(table.len() + 2);
    lines.push(format_line(&HEADERS.map(str::to_string), &widths));
    lines.push(
        widths
            .iter()
            .map(|width| "-".repeat(*width))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    for line in &table {
        lines.push(format_line(line, &widths));
    }

    lines.join("\n")
}

fn format_line(cells: &[String; 6], widths: &[usize; 6]) -> String {
    cells
        .iter()
        .zip(widths.iter())
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join(" | ")
        .trim_end()
        .to_string()
}

pub fn progress_line(host: &HostRecord, snapshot: &RunSnapshot) -> String {
    let mut line = format!(
        "[{}] {} {}",
        snapshot.progress, host.host_name, snapshot.address
    );
    if !snapshot.latency.is_empty() {
        line.push_str(&format!(" time {}", snapshot.latency));
    }
    if !snapshot.ttl.is_empty() {
        line.push_str(&format!(" ttl {}", snapshot.ttl));
    }
    if !snapshot.failed.is_empty() {
        line.push_str(&format!(" failed {}", snapshot.failed));
    }
    line
}

pub fn status_line(reporter: &Reporter) -> String {
    let run = match reporter.current_run() {
        Some(run_id) => run_id,
        None => return "idle | r refresh  q quit".to_string(),
    };
    if reporter.is_complete() {
        format!("run {run} complete | r refresh  q quit")
    } else {
        let pending = reporter.pending().count();
        format!("run {run}: {pending} host(s) probing | f force refresh  q quit")
    }
}

pub fn board_file(hosts: &[HostRecord], reporter: &Reporter, click_target: u32) -> BoardFile {
    BoardFile {
        version: 1,
        finished_at_utc: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        click_target,
        complete: reporter.is_complete(),
        rows: hosts
            .iter()
            .map(|host| BoardRow {
                host_name: host.host_name.clone(),
                index: host.index,
                snapshot: reporter.row(host.index).cloned(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingboard_model::{ProgressEvent, UNKNOWN_ADDRESS};

    fn finished_example() -> RunSnapshot {
        RunSnapshot {
            address: "93.184.216.34".to_string(),
            latency: "11 ms (10 ms - 12 ms)".to_string(),
            ttl: "55 (55 - 56)".to_string(),
            progress: "4/4".to_string(),
            failed: "1 (25%)".to_string(),
            finished: true,
        }
    }

    #[test]
    fn board_has_header_and_one_line_per_host() {
        let hosts = HostRecord::from_names(["example", "pending.host"], 4);
        let rows = vec![Some(finished_example()), None];
        let output = render_board(&hosts, &rows);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Host Name"));
        assert!(lines[0].contains("IP Address"));
        assert!(lines[2].contains("11 ms (10 ms - 12 ms)"));
        assert!(lines[2].contains("1 (25%)"));
        assert!(lines[3].starts_with("pending.host"));
        assert!(!lines[3].contains("/4"));
        assert!(!output.contains("\x1b"));
    }

    #[test]
    fn progress_line_skips_empty_columns() {
        let host = HostRecord::new("down", 0, 5);
        let snapshot = RunSnapshot {
            address: UNKNOWN_ADDRESS.to_string(),
            latency: String::new(),
            ttl: String::new(),
            progress: "5/5".to_string(),
            failed: "5 (100%)".to_string(),
            finished: true,
        };
        assert_eq!(
            progress_line(&host, &snapshot),
            "[5/5] down Unknown failed 5 (100%)"
        );
    }

    #[test]
    fn board_file_reflects_reporter_rows() {
        let hosts = HostRecord::from_names(["example"], 4);
        let mut reporter = Reporter::new(1);
        reporter.apply(ProgressEvent {
            run_id: 1,
            host_index: 0,
            snapshot: finished_example(),
        });

        let board = board_file(&hosts, &reporter, 4);
        assert!(board.complete);
        assert_eq!(board.rows[0].snapshot, Some(finished_example()));
        assert_eq!(status_line(&reporter), "run 1 complete | r refresh  q quit");
    }
}
