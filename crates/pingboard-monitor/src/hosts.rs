use anyhow::{Context, Result};
use pingboard_model::HostRecord;
use std::fs;
use std::path::Path;

/// One host per line. Blank lines and `#` comments are skipped; the order of
/// the remaining lines becomes each host's index.
pub fn parse_hosts(text: &str, click_target: u32) -> Vec<HostRecord> {
    let names = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'));
    HostRecord::from_names(names, click_target)
}

pub fn load_hosts(path: &Path, click_target: u32) -> Result<Vec<HostRecord>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read hosts file {:?}", path))?;
    Ok(parse_hosts(&contents, click_target))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_newline_adds_no_empty_host() {
        let hosts = parse_hosts("example.com\n10.0.0.1\n", 10);
        let names: Vec<&str> = hosts.iter().map(|h| h.host_name.as_str()).collect();
        assert_eq!(names, vec!["example.com", "10.0.0.1"]);
    }

    #[test]
    fn comments_and_blanks_do_not_consume_indices() {
        let hosts = parse_hosts("# lab\n\n  gateway  \n\nexample.com\r\n", 3);
        assert_eq!(hosts.len(), 2);
        assert_eq!(hosts[0].host_name, "gateway");
        assert_eq!(hosts[0].index, 0);
        assert_eq!(hosts[1].host_name, "example.com");
        assert_eq!(hosts[1].index, 1);
        assert_eq!(hosts[1].click_target, 3);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = load_hosts(Path::new("/nonexistent/pingboard/Hosts"), 10).unwrap_err();
        assert!(err.to_string().contains("Hosts"));
    }
}
