use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::backup::safe_name;

/// `{host}_apply_log_{timestamp}.txt`
pub fn log_filename(host: &str, timestamp: i64) -> String {
    format!("{}_apply_log_{}.txt", safe_name(host), timestamp)
}

/// Lines sent (or that would have been), the device result, and the
/// error if the run failed.
pub fn format_log(lines: &[String], result: &str, error: Option<&str>) -> String {
    let mut out = String::from("--- Config applied (or dry-run) ---\n");
    for line in lines {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("\n--- Result ---\n");
    out.push_str(result);
    if let Some(error) = error {
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("\n--- Error ---\n");
        out.push_str(error);
        out.push('\n');
    }
    out
}

pub async fn write_log(
    dir: &Path,
    host: &str,
    timestamp: i64,
    lines: &[String],
    result: &str,
    error: Option<&str>,
) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let path = dir.join(log_filename(host, timestamp));
    tokio::fs::write(&path, format_log(lines, result, error))
        .await
        .with_context(|| format!("Failed to write log file {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_filename() {
        assert_eq!(log_filename("10.1.1.1", 99), "10.1.1.1_apply_log_99.txt");
    }

    #[test]
    fn test_format_log_success() {
        let lines = vec!["hostname xr1".to_string(), "commit".to_string()];
        assert_eq!(
            format_log(&lines, "DRY_RUN", None),
            "--- Config applied (or dry-run) ---\nhostname xr1\ncommit\n\n--- Result ---\nDRY_RUN"
        );
    }

    #[test]
    fn test_format_log_with_error() {
        let log = format_log(&[], "", Some("Commit failed:\n% Failed to commit"));
        assert!(log.ends_with("\n--- Error ---\nCommit failed:\n% Failed to commit\n"));
    }

    #[tokio::test]
    async fn test_write_log() {
        let tmp = tempfile::tempdir().unwrap();
        let lines = vec!["interface Loopback0".to_string()];
        let path = write_log(tmp.path(), "xr1", 7, &lines, "ok", None)
            .await
            .unwrap();
        assert_eq!(path, tmp.path().join("xr1_apply_log_7.txt"));
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("interface Loopback0\n"));
        assert!(body.ends_with("--- Result ---\nok"));
    }
}
