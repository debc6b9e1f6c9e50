use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Host part of output filenames, safe to use as a path component.
pub fn safe_name(host: &str) -> String {
    host.replace(|c: char| c == '/' || c == '\\', "_")
}

/// `{host}_running_config_backup_{timestamp}.txt`
pub fn backup_filename(host: &str, timestamp: i64) -> String {
    format!("{}_running_config_backup_{}.txt", safe_name(host), timestamp)
}

/// Write the running configuration to the backup file and return its path.
///
/// Runs on the blocking device thread, between fetching the config and
/// sending the first configuration line.
pub fn save_backup(dir: &Path, host: &str, timestamp: i64, config: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create backup directory {}", dir.display()))?;

    let file_path = dir.join(backup_filename(host, timestamp));
    std::fs::write(&file_path, config)
        .with_context(|| format!("Failed to write {}", file_path.display()))?;

    tracing::info!("Backup saved to {} ({} bytes)", file_path.display(), config.len());
    Ok(file_path)
}
