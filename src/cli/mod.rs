//! Command-line arguments and interactive credential prompts.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Apply an IOS-XR configuration file to a device
#[derive(Parser, Debug)]
#[command(name = "iosxr-apply", version, about, long_about = None)]
pub struct Args {
    /// Device IP/hostname
    #[arg(short = 'H', long)]
    pub host: String,

    /// Path to config file to apply
    #[arg(short, long)]
    pub config: PathBuf,

    /// Username (will prompt if omitted)
    #[arg(short, long, env = "IOSXR_USERNAME")]
    pub username: Option<String>,

    /// Password (will prompt if omitted)
    #[arg(short, long, env = "IOSXR_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// SSH port
    #[arg(long, default_value_t = 22)]
    pub port: u16,

    /// Variable substitution in format VAR=value (can be used multiple times)
    #[arg(long = "var", value_name = "NAME=VALUE")]
    pub vars: Vec<String>,

    /// Device hostname, shortcut for --var HOSTNAME=value
    #[arg(long)]
    pub hostname: Option<String>,

    /// Show commands only, do not connect or apply
    #[arg(long)]
    pub dry_run: bool,

    /// Save running-config backup before applying
    #[arg(long)]
    pub backup: bool,

    /// Poll the SSH channel more aggressively
    #[arg(long)]
    pub fast_cli: bool,

    /// Directory for backup and log files [env: IOSXR_OUTPUT_DIR, default: .]
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

/// Username and password, prompting for whichever is missing.
pub fn resolve_credentials(args: &Args) -> Result<(String, String)> {
    let username = match args.username.as_deref().filter(|u| !u.is_empty()) {
        Some(u) => u.to_string(),
        None => prompt_line("Username: ")?,
    };
    let password = match args.password.as_deref().filter(|p| !p.is_empty()) {
        Some(p) => p.to_string(),
        None => rpassword::prompt_password("Password: ").context("Failed to read password")?,
    };
    Ok((username, password))
}

fn prompt_line(prompt: &str) -> Result<String> {
    let mut stdout = io::stdout();
    write!(stdout, "{}", prompt)?;
    stdout.flush()?;

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read username")?;
    Ok(line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_full_surface() {
        let args = Args::try_parse_from([
            "iosxr-apply",
            "-H",
            "10.0.0.1",
            "-c",
            "pe.cfg",
            "-u",
            "admin",
            "-p",
            "secret",
            "--var",
            "ASN=65001",
            "--var",
            "LO=10.255.0.1",
            "--hostname",
            "pe1",
            "--dry-run",
            "--backup",
            "--port",
            "2222",
            "--fast-cli",
        ])
        .unwrap();

        assert_eq!(args.host, "10.0.0.1");
        assert_eq!(args.config, PathBuf::from("pe.cfg"));
        assert_eq!(args.vars, vec!["ASN=65001", "LO=10.255.0.1"]);
        assert_eq!(args.hostname.as_deref(), Some("pe1"));
        assert_eq!(args.port, 2222);
        assert!(args.dry_run && args.backup && args.fast_cli);
    }

    #[test]
    fn test_host_and_config_required() {
        assert!(Args::try_parse_from(["iosxr-apply", "-c", "pe.cfg"]).is_err());
        assert!(Args::try_parse_from(["iosxr-apply", "-H", "10.0.0.1"]).is_err());
    }

    #[test]
    fn test_credentials_from_args_skip_prompt() {
        let args =
            Args::try_parse_from(["iosxr-apply", "-H", "h", "-c", "c", "-u", "ops", "-p", "pw"])
                .unwrap();
        let (user, pass) = resolve_credentials(&args).unwrap();
        assert_eq!((user.as_str(), pass.as_str()), ("ops", "pw"));
    }
}
