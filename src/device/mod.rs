use std::time::Duration;

use crate::error::ApplyError;

/// Per-phase timeouts for a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub command: Duration,
    pub commit: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(30),
            command: Duration::from_secs(60),
            commit: Duration::from_secs(120),
        }
    }
}

/// Where and how to log in.
#[derive(Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Poll the channel more aggressively and use shorter read deadlines.
    pub fast_cli: bool,
    pub timeouts: Timeouts,
}

impl std::fmt::Debug for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Target")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"********")
            .field("fast_cli", &self.fast_cli)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

/// An open CLI session on an IOS-XR device.
pub trait DeviceSession {
    /// Run an exec-mode command and return its cleaned output.
    fn send_command(&mut self, command: &str) -> Result<String, ApplyError>;

    /// Enter configuration mode and send each line. Stops at the first
    /// line the device rejects and stays in configuration mode.
    fn send_config_set(&mut self, lines: &[String]) -> Result<String, ApplyError>;

    /// Commit the candidate configuration.
    fn commit(&mut self) -> Result<String, ApplyError>;

    /// Discard the candidate configuration and return to exec mode.
    fn abort(&mut self) -> Result<String, ApplyError>;

    /// Leave configuration mode after a successful commit.
    fn exit_config_mode(&mut self) -> Result<String, ApplyError>;

    fn disconnect(&mut self);
}

/// Opens sessions. The SSH implementation lives in `crate::ssh`.
pub trait Connector {
    type Session: DeviceSession + Send + 'static;

    fn connect(&self, target: &Target) -> Result<Self::Session, ApplyError>;
}

/// Output fragments IOS-XR prints when it refuses a line or a commit.
pub const REJECTION_MARKERS: &[&str] = &[
    "% Invalid input detected",
    "% Incomplete command",
    "% Ambiguous command",
    "% Failed to commit",
    "One or more commits have occurred from other configuration sessions",
];

/// Return the first output line carrying a rejection marker.
pub fn find_rejection(output: &str) -> Option<&str> {
    output
        .lines()
        .find(|line| REJECTION_MARKERS.iter().any(|m| line.contains(m)))
        .map(str::trim)
}

/// Strip carriage returns, the echoed command and the trailing prompt.
pub fn clean_output(raw: &str, command: &str) -> String {
    let normalized = raw.replace('\r', "");
    let mut lines: Vec<&str> = normalized.lines().collect();

    if let Some(first) = lines.first() {
        if !command.is_empty() && first.trim_end().ends_with(command.trim()) {
            lines.remove(0);
        }
    }
    if let Some(last) = lines.last() {
        if crate::ssh::is_prompt(last) {
            lines.pop();
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_rejection() {
        let out = "interface Gi0/0/0/0\r\n          ^\r\n% Invalid input detected at '^' marker.\r\nRP/0/RP0/CPU0:xr1(config)#";
        assert_eq!(
            find_rejection(out),
            Some("% Invalid input detected at '^' marker.")
        );
        assert_eq!(find_rejection("RP/0/RP0/CPU0:xr1(config-if)#"), None);
    }

    #[test]
    fn test_find_rejection_commit_conflict() {
        let out = "commit\n% Failed to commit one or more configuration items during a pseudo-atomic operation.";
        assert!(find_rejection(out).unwrap().starts_with("% Failed to commit"));
    }

    #[test]
    fn test_clean_output_strips_echo_and_prompt() {
        let raw = "show running-config\r\nhostname xr1\r\n!\r\nend\r\n\r\nRP/0/RP0/CPU0:xr1#";
        assert_eq!(
            clean_output(raw, "show running-config"),
            "hostname xr1\n!\nend\n"
        );
    }

    #[test]
    fn test_clean_output_keeps_body_without_echo() {
        assert_eq!(clean_output("hostname xr1", "show run"), "hostname xr1");
    }

    #[test]
    fn test_target_debug_hides_password() {
        let target = Target {
            host: "10.0.0.1".into(),
            port: 22,
            username: "admin".into(),
            password: "s3cret".into(),
            fast_cli: false,
            timeouts: Timeouts::default(),
        };
        let dbg = format!("{:?}", target);
        assert!(!dbg.contains("s3cret"));
        assert!(dbg.contains("admin"));
    }
}
