/// Stable process exit codes.
pub mod exit_codes {
    /// Configuration applied and committed, or dry-run completed.
    pub const OK: i32 = 0;
    /// Bad arguments, template or file errors, failed backup.
    pub const FAILURE: i32 = 1;
    /// Could not connect, authenticate, or keep the SSH session alive.
    pub const CONNECTION: i32 = 2;
    /// The device rejected a configuration line or the commit failed.
    pub const REJECTED: i32 = 3;
}

/// Typed error for the failures that decide the exit status.
/// Carried inside `anyhow::Error` and recovered with a downcast in `main`.
#[derive(Debug)]
pub enum ApplyError {
    /// A `--var` argument that is not `NAME=value`.
    InvalidAssignment(String),
    /// Template tokens with no value, in order of first appearance.
    UnresolvedVariables(Vec<String>),
    /// TCP connect or SSH handshake failed.
    Connect(String),
    /// Every authentication method was refused.
    Auth(String),
    /// The SSH session broke or timed out after login.
    Session(String),
    /// A configuration line was refused by the device.
    Rejected { line: String, output: String },
    /// The device refused to commit the candidate configuration.
    CommitFailed(String),
    /// The running-config backup could not be taken or saved.
    Backup(String),
}

impl ApplyError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidAssignment(_) | Self::UnresolvedVariables(_) | Self::Backup(_) => {
                exit_codes::FAILURE
            }
            Self::Connect(_) | Self::Auth(_) | Self::Session(_) => exit_codes::CONNECTION,
            Self::Rejected { .. } | Self::CommitFailed(_) => exit_codes::REJECTED,
        }
    }
}

impl std::fmt::Display for ApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAssignment(raw) => {
                write!(f, "Invalid variable format: {}. Use VAR=value", raw)
            }
            Self::UnresolvedVariables(names) => {
                write!(f, "Unresolved template variables: {}", names.join(", "))
            }
            Self::Connect(msg) => write!(f, "Failed to connect: {}", msg),
            Self::Auth(msg) => write!(f, "Authentication failed: {}", msg),
            Self::Session(msg) => write!(f, "SSH session error: {}", msg),
            Self::Rejected { line, output } => {
                write!(f, "Device rejected '{}':\n{}", line, output.trim_end())
            }
            Self::CommitFailed(output) => write!(f, "Commit failed:\n{}", output.trim_end()),
            Self::Backup(msg) => write!(f, "Failed to save backup: {}", msg),
        }
    }
}

impl std::error::Error for ApplyError {}

/// Exit code for an arbitrary error chain: the first `ApplyError` found wins.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<ApplyError>())
        .map(ApplyError::exit_code)
        .unwrap_or(exit_codes::FAILURE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_exit_codes_by_kind() {
        assert_eq!(
            ApplyError::UnresolvedVariables(vec!["X".into()]).exit_code(),
            exit_codes::FAILURE
        );
        assert_eq!(ApplyError::Auth("denied".into()).exit_code(), exit_codes::CONNECTION);
        assert_eq!(
            ApplyError::CommitFailed("% Failed to commit".into()).exit_code(),
            exit_codes::REJECTED
        );
    }

    #[test]
    fn test_exit_code_survives_context() {
        let err = Err::<(), _>(ApplyError::Connect("refused".into()))
            .context("connecting to 10.0.0.1")
            .unwrap_err();
        assert_eq!(exit_code_for(&err), exit_codes::CONNECTION);

        let plain = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&plain), exit_codes::FAILURE);
    }

    #[test]
    fn test_display_lists_all_unresolved() {
        let err = ApplyError::UnresolvedVariables(vec!["LOOPBACK".into(), "ASN".into()]);
        assert_eq!(err.to_string(), "Unresolved template variables: LOOPBACK, ASN");
    }
}
