mod session;

pub use session::{SshConnector, XrSession};

use regex_lite::Regex;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::OnceLock;
use std::time::Duration;

use crate::error::ApplyError;

/// Keyboard-interactive prompt handler that always responds with the password
struct PasswordPrompt {
    password: String,
}

impl ssh2::KeyboardInteractivePrompt for PasswordPrompt {
    fn prompt<'a>(
        &mut self,
        _username: &str,
        _instructions: &str,
        prompts: &[ssh2::Prompt<'a>],
    ) -> Vec<String> {
        prompts.iter().map(|_| self.password.clone()).collect()
    }
}

/// IOS-XR exec or config prompt, e.g. `RP/0/RP0/CPU0:pe1#` or
/// `RP/0/RP0/CPU0:pe1(config-if)#`.
fn prompt_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_\-./:]+(\([A-Za-z0-9_\-./:]+\))?#$").expect("static regex")
    })
}

/// Yes/no questions IOS-XR asks on commit conflicts or when leaving
/// config mode with uncommitted changes.
fn confirm_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[(no|yes|cancel)\]:$").expect("static regex"))
}

pub fn is_prompt(line: &str) -> bool {
    prompt_re().is_match(line.trim())
}

pub fn is_config_prompt(line: &str) -> bool {
    is_prompt(line) && line.contains("(config")
}

pub fn is_confirmation(line: &str) -> bool {
    confirm_re().is_match(line.trim())
}

/// Last non-empty line of raw channel output.
pub fn last_line(output: &str) -> &str {
    output
        .rsplit(|c: char| c == '\n' || c == '\r')
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
}

/// Create an SSH session and authenticate with password + keyboard-interactive.
/// Returns the authenticated Session. Uses the ssh2 crate (libssh2).
/// This is blocking, so call from a spawn_blocking context.
pub fn ssh_connect(
    host: &str,
    port: u16,
    user: &str,
    pass: &str,
    timeout: Duration,
) -> Result<ssh2::Session, ApplyError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| ApplyError::Connect(format!("Cannot resolve {}:{}: {}", host, port, e)))?
        .next()
        .ok_or_else(|| ApplyError::Connect(format!("No address found for {}:{}", host, port)))?;

    let tcp = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| ApplyError::Connect(format!("TCP connection to {} failed: {}", addr, e)))?;

    tcp.set_read_timeout(Some(timeout)).ok();
    tcp.set_write_timeout(Some(timeout)).ok();

    let mut session = ssh2::Session::new()
        .map_err(|e| ApplyError::Connect(format!("Failed to create SSH session: {}", e)))?;
    session.set_tcp_stream(tcp);
    session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));
    session
        .handshake()
        .map_err(|e| ApplyError::Connect(format!("SSH handshake failed: {}", e)))?;

    // Try password auth first
    match session.userauth_password(user, pass) {
        Ok(_) if session.authenticated() => return Ok(session),
        Ok(_) => {}
        Err(e) => tracing::debug!("Password auth for {} refused: {}", user, e),
    }

    // Some AAA setups only offer keyboard-interactive
    let mut prompter = PasswordPrompt {
        password: pass.to_string(),
    };
    let _ = session.userauth_keyboard_interactive(user, &mut prompter);

    if session.authenticated() {
        Ok(session)
    } else {
        Err(ApplyError::Auth(format!(
            "{}@{}: all methods exhausted",
            user, host
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_prompt() {
        assert!(is_prompt("RP/0/RP0/CPU0:xr1#"));
        assert!(is_prompt("RP/0/RSP0/CPU0:pe-01.lab#  "));
        assert!(is_prompt("RP/0/RP0/CPU0:xr1(config)#"));
        assert!(is_prompt("RP/0/RP0/CPU0:xr1(config-bgp-nbr)#"));
        assert!(!is_prompt("banner motd #hello#"));
        assert!(!is_prompt(" description uplink"));
        assert!(!is_prompt(""));
    }

    #[test]
    fn test_is_config_prompt() {
        assert!(is_config_prompt("RP/0/RP0/CPU0:xr1(config-if)#"));
        assert!(!is_config_prompt("RP/0/RP0/CPU0:xr1#"));
    }

    #[test]
    fn test_is_confirmation() {
        assert!(is_confirmation(
            "Do you wish to proceed with this commit anyway? [no]:"
        ));
        assert!(is_confirmation(
            "Uncommitted changes found, commit them before exiting(yes/no/cancel)? [cancel]: "
        ));
        assert!(!is_confirmation("RP/0/RP0/CPU0:xr1(config)#"));
    }

    #[test]
    fn test_last_line() {
        assert_eq!(last_line("a\r\nb\r\nRP/0/RP0/CPU0:xr1#"), "RP/0/RP0/CPU0:xr1#");
        assert_eq!(last_line("a\n\n  \n"), "a");
        assert_eq!(last_line(""), "");
    }
}
