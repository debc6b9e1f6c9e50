use std::io::{self, Read, Write};
use std::thread;
use std::time::{Duration, Instant};

use super::{is_config_prompt, is_confirmation, is_prompt, last_line, ssh_connect};
use crate::device::{clean_output, find_rejection, Connector, DeviceSession, Target, Timeouts};
use crate::error::ApplyError;

/// Sent once after login so output is unpaged and prompts are predictable.
const SESSION_PREP: &[&str] = &[
    "terminal exec prompt no-timestamp",
    "terminal length 0",
    "terminal width 511",
];

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const FAST_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Bytes from the end of the buffer decoded when looking for a prompt.
const PROMPT_TAIL: usize = 4096;

/// A non-blocking byte stream to a device CLI.
pub trait ShellStream: Read + Write {
    /// True once the remote side has closed the stream.
    fn at_eof(&self) -> bool;
}

impl ShellStream for ssh2::Channel {
    fn at_eof(&self) -> bool {
        self.eof()
    }
}

/// Opens `XrSession`s over SSH.
#[derive(Debug, Clone, Copy, Default)]
pub struct SshConnector;

impl Connector for SshConnector {
    type Session = XrSession;

    fn connect(&self, target: &Target) -> Result<XrSession, ApplyError> {
        XrSession::open(target)
    }
}

fn session_err(what: &str, e: impl std::fmt::Display) -> ApplyError {
    ApplyError::Session(format!("{}: {}", what, e))
}

/// Prompt-driven IOS-XR CLI over any `ShellStream`.
struct Shell<S> {
    stream: S,
    poll: Duration,
    timeouts: Timeouts,
}

impl<S: ShellStream> Shell<S> {
    fn new(stream: S, poll: Duration, timeouts: Timeouts) -> Self {
        Self {
            stream,
            poll,
            timeouts,
        }
    }

    fn write_line(&mut self, line: &str) -> Result<(), ApplyError> {
        let data = format!("{}\n", line);
        let mut remaining = data.as_bytes();
        let deadline = Instant::now() + self.timeouts.command;

        while !remaining.is_empty() {
            match self.stream.write(remaining) {
                Ok(n) => remaining = &remaining[n..],
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if Instant::now() >= deadline {
                        return Err(ApplyError::Session(format!(
                            "timed out sending '{}'",
                            line
                        )));
                    }
                    thread::sleep(self.poll);
                }
                Err(e) => return Err(session_err("Write failed", e)),
            }
        }
        Ok(())
    }

    /// Read until the last output line satisfies `done` or the deadline
    /// passes. Returns the raw output, prompt included.
    fn read_until(
        &mut self,
        timeout: Duration,
        done: impl Fn(&str) -> bool,
    ) -> Result<String, ApplyError> {
        let deadline = Instant::now() + timeout;
        let mut raw: Vec<u8> = Vec::new();
        let mut chunk = [0u8; 8192];

        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) if self.stream.at_eof() => {
                    return Err(ApplyError::Session(
                        "channel closed by device".to_string(),
                    ));
                }
                Ok(0) => thread::sleep(self.poll),
                Ok(n) => {
                    raw.extend_from_slice(&chunk[..n]);
                    if done(last_line(&decode_tail(&raw))) {
                        return Ok(decode(raw));
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(self.poll),
                Err(e) => return Err(session_err("Read failed", e)),
            }

            if Instant::now() >= deadline {
                return Err(ApplyError::Session(format!(
                    "timed out after {}s waiting for prompt, last output: {}",
                    timeout.as_secs(),
                    last_line(&decode_tail(&raw)).trim()
                )));
            }
        }
    }

    /// Send one line and wait for a prompt or a yes/no question.
    fn exchange(&mut self, line: &str, timeout: Duration) -> Result<String, ApplyError> {
        self.write_line(line)?;
        self.read_until(timeout, |l| is_prompt(l) || is_confirmation(l))
    }

    /// Answer `no` to a pending question and collect the rest.
    fn decline(&mut self, raw: &mut String) -> Result<(), ApplyError> {
        if is_confirmation(last_line(raw)) {
            tracing::warn!("Device asked: {}", last_line(raw).trim());
            let more = self.exchange("no", self.timeouts.command)?;
            raw.push('\n');
            raw.push_str(&more);
        }
        Ok(())
    }

    fn send_command(&mut self, command: &str) -> Result<String, ApplyError> {
        tracing::debug!("> {}", command);
        self.write_line(command)?;
        let raw = self.read_until(self.timeouts.command, is_prompt)?;
        Ok(clean_output(&raw, command))
    }

    fn send_config_set(&mut self, lines: &[String]) -> Result<String, ApplyError> {
        let raw = self.exchange("configure", self.timeouts.command)?;
        if !is_config_prompt(last_line(&raw)) {
            return Err(ApplyError::Session(format!(
                "did not enter configuration mode: {}",
                last_line(&raw).trim()
            )));
        }

        let mut output = raw.replace('\r', "");
        for line in lines {
            tracing::debug!("> {}", line);
            let raw = self.exchange(line, self.timeouts.command)?;
            let cleaned = clean_output(&raw, line);
            if find_rejection(&cleaned).is_some() {
                return Err(ApplyError::Rejected {
                    line: line.clone(),
                    output: cleaned,
                });
            }
            output.push_str(&raw.replace('\r', ""));
        }
        Ok(output)
    }

    fn commit(&mut self) -> Result<String, ApplyError> {
        let mut raw = self.exchange("commit", self.timeouts.commit)?;
        let conflicted = is_confirmation(last_line(&raw));
        self.decline(&mut raw)?;

        let output = clean_output(&raw, "commit");
        if conflicted || find_rejection(&output).is_some() {
            let detail = self
                .send_command("show configuration failed")
                .unwrap_or_default();
            let mut msg = output;
            if !detail.trim().is_empty() {
                msg.push('\n');
                msg.push_str(&detail);
            }
            return Err(ApplyError::CommitFailed(msg));
        }
        Ok(output)
    }

    fn abort(&mut self) -> Result<String, ApplyError> {
        let raw = self.exchange("abort", self.timeouts.command)?;
        Ok(clean_output(&raw, "abort"))
    }

    fn exit_config_mode(&mut self) -> Result<String, ApplyError> {
        let mut raw = self.exchange("end", self.timeouts.command)?;
        self.decline(&mut raw)?;
        Ok(clean_output(&raw, "end"))
    }
}

fn decode_tail(raw: &[u8]) -> std::borrow::Cow<'_, str> {
    String::from_utf8_lossy(&raw[raw.len().saturating_sub(PROMPT_TAIL)..])
}

fn decode(raw: Vec<u8>) -> String {
    String::from_utf8(raw).unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned())
}

/// Interactive shell on an IOS-XR device over SSH.
pub struct XrSession {
    session: ssh2::Session,
    shell: Shell<ssh2::Channel>,
}

impl XrSession {
    /// Log in, open a PTY shell and prepare the terminal.
    pub fn open(target: &Target) -> Result<Self, ApplyError> {
        let session = ssh_connect(
            &target.host,
            target.port,
            &target.username,
            &target.password,
            target.timeouts.connect,
        )?;

        let mut channel = session
            .channel_session()
            .map_err(|e| session_err("Failed to open channel", e))?;
        channel
            .request_pty("vt100", None, Some((511, 24, 0, 0)))
            .map_err(|e| session_err("PTY request failed", e))?;
        channel
            .shell()
            .map_err(|e| session_err("Failed to start shell", e))?;

        // All reads from here on are prompt-driven polls
        session.set_blocking(false);

        let poll = if target.fast_cli {
            FAST_POLL_INTERVAL
        } else {
            POLL_INTERVAL
        };
        let mut shell = Shell::new(channel, poll, target.timeouts);

        let banner = shell.read_until(target.timeouts.command, is_prompt)?;
        tracing::debug!("Logged in, prompt: {}", last_line(&banner).trim());

        for cmd in SESSION_PREP {
            shell.send_command(cmd)?;
        }

        Ok(Self { session, shell })
    }
}

impl DeviceSession for XrSession {
    fn send_command(&mut self, command: &str) -> Result<String, ApplyError> {
        self.shell.send_command(command)
    }

    fn send_config_set(&mut self, lines: &[String]) -> Result<String, ApplyError> {
        self.shell.send_config_set(lines)
    }

    fn commit(&mut self) -> Result<String, ApplyError> {
        self.shell.commit()
    }

    fn abort(&mut self) -> Result<String, ApplyError> {
        self.shell.abort()
    }

    fn exit_config_mode(&mut self) -> Result<String, ApplyError> {
        self.shell.exit_config_mode()
    }

    fn disconnect(&mut self) {
        self.session.set_blocking(true);
        if let Err(e) = self.shell.stream.close() {
            tracing::debug!("Channel close failed: {}", e);
        }
        if let Err(e) = self.session.disconnect(None, "iosxr-apply done", None) {
            tracing::debug!("SSH disconnect failed: {}", e);
        }
    }
}
