use anyhow::{Context, Result};
use regex_lite::{Captures, Regex};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::ApplyError;

/// Matches `{NAME}` and `${NAME}` where NAME is identifier-shaped.
fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$?\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex"))
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a `NAME=value` assignment on the first `=`.
pub fn parse_assignment(raw: &str) -> Result<(String, String), ApplyError> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| ApplyError::InvalidAssignment(raw.to_string()))?;
    if !is_valid_name(name) {
        return Err(ApplyError::InvalidAssignment(raw.to_string()));
    }
    Ok((name.to_string(), value.to_string()))
}

/// Template variables, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Variables(BTreeMap<String, String>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the variable set from the command line.
    ///
    /// Later `--var` entries win over earlier ones, `--hostname` wins over
    /// `--var HOSTNAME=...`, and `HOSTNAME` falls back to the target host.
    pub fn collect(
        assignments: &[String],
        hostname: Option<&str>,
        host: &str,
    ) -> Result<Self, ApplyError> {
        let mut vars = Self::new();
        for raw in assignments {
            let (name, value) = parse_assignment(raw)?;
            vars.insert(name, value);
        }
        if let Some(hostname) = hostname {
            vars.insert("HOSTNAME", hostname);
        }
        if vars.get("HOSTNAME").is_none() {
            vars.insert("HOSTNAME", host);
        }
        Ok(vars)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl std::fmt::Display for Variables {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pairs: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{}", pairs.join(", "))
    }
}

/// Render a config template into the lines to send.
///
/// Blank lines are dropped. Substitution is a single pass, so a value that
/// itself looks like a token is sent verbatim. All unresolved names are
/// reported together.
pub fn render(text: &str, vars: &Variables) -> Result<Vec<String>, ApplyError> {
    let mut missing: Vec<String> = Vec::new();
    let mut lines = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        let rendered = token_re().replace_all(line, |caps: &Captures| {
            let name = &caps[1];
            match vars.get(name) {
                Some(value) => value.to_string(),
                None => {
                    if !missing.iter().any(|m| m == name) {
                        missing.push(name.to_string());
                    }
                    caps[0].to_string()
                }
            }
        });
        lines.push(rendered.into_owned());
    }

    if missing.is_empty() {
        Ok(lines)
    } else {
        Err(ApplyError::UnresolvedVariables(missing))
    }
}

/// Read a template from disk and render it.
pub async fn load(path: &Path, vars: &Variables) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    Ok(render(&text, vars)?)
}
