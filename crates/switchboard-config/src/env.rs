use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

/// Matches `{{ env.VAR }}` and `{{ env.VAR | default("fallback") }}`
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\{\s*([A-Za-z0-9_.]+)\s*(?:\|\s*default\("([^"]*)"\))?\s*\}\}"#).expect("valid placeholder regex")
});

/// Failure while substituting a config placeholder
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExpandError {
    /// The referenced variable is unset and no default was given
    #[error("environment variable not found: `{0}`")]
    Missing(String),
    /// Placeholder uses a scope other than `env.`
    #[error("only variables scoped with 'env.' are supported: `{0}`")]
    UnsupportedScope(String),
}

/// Expand `{{ env.VAR }}` placeholders in raw config text
///
/// A `| default("x")` suffix supplies the value when the variable is unset.
/// TOML comment lines are copied through untouched so commented-out secrets
/// never need to be present in the environment.
pub fn expand_env(input: &str) -> Result<String, ExpandError> {
    let mut lines = Vec::new();

    for line in input.split('\n') {
        if line.trim_start().starts_with('#') {
            lines.push(line.to_owned());
            continue;
        }
        lines.push(expand_line(line)?);
    }

    Ok(lines.join("\n"))
}

fn expand_line(line: &str) -> Result<String, ExpandError> {
    let mut failure = None;

    let expanded = PLACEHOLDER.replace_all(line, |captures: &Captures<'_>| {
        match resolve(captures) {
            Ok(value) => value,
            Err(error) => {
                failure.get_or_insert(error);
                String::new()
            }
        }
    });

    match failure {
        Some(error) => Err(error),
        None => Ok(expanded.into_owned()),
    }
}

fn resolve(captures: &Captures<'_>) -> Result<String, ExpandError> {
    let key = &captures[1];
    let Some(var_name) = key.strip_prefix("env.").filter(|name| !name.contains('.')) else {
        return Err(ExpandError::UnsupportedScope(key.to_owned()));
    };

    std::env::var(var_name).or_else(|_| {
        captures
            .get(2)
            .map(|default| default.as_str().to_owned())
            .ok_or_else(|| ExpandError::Missing(var_name.to_owned()))
    })
}
