use std::{path::Path, str::FromStr};

use anyhow::{Context, bail};
use indoc::indoc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_dynamic_string::DynamicString;
use std::fmt::Write;
use toml::Value;

use crate::Config;

/// Fields that may reference an unset environment variable. The field is dropped
/// instead of failing the whole load.
const OPTIONAL_ENV_FIELDS: &[&str] = &["upstream.api_key"];

/// Prefix of every Google API key.
const GOOGLE_API_KEY_PREFIX: &str = "AIza";

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read configuration at {}", path.display()))?;

    let raw_config: Value = toml::from_str(&content)?;
    let config = from_value(raw_config)?;

    for warning in validate(&config)? {
        log::warn!("{warning}");
    }

    Ok(config)
}

fn from_value(mut raw_config: Value) -> anyhow::Result<Config> {
    loop {
        let Err(err) = expand_dynamic_strings(&mut Vec::new(), &mut raw_config) else {
            break;
        };

        match err.downcast_ref::<ExpansionError>() {
            Some(ExpansionError { path, .. }) if OPTIONAL_ENV_FIELDS.contains(&path.as_str()) => {
                let path = path.clone();
                remove_field_from_config(&mut raw_config, &path);
            }
            _ => return Err(err),
        }
    }

    Ok(Config::deserialize(raw_config)?)
}

pub(crate) fn validate(config: &Config) -> anyhow::Result<Vec<String>> {
    let mut warnings = Vec::new();
    let upstream = &config.upstream;

    if upstream.endpoints.is_empty() {
        bail!(indoc! {r#"
            No upstream endpoints configured. At least one generateContent endpoint is required, for example:

              [upstream]
              endpoints = ["https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"]
        "#});
    }

    if upstream.timeout.is_zero() {
        bail!("upstream.timeout must be greater than zero");
    }

    let path = &config.transform.path;

    if !path.starts_with('/') || path.len() < 2 || path.ends_with('/') {
        bail!("transform.path must start with '/', must not end with '/' and cannot be the root, got '{path}'");
    }

    if !config.server.health.path.starts_with('/') {
        bail!("server.health.path must start with '/'");
    }

    if config.transform.max_input_length == 0 {
        bail!("transform.max_input_length must be greater than zero");
    }

    let rate_limits = &config.server.rate_limits;

    if rate_limits.enabled && rate_limits.max_requests == 0 {
        bail!("server.rate_limits.max_requests must be greater than zero");
    }

    if rate_limits.enabled && rate_limits.window.is_zero() {
        bail!("server.rate_limits.window must be greater than zero");
    }

    if rate_limits.enabled && rate_limits.max_clients == 0 {
        bail!("server.rate_limits.max_clients must be greater than zero");
    }

    match upstream.configured_api_key() {
        None if !upstream.forward_key => warnings.push(
            "No upstream API key is configured and key forwarding is disabled. Every transform request will fail until upstream.api_key is set."
                .to_string(),
        ),
        Some(key) if !key.expose_secret().starts_with(GOOGLE_API_KEY_PREFIX) => warnings.push(format!(
            "The configured upstream API key does not start with '{GOOGLE_API_KEY_PREFIX}' and is probably not a valid Google API key."
        )),
        _ => (),
    }

    Ok(warnings)
}

/// A string value which could not be expanded.
#[derive(Debug)]
struct ExpansionError {
    path: String,
    message: String,
}

impl std::fmt::Display for ExpansionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Failed to expand dynamic string at path '{}': {}",
            self.path, self.message
        )
    }
}

impl std::error::Error for ExpansionError {}

fn expand_dynamic_strings<'a>(path: &mut Vec<Result<&'a str, usize>>, value: &'a mut Value) -> anyhow::Result<()> {
    match value {
        Value::String(s) => match DynamicString::<String>::from_str(s) {
            Ok(out) => *s = out.into_inner(),
            Err(err) => {
                let mut p = String::new();

                for segment in path.iter() {
                    match segment {
                        Ok(s) => {
                            p.push_str(s);
                            p.push('.');
                        }
                        Err(i) => write!(p, "[{i}]")?,
                    }
                }

                if p.ends_with('.') {
                    p.pop();
                }

                return Err(ExpansionError {
                    path: p,
                    message: err.to_string(),
                }
                .into());
            }
        },
        Value::Array(values) => {
            for (i, value) in values.iter_mut().enumerate() {
                path.push(Err(i));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Table(map) => {
            for (key, value) in map {
                path.push(Ok(key.as_str()));
                expand_dynamic_strings(path, value)?;
                path.pop();
            }
        }
        Value::Integer(_) | Value::Float(_) | Value::Boolean(_) | Value::Datetime(_) => (),
    }

    Ok(())
}

/// Remove a field from the TOML configuration by its dotted path.
fn remove_field_from_config(config: &mut Value, path: &str) {
    let Some((parents, field)) = path.rsplit_once('.') else {
        if let Some(table) = config.as_table_mut() {
            table.remove(path);
        }
        return;
    };

    let mut current = config;

    for part in parents.split('.') {
        match current.as_table_mut().and_then(|table| table.get_mut(part)) {
            Some(value) => current = value,
            None => return,
        }
    }

    if let Some(table) = current.as_table_mut() {
        table.remove(field);
        log::warn!("Removed optional field '{path}' due to missing environment variable");
    }
}
