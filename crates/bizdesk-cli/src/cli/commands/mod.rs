//! CLI command handlers.

pub mod auth;
pub mod config;
pub mod resources;
pub mod users;

use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// Prints a JSON value to stdout.
pub fn print_json(value: &Value) -> Result<()> {
    let pretty = serde_json::to_string_pretty(value).context("serialize output")?;
    println!("{pretty}");
    Ok(())
}

/// Builds a JSON object from `KEY=VALUE` arguments.
///
/// Values that parse as JSON (numbers, booleans, null, arrays, objects)
/// keep their type; anything else is sent as a string.
pub fn parse_fields(fields: &[String]) -> Result<Value> {
    let mut object = Map::new();
    for field in fields {
        let (key, raw) = field
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got '{field}'"))?;
        let key = key.trim();
        if key.is_empty() {
            anyhow::bail!("Empty key in '{field}'");
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        object.insert(key.to_string(), value);
    }
    Ok(Value::Object(object))
}

/// Parses `--data` as a JSON object.
pub fn parse_data(data: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(data).context("--data must be valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("--data must be a JSON object");
    }
    Ok(value)
}

/// Splits `KEY=VALUE` filters into pairs.
pub fn parse_pairs(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.to_string()))
                .with_context(|| format!("Expected KEY=VALUE, got '{pair}'"))
        })
        .collect()
}
