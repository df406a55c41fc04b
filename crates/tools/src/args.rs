//! Typed access to the JSON arguments a model sends with a tool call.

use crate::http::Failure;
use serde_json::Value;

pub fn required_str(args: &Value, key: &str) -> Result<String, Failure> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(Failure::Arguments(format!("Missing '{key}' argument"))),
        Some(_) => Err(Failure::Arguments(format!("'{key}' must be a string"))),
    }
}

/// An optional string; `null` counts as absent.
pub fn opt_str(args: &Value, key: &str) -> Result<Option<String>, Failure> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(Failure::Arguments(format!("'{key}' must be a string"))),
    }
}

pub fn str_or(args: &Value, key: &str, default: &str) -> Result<String, Failure> {
    Ok(opt_str(args, key)?.unwrap_or_else(|| default.to_string()))
}

pub fn bool_or(args: &Value, key: &str, default: bool) -> Result<bool, Failure> {
    match args.get(key) {
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::Null) | None => Ok(default),
        Some(_) => Err(Failure::Arguments(format!("'{key}' must be a boolean"))),
    }
}

/// An integer; numeric strings are accepted since models sometimes quote them.
fn int(args: &Value, key: &str) -> Result<Option<i64>, Failure> {
    match args.get(key) {
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| Failure::Arguments(format!("'{key}' must be an integer"))),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Failure::Arguments(format!("'{key}' must be an integer"))),
        Some(Value::Null) | None => Ok(None),
        Some(_) => Err(Failure::Arguments(format!("'{key}' must be an integer"))),
    }
}

pub fn required_int(args: &Value, key: &str) -> Result<i64, Failure> {
    int(args, key)?.ok_or_else(|| Failure::Arguments(format!("Missing '{key}' argument")))
}

/// A result-count limit, clamped to `[1, max]`.
pub fn limit(args: &Value, key: &str, default: i64, max: i64) -> Result<usize, Failure> {
    let raw = int(args, key)?.unwrap_or(default);
    Ok(raw.clamp(1, max) as usize)
}

/// A string restricted to a fixed set of values.
pub fn one_of(
    args: &Value,
    key: &str,
    default: &str,
    allowed: &[&str],
) -> Result<String, Failure> {
    let value = str_or(args, key, default)?;
    if allowed.contains(&value.as_str()) {
        Ok(value)
    } else {
        Err(Failure::Arguments(format!(
            "'{key}' must be one of: {}",
            allowed.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings() {
        let args = json!({"repo": "ronnyx", "owner": null, "n": 3});
        assert_eq!(required_str(&args, "repo").unwrap(), "ronnyx");
        assert!(opt_str(&args, "owner").unwrap().is_none());
        assert!(required_str(&args, "missing").is_err());
        assert!(matches!(required_str(&args, "n"), Err(Failure::Arguments(_))));
        assert_eq!(str_or(&args, "branch", "main").unwrap(), "main");
    }

    #[test]
    fn limits_clamp() {
        assert_eq!(limit(&json!({}), "limit", 50, 200).unwrap(), 50);
        assert_eq!(limit(&json!({"limit": 0}), "limit", 50, 200).unwrap(), 1);
        assert_eq!(limit(&json!({"limit": 999}), "limit", 50, 200).unwrap(), 200);
        assert_eq!(limit(&json!({"limit": "7"}), "limit", 50, 200).unwrap(), 7);
        assert!(limit(&json!({"limit": true}), "limit", 50, 200).is_err());
    }

    #[test]
    fn enumerations() {
        let allowed = ["open", "closed", "all"];
        assert_eq!(one_of(&json!({}), "state", "open", &allowed).unwrap(), "open");
        assert_eq!(
            one_of(&json!({"state": "all"}), "state", "open", &allowed).unwrap(),
            "all"
        );
        assert!(one_of(&json!({"state": "merged"}), "state", "open", &allowed).is_err());
    }

    #[test]
    fn integers_and_bools() {
        let args = json!({"number": 12, "private": true});
        assert_eq!(required_int(&args, "number").unwrap(), 12);
        assert!(bool_or(&args, "private", false).unwrap());
        assert!(bool_or(&json!({}), "auto_init", true).unwrap());
        assert!(required_int(&json!({}), "number").is_err());
    }
}
