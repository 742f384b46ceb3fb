use std::str::FromStr;

/// Read an environment variable, treating blank values as unset.
pub fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
pub fn env_parse<T>(name: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|e| format!("Invalid value for {name}: '{raw}' ({e})")),
        None => Ok(default),
    }
}

/// Parse an optional environment variable.
pub fn env_parse_opt<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|raw| {
            raw.parse()
                .map_err(|e| format!("Invalid value for {name}: '{raw}' ({e})"))
        })
        .transpose()
}

/// Parse a boolean flag. Accepts true/false, 1/0, yes/no, on/off.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn env_bool(name: &str, default: bool) -> Result<bool, String> {
    match env_var(name) {
        Some(raw) => parse_bool(&raw)
            .ok_or_else(|| format!("Invalid value for {name}: '{raw}' (expected true or false)")),
        None => Ok(default),
    }
}
