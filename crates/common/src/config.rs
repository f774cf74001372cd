use std::{env, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }

    pub fn from_env() -> Self {
        match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Read `key` and parse it, falling back to `default` when the variable is
/// missing or does not parse.
pub fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Read a comma-separated list of numbers, e.g. `NORM_MEAN=0.485,0.456,0.406`.
///
/// Returns `Ok(None)` when the variable is unset or empty.
pub fn env_list<T>(key: &str) -> anyhow::Result<Option<Vec<T>>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Ok(raw) = env::var(key) else {
        return Ok(None);
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }

    raw.split(',')
        .map(|part| {
            part.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{key}: invalid element {part:?}: {e}"))
        })
        .collect::<anyhow::Result<Vec<T>>>()
        .map(Some)
}
