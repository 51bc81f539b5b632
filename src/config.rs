use std::{env, fmt::Display, str::FromStr};

use crate::constants::{DEFAULT_DATABASE_URL, DEFAULT_MAX_CONNECTIONS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Reads `DATABASE_URL` and `DATABASE_MAX_CONNECTIONS`, falling back to
    /// defaults when either is unset or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            url: try_load(&lookup, "DATABASE_URL", DEFAULT_DATABASE_URL.to_string()),
            max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }
}

fn try_load<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => value.trim().parse().unwrap_or_else(|e| {
            log::warn!("Invalid {key} value: {e}, using default: {default}");
            default
        }),
        None => {
            log::info!("{key} not set, using default");
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn falls_back_to_defaults() {
        assert_eq!(DatabaseConfig::from_lookup(lookup(&[])), DatabaseConfig::default());
    }

    #[test]
    fn reads_both_values() {
        let config = DatabaseConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/recipes"),
            ("DATABASE_MAX_CONNECTIONS", " 12 "),
        ]));
        assert_eq!(config.url, "postgres://localhost/recipes");
        assert_eq!(config.max_connections, 12);
    }

    #[test]
    fn bad_connection_count_uses_default() {
        let config =
            DatabaseConfig::from_lookup(lookup(&[("DATABASE_MAX_CONNECTIONS", "lots")]));
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
    }
}
