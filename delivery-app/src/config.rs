//! Configuration loading from environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use delivery_types::Rate;
use exchange_rates::DEFAULT_CBR_URL;

/// Where the USD→RUB rate comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum RateSource {
    /// HTTP feed at the given URL
    Feed { url: String, timeout: Duration },
    /// Fixed rate, for local development
    Static(Rate),
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub rate_source: RateSource,
    pub rate_ttl: Duration,
    pub price_update_interval: Duration,
    pub rate_limit_per_minute: u32,
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let port = parse_or(&lookup, "PORT", 3000)?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let rate_source = match lookup("STATIC_USD_RUB_RATE") {
            Some(raw) => {
                let value: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|e| anyhow::anyhow!("STATIC_USD_RUB_RATE: {}", e))?;
                RateSource::Static(Rate::new(value)?)
            }
            None => RateSource::Feed {
                url: lookup("RATE_SOURCE_URL").unwrap_or_else(|| DEFAULT_CBR_URL.to_string()),
                timeout: Duration::from_secs(parse_or(&lookup, "RATE_FETCH_TIMEOUT_SECS", 5)?),
            },
        };

        let rate_ttl = Duration::from_secs(parse_or(&lookup, "RATE_TTL_SECONDS", 300)?);
        if rate_ttl.is_zero() {
            anyhow::bail!("RATE_TTL_SECONDS must be positive");
        }

        let price_update_interval =
            Duration::from_secs(parse_or(&lookup, "PRICE_UPDATE_INTERVAL_SECS", 300)?);
        if price_update_interval.is_zero() {
            anyhow::bail!("PRICE_UPDATE_INTERVAL_SECS must be positive");
        }

        let rate_limit_per_minute = parse_or(&lookup, "RATE_LIMIT_PER_MINUTE", 100)?;

        Ok(Self {
            port,
            database_url,
            rate_source,
            rate_ttl,
            price_update_interval,
            rate_limit_per_minute,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{}: {}", key, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("DATABASE_URL", "sqlite::memory:")]).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.rate_ttl, Duration::from_secs(300));
        assert_eq!(config.price_update_interval, Duration::from_secs(300));
        assert_eq!(config.rate_limit_per_minute, 100);
        assert_eq!(
            config.rate_source,
            RateSource::Feed {
                url: DEFAULT_CBR_URL.to_string(),
                timeout: Duration::from_secs(5),
            }
        );
    }

    #[test]
    fn test_database_url_required() {
        assert!(load(&[]).is_err());
    }

    #[test]
    fn test_static_rate_overrides_feed() {
        let config = load(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("STATIC_USD_RUB_RATE", "80"),
            ("RATE_SOURCE_URL", "http://ignored"),
        ])
        .unwrap();

        assert_eq!(config.rate_source, RateSource::Static(Rate::new(80.0).unwrap()));
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (key, value) in [
            ("PORT", "http"),
            ("STATIC_USD_RUB_RATE", "-1"),
            ("RATE_TTL_SECONDS", "five"),
            ("RATE_TTL_SECONDS", "0"),
            ("PRICE_UPDATE_INTERVAL_SECS", "0"),
        ] {
            let result = load(&[("DATABASE_URL", "sqlite::memory:"), (key, value)]);
            assert!(result.is_err(), "{}={} should be rejected", key, value);
        }
    }

    #[test]
    fn test_zero_rate_ttl_names_the_variable() {
        let err = load(&[("DATABASE_URL", "sqlite::memory:"), ("RATE_TTL_SECONDS", "0")])
            .unwrap_err();
        assert!(err.to_string().contains("RATE_TTL_SECONDS"));

        let config = load(&[("DATABASE_URL", "sqlite::memory:"), ("RATE_TTL_SECONDS", "1")])
            .unwrap();
        assert_eq!(config.rate_ttl, Duration::from_secs(1));
    }
}
