//! Central Bank of Russia daily quote feed.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use delivery_types::{Rate, RateError, RateProvider};

/// Public CBR daily rates feed.
pub const DEFAULT_CBR_URL: &str = "https://www.cbr-xml-daily.ru/daily_json.js";

/// Upper bound on a single fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Extracts `Valute.USD.Value` from a CBR daily JSON document.
///
/// Accepts the value as a JSON number or a numeric string.
pub fn parse_usd_rate(body: &[u8]) -> Result<Rate, RateError> {
    let doc: Value = serde_json::from_slice(body)
        .map_err(|e| RateError::MalformedResponse(format!("invalid JSON: {}", e)))?;

    let field = doc
        .get("Valute")
        .and_then(|v| v.get("USD"))
        .and_then(|v| v.get("Value"))
        .ok_or_else(|| RateError::MalformedResponse("missing Valute.USD.Value".into()))?;

    let value = match field {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| RateError::MalformedResponse(format!("non-numeric USD rate: {}", field)))?;

    Rate::new(value).map_err(|e| RateError::MalformedResponse(e.to_string()))
}

/// HTTP rate provider for the CBR feed.
///
/// One GET per `fetch`, bounded by the client timeout. No retries.
pub struct CbrRateProvider {
    client: reqwest::Client,
    url: String,
}

impl CbrRateProvider {
    /// Creates a provider for `url` with the given request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, RateError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RateError::UpstreamUnavailable(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// Returns the configured quote URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl RateProvider for CbrRateProvider {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<Rate, RateError> {
        let resp = self.client.get(&self.url).send().await.map_err(|e| {
            let reason = if e.is_timeout() {
                "request timed out".to_string()
            } else {
                e.to_string()
            };
            RateError::UpstreamUnavailable(reason)
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RateError::UpstreamUnavailable(format!("HTTP {}", status)));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| RateError::UpstreamUnavailable(e.to_string()))?;

        let rate = parse_usd_rate(&body)?;
        tracing::info!(rate = rate.value(), "fetched USD rate");
        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn daily(value: serde_json::Value) -> serde_json::Value {
        serde_json::json!({
            "Date": "2025-06-07T11:30:00+03:00",
            "Valute": {
                "USD": { "CharCode": "USD", "Nominal": 1, "Value": value },
                "EUR": { "CharCode": "EUR", "Nominal": 1, "Value": 90.1 }
            }
        })
    }

    async fn provider_for(server: &MockServer, timeout: Duration) -> CbrRateProvider {
        CbrRateProvider::new(format!("{}/daily_json.js", server.uri()), timeout).unwrap()
    }

    #[test]
    fn test_parse_number() {
        let body = serde_json::to_vec(&daily(serde_json::json!(78.9612))).unwrap();
        assert_eq!(parse_usd_rate(&body).unwrap().value(), 78.9612);
    }

    #[test]
    fn test_parse_numeric_string() {
        let body = serde_json::to_vec(&daily(serde_json::json!("79.5"))).unwrap();
        assert_eq!(parse_usd_rate(&body).unwrap().value(), 79.5);
    }

    #[test]
    fn test_parse_missing_field() {
        let body = br#"{"Valute": {"EUR": {"Value": 90.1}}}"#;
        assert!(matches!(
            parse_usd_rate(body),
            Err(RateError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_positive() {
        let body = serde_json::to_vec(&daily(serde_json::json!(0))).unwrap();
        assert!(matches!(
            parse_usd_rate(&body),
            Err(RateError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert!(matches!(
            parse_usd_rate(b"<html>maintenance</html>"),
            Err(RateError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/daily_json.js"))
            .respond_with(ResponseTemplate::new(200).set_body_json(daily(serde_json::json!(81.25))))
            .expect(1)
            .mount(&server)
            .await;

        let provider = provider_for(&server, DEFAULT_FETCH_TIMEOUT).await;
        let rate = provider.fetch().await.unwrap();

        assert_eq!(rate.value(), 81.25);
    }

    #[tokio::test]
    async fn test_fetch_non_success_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let provider = provider_for(&server, DEFAULT_FETCH_TIMEOUT).await;
        let result = provider.fetch().await;

        assert!(matches!(result, Err(RateError::UpstreamUnavailable(msg)) if msg.contains("503")));
    }

    #[tokio::test]
    async fn test_fetch_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"Valute": {}})))
            .mount(&server)
            .await;

        let provider = provider_for(&server, DEFAULT_FETCH_TIMEOUT).await;

        assert!(matches!(
            provider.fetch().await,
            Err(RateError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(daily(serde_json::json!(80.0)))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let provider = provider_for(&server, Duration::from_millis(100)).await;

        assert!(matches!(
            provider.fetch().await,
            Err(RateError::UpstreamUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host() {
        let provider =
            CbrRateProvider::new("http://127.0.0.1:9/daily_json.js", Duration::from_secs(1))
                .unwrap();

        assert!(matches!(
            provider.fetch().await,
            Err(RateError::UpstreamUnavailable(_))
        ));
    }
}
