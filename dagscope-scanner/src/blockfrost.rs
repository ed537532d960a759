use crate::client::{build_client, ensure_trailing_slash, require};
use crate::error::{Result, ScanError};
use crate::source::UtxoSource;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Header carrying the Blockfrost project token.
pub const PROJECT_ID_HEADER: &str = "project_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Amount {
    pub unit: String,
    pub quantity: String,
}

/// Unspent output as returned by `/addresses/{address}/utxos`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUtxo {
    pub tx_hash: String,
    #[serde(default)]
    pub tx_index: Option<u32>,
    /// Deprecated spelling still sent alongside `tx_index`.
    #[serde(default)]
    pub output_index: Option<u32>,
    #[serde(default)]
    pub amount: Vec<Amount>,
    #[serde(default)]
    pub inline_datum: Option<String>,
    #[serde(default)]
    pub data_hash: Option<String>,
}

impl RawUtxo {
    pub fn index(&self) -> Option<u32> {
        self.tx_index.or(self.output_index)
    }

    pub fn holds_unit(&self, unit: &str) -> bool {
        self.amount.iter().any(|a| a.unit == unit)
    }
}

#[derive(Debug, Clone)]
pub struct BlockfrostClient {
    client: Client,
    base_url: String,
    token: String,
}

impl BlockfrostClient {
    /// Validates the token and base URL before anything is sent.
    pub fn new(base_url: &str, token: &str, timeout: Option<Duration>) -> Result<Self> {
        require(token, "Blockfrost token")?;
        require(base_url, "Blockfrost URL")?;
        Ok(Self {
            client: build_client(timeout)?,
            base_url: ensure_trailing_slash(base_url.trim()),
            token: token.trim().to_string(),
        })
    }

    pub fn utxos_url(&self, script_address: &str) -> String {
        format!("{}addresses/{}/utxos", self.base_url, script_address)
    }
}

#[async_trait]
impl UtxoSource for BlockfrostClient {
    async fn fetch_utxos(&self, script_address: &str) -> Result<Vec<RawUtxo>> {
        require(script_address, "script address")?;
        let url = self.utxos_url(script_address);
        debug!("Fetching UTxOs from {}", url);

        let response = self
            .client
            .get(&url)
            .header(PROJECT_ID_HEADER, &self.token)
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(ScanError::Status {
                service: "Blockfrost",
                status,
            });
        }

        let body = response.bytes().await?;
        let utxos: Vec<RawUtxo> = serde_json::from_slice(&body)
            .map_err(|e| ScanError::DecodeError(format!("invalid UTxO listing: {}", e)))?;
        info!("Found {} UTxOs at {}", utxos.len(), script_address);
        Ok(utxos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    #[test]
    fn test_preconditions_checked_in_order() {
        let err = BlockfrostClient::new("https://example.com", "", None).unwrap_err();
        assert!(matches!(err, ScanError::Config(ConfigError::Missing("Blockfrost token"))));

        let err = BlockfrostClient::new("", "token", None).unwrap_err();
        assert!(matches!(err, ScanError::Config(ConfigError::Missing("Blockfrost URL"))));
    }

    #[tokio::test]
    async fn test_missing_script_address_sends_nothing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = BlockfrostClient::new(&mock_server.uri(), "token", None).unwrap();
        let err = client.fetch_utxos("").await.unwrap_err();
        assert!(matches!(err, ScanError::Config(ConfigError::Missing("script address"))));
    }

    #[tokio::test]
    async fn test_fetch_utxos_sends_token_and_parses_records() {
        let mock_server = MockServer::start().await;

        let body = json!([
            {
                "tx_hash": "aa",
                "tx_index": 0,
                "output_index": 0,
                "amount": [{"unit": "lovelace", "quantity": "2000000"}],
                "inline_datum": "d87980",
                "data_hash": null,
                "block": "ignored"
            },
            {
                "tx_hash": "bb",
                "output_index": 2,
                "amount": []
            }
        ]);

        Mock::given(method("GET"))
            .and(path("/api/v0/addresses/addr_test/utxos"))
            .and(header(PROJECT_ID_HEADER, "secret"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let client =
            BlockfrostClient::new(&format!("{}/api/v0", mock_server.uri()), "secret", None).unwrap();
        let utxos = client.fetch_utxos("addr_test").await.unwrap();

        assert_eq!(utxos.len(), 2);
        assert_eq!(utxos[0].index(), Some(0));
        assert!(utxos[0].holds_unit("lovelace"));
        assert_eq!(utxos[0].inline_datum.as_deref(), Some("d87980"));
        assert_eq!(utxos[1].tx_index, None);
        assert_eq!(utxos[1].index(), Some(2));
        assert_eq!(utxos[1].inline_datum, None);
    }

    #[tokio::test]
    async fn test_non_200_is_status_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/addresses/addr_test/utxos"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&mock_server)
            .await;

        let client = BlockfrostClient::new(&mock_server.uri(), "bad", None).unwrap();
        let err = client.fetch_utxos("addr_test").await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::Status {
                service: "Blockfrost",
                status: 403
            }
        ));
    }
}
