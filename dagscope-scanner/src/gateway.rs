use crate::client::{build_client, ensure_trailing_slash, require};
use crate::document::{DAG_CBOR, Document, decode_document};
use crate::error::{Result, ScanError};
use crate::source::BlockSource;
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::time::Duration;
use tracing::debug;

/// Content-negotiating client for an IPFS/IPLD HTTP gateway.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: Client,
    base_url: String,
}

impl GatewayClient {
    pub fn new(gateway_url: &str, timeout: Option<Duration>) -> Result<Self> {
        require(gateway_url, "IPFS gateway URL")?;
        Ok(Self {
            client: build_client(timeout)?,
            base_url: ensure_trailing_slash(gateway_url.trim()),
        })
    }

    pub fn block_url(&self, id: &str) -> String {
        format!("{}ipfs/{}", self.base_url, id)
    }
}

#[async_trait]
impl BlockSource for GatewayClient {
    async fn fetch_block(&self, id: &str) -> Result<Document> {
        let url = self.block_url(id);
        debug!("Fetching block {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, DAG_CBOR)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(ScanError::Status {
                service: "IPFS gateway",
                status,
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let body = response.bytes().await?;

        decode_document(content_type.as_deref(), &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DAG_JSON;
    use crate::error::ConfigError;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{header, method, path},
    };

    #[test]
    fn test_missing_gateway_is_config_error() {
        let err = GatewayClient::new("", None).unwrap_err();
        assert!(matches!(
            err,
            ScanError::Config(ConfigError::Missing("IPFS gateway URL"))
        ));
    }

    #[test]
    fn test_block_url_joins_under_base() {
        let client = GatewayClient::new("https://ipfs.io", None).unwrap();
        assert_eq!(client.block_url("bafyx"), "https://ipfs.io/ipfs/bafyx");
    }

    #[tokio::test]
    async fn test_fetch_dag_json_with_negotiated_accept() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipfs/bafyjson"))
            .and(header("accept", DAG_CBOR))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", DAG_JSON)
                    .set_body_bytes(br#"{"Issuer":"X"}"#.as_slice()),
            )
            .mount(&mock_server)
            .await;

        let client = GatewayClient::new(&mock_server.uri(), None).unwrap();
        let doc = client.fetch_block("bafyjson").await.unwrap();
        assert_eq!(doc["Issuer"], "X");
    }

    #[tokio::test]
    async fn test_non_200_is_status_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipfs/bafymissing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let client = GatewayClient::new(&mock_server.uri(), None).unwrap();
        let err = client.fetch_block("bafymissing").await.unwrap_err();
        assert!(matches!(
            err,
            ScanError::Status {
                service: "IPFS gateway",
                status: 404
            }
        ));
    }

    #[tokio::test]
    async fn test_other_content_type_is_decode_failure() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ipfs/bafyhtml"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(b"<html></html>".as_slice()),
            )
            .mount(&mock_server)
            .await;

        let client = GatewayClient::new(&mock_server.uri(), None).unwrap();
        let err = client.fetch_block("bafyhtml").await.unwrap_err();
        assert!(matches!(err, ScanError::UnsupportedContentType(_)));
    }
}
