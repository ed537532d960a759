use crate::blockfrost::RawUtxo;
use crate::document::Document;
use crate::error::Result;
use async_trait::async_trait;

/// Resolves a content identifier to its decoded document. Single shot.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn fetch_block(&self, id: &str) -> Result<Document>;
}

/// Resolves a script address to its unspent outputs.
#[async_trait]
pub trait UtxoSource: Send + Sync {
    async fn fetch_utxos(&self, script_address: &str) -> Result<Vec<RawUtxo>>;
}
