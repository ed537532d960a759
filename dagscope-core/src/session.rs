//! One exploration session: UTxO listing, token filter, datum decoding and
//! graph materialization, tagged with an epoch so a reset can discard work
//! still in flight.

use crate::config::ExplorerConfig;
use crate::data::{SessionStats, SessionStatus};
use crate::error::Result;
use ciborium::value::Value as Cbor;
use dagscope_scanner::document::CID_TAG;
use dagscope_scanner::identifier::{decode_cid_bytes, utxo_identifier};
use dagscope_scanner::{
    BlockSource, BlockfrostClient, BranchFailure, EpochGuard, FailureCallback, GatewayClient,
    GraphStore, Identifier, MaterializeSummary, Materializer, ProgressCallback, RawUtxo,
    ScanError, SessionEpoch, Tip, UtxoSource,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Keeps UTxOs holding `unit`. An empty unit keeps everything.
pub fn filter_utxos(utxos: Vec<RawUtxo>, unit: &str) -> Vec<RawUtxo> {
    if unit.is_empty() {
        return utxos;
    }
    utxos.into_iter().filter(|u| u.holds_unit(unit)).collect()
}

/// Extracts the header CID from a hex-encoded inline datum.
///
/// The datum is a CBOR list whose second element is the CID, either as raw
/// bytes or as a tag 42 link.
pub fn decode_datum(datum_hex: &str) -> std::result::Result<Identifier, ScanError> {
    let bytes = hex::decode(datum_hex.trim())
        .map_err(|e| ScanError::DecodeError(format!("datum is not hex: {}", e)))?;
    let value: Cbor = ciborium::de::from_reader(bytes.as_slice())
        .map_err(|e| ScanError::DecodeError(format!("datum is not CBOR: {}", e)))?;

    let fields = match value {
        Cbor::Array(fields) => fields,
        Cbor::Tag(_, inner) => match *inner {
            Cbor::Array(fields) => fields,
            _ => return Err(ScanError::DecodeError("datum is not a list".to_string())),
        },
        _ => return Err(ScanError::DecodeError("datum is not a list".to_string())),
    };

    let cid_bytes = match fields.get(1) {
        Some(Cbor::Bytes(b)) => b,
        Some(Cbor::Tag(CID_TAG, inner)) => match inner.as_ref() {
            Cbor::Bytes(b) => b,
            _ => return Err(ScanError::DecodeError("tag 42 without bytes".to_string())),
        },
        Some(_) => {
            return Err(ScanError::DecodeError(
                "second datum field is not a CID".to_string(),
            ));
        }
        None => {
            return Err(ScanError::DecodeError(
                "datum has fewer than two fields".to_string(),
            ));
        }
    };

    decode_cid_bytes(cid_bytes)
        .ok_or_else(|| ScanError::DecodeError("invalid CID bytes in datum".to_string()))
}

pub fn tip_from_utxo(utxo: &RawUtxo) -> std::result::Result<Tip, ScanError> {
    let tx_index = utxo
        .index()
        .ok_or_else(|| ScanError::DecodeError("UTxO has no output index".to_string()))?;
    let datum = utxo
        .inline_datum
        .as_deref()
        .ok_or_else(|| ScanError::DecodeError("UTxO has no inline datum".to_string()))?;
    Ok(Tip {
        tx_hash: utxo.tx_hash.clone(),
        tx_index,
        header_cid: decode_datum(datum)?,
    })
}

/// Everything a finished session produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionOutcome {
    pub epoch: u64,
    #[serde(skip)]
    pub store: GraphStore,
    pub utxo_count: usize,
    pub filtered_out: usize,
    pub tips: Vec<Tip>,
    /// UTxOs dropped because their datum could not be turned into a tip.
    pub skipped: Vec<BranchFailure>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utxo_error: Option<String>,
    pub summary: MaterializeSummary,
}

impl SessionOutcome {
    fn new(epoch: u64) -> Self {
        Self {
            epoch,
            ..Default::default()
        }
    }

    pub fn is_superseded(&self) -> bool {
        self.summary.superseded
    }

    /// How the session ends up recorded. A failed UTxO listing leaves
    /// nothing to explore, so it marks the whole session failed; pruned
    /// branches do not.
    pub fn status(&self) -> SessionStatus {
        if self.is_superseded() {
            SessionStatus::Superseded
        } else if self.utxo_error.is_some() {
            SessionStatus::Failed
        } else {
            SessionStatus::Completed
        }
    }

    pub fn failure_count(&self) -> usize {
        self.skipped.len() + self.summary.failures.len() + usize::from(self.utxo_error.is_some())
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            utxo_count: self.utxo_count,
            tip_count: self.tips.len(),
            node_count: self.store.node_count(),
            edge_count: self.store.edge_count(),
            failure_count: self.failure_count(),
        }
    }
}

type Sources = (Arc<dyn UtxoSource>, Arc<dyn BlockSource>);

/// Blockfrost and gateway clients for `config`, after checking every
/// required setting.
fn http_sources(config: &ExplorerConfig, timeout: Option<Duration>) -> Result<Sources> {
    config.validate_for_fetch()?;
    let utxo_source =
        BlockfrostClient::new(&config.blockfrost_url, &config.blockfrost_token, timeout)?;
    let block_source = GatewayClient::new(&config.ipfs_gateway, timeout)?;
    Ok((Arc::new(utxo_source), Arc::new(block_source)))
}

/// Runs sessions against a pair of sources.
pub struct SessionDriver {
    config: ExplorerConfig,
    utxo_source: Arc<dyn UtxoSource>,
    block_source: Arc<dyn BlockSource>,
    /// Set when the sources are HTTP clients built from `config`; holds
    /// their request timeout so they can be rebuilt.
    http_timeout: Option<Option<Duration>>,
    epoch: SessionEpoch,
    max_in_flight: usize,
    progress_callback: Option<ProgressCallback>,
    failure_callback: Option<FailureCallback>,
}

impl SessionDriver {
    /// Checks every required setting, then builds the HTTP clients.
    pub fn from_config(config: ExplorerConfig, timeout: Option<Duration>) -> Result<Self> {
        let (utxo_source, block_source) = http_sources(&config, timeout)?;
        let mut driver = Self::with_sources(config, utxo_source, block_source);
        driver.http_timeout = Some(timeout);
        Ok(driver)
    }

    pub fn with_sources(
        config: ExplorerConfig,
        utxo_source: Arc<dyn UtxoSource>,
        block_source: Arc<dyn BlockSource>,
    ) -> Self {
        Self {
            config,
            utxo_source,
            block_source,
            http_timeout: None,
            epoch: SessionEpoch::new(),
            max_in_flight: dagscope_scanner::materializer::DEFAULT_MAX_IN_FLIGHT,
            progress_callback: None,
            failure_callback: None,
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn with_failure_callback(mut self, callback: FailureCallback) -> Self {
        self.failure_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    /// Shared handle; advancing it supersedes any running session.
    pub fn epoch(&self) -> SessionEpoch {
        self.epoch.clone()
    }

    /// Abandons the current session. Results still in flight are discarded.
    pub fn reset(&self) -> u64 {
        let epoch = self.epoch.advance();
        info!("Session reset, now at epoch {}", epoch);
        epoch
    }

    /// Swaps in a new configuration, resetting when a root input changed.
    /// HTTP clients built by [`SessionDriver::from_config`] are rebuilt
    /// against the new endpoints and token. Returns whether a reset happened.
    ///
    /// On error the driver keeps its previous configuration.
    pub fn apply_config(&mut self, config: ExplorerConfig) -> Result<bool> {
        let changed = self.config.root_inputs_differ(&config);
        if changed && let Some(timeout) = self.http_timeout {
            let (utxo_source, block_source) = http_sources(&config, timeout)?;
            self.utxo_source = utxo_source;
            self.block_source = block_source;
        }
        self.config = config;
        if changed {
            self.reset();
        }
        Ok(changed)
    }

    fn materializer(&self, guard: EpochGuard) -> Materializer {
        let mut materializer = Materializer::new(self.block_source.clone())
            .with_depth_limit(self.config.level_limit)
            .with_max_in_flight(self.max_in_flight)
            .with_epoch_guard(guard);
        if let Some(callback) = &self.progress_callback {
            materializer = materializer.with_progress_callback(callback.clone());
        }
        if let Some(callback) = &self.failure_callback {
            materializer = materializer.with_failure_callback(callback.clone());
        }
        materializer
    }

    /// Lists UTxOs at the script address, keeps those holding the filter
    /// token and materializes the chain behind each one.
    ///
    /// A failed UTxO listing is recorded on the outcome and leaves the graph
    /// empty. A UTxO with an unusable datum is skipped.
    pub async fn run(&self) -> SessionOutcome {
        let guard = self.epoch.guard();
        let mut outcome = SessionOutcome::new(guard.epoch());

        let listing = guard
            .or_superseded(self.utxo_source.fetch_utxos(&self.config.script_address))
            .await;
        let utxos = match listing {
            None => {
                outcome.summary.superseded = true;
                return outcome;
            }
            Some(Ok(utxos)) => utxos,
            Some(Err(e)) => {
                warn!("Failed to list UTxOs: {}", e);
                outcome.utxo_error = Some(e.to_string());
                Vec::new()
            }
        };
        outcome.utxo_count = utxos.len();

        let kept = filter_utxos(utxos, &self.config.filter_token);
        outcome.filtered_out = outcome.utxo_count - kept.len();

        for utxo in &kept {
            match tip_from_utxo(utxo) {
                Ok(tip) => outcome.tips.push(tip),
                Err(e) => {
                    let failure = BranchFailure {
                        id: utxo_identifier(&utxo.tx_hash, utxo.index().unwrap_or_default()),
                        reason: e.to_string(),
                    };
                    warn!("Skipping UTxO {}: {}", failure.id, failure.reason);
                    if let Some(callback) = &self.failure_callback {
                        callback(&failure);
                    }
                    outcome.skipped.push(failure);
                }
            }
        }

        if !guard.is_current() {
            outcome.summary.superseded = true;
            return outcome;
        }

        let materializer = self.materializer(guard);
        outcome.summary = materializer
            .materialize(&mut outcome.store, &outcome.tips)
            .await;
        outcome
    }
}

/// Materializes the chain behind a single header identifier, without a
/// UTxO listing.
pub async fn walk_from_header(materializer: &Materializer, id: &str) -> SessionOutcome {
    let mut outcome = SessionOutcome::default();
    let (_, summary) = materializer
        .add_block(&mut outcome.store, &Value::String(id.to_string()))
        .await;
    outcome.summary = summary;
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use cid::Cid;
    use cid::multihash::Multihash;

    fn sample_cid(seed: u8) -> Cid {
        Cid::new_v1(0x71, Multihash::<64>::wrap(0x12, &[seed; 32]).unwrap())
    }

    fn datum_hex(fields: Vec<Cbor>) -> String {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(&Cbor::Array(fields), &mut buf).unwrap();
        hex::encode(buf)
    }

    fn credential() -> Cbor {
        Cbor::Tag(121, Box::new(Cbor::Array(vec![Cbor::Bytes(vec![7; 28])])))
    }

    fn utxo(hash: &str, units: &[&str]) -> RawUtxo {
        RawUtxo {
            tx_hash: hash.to_string(),
            tx_index: Some(0),
            output_index: Some(0),
            amount: units
                .iter()
                .map(|u| dagscope_scanner::blockfrost::Amount {
                    unit: u.to_string(),
                    quantity: "1".to_string(),
                })
                .collect(),
            inline_datum: None,
            data_hash: None,
        }
    }

    #[test]
    fn test_decode_datum_raw_bytes() {
        let cid = sample_cid(1);
        let hex = datum_hex(vec![credential(), Cbor::Bytes(cid.to_bytes())]);
        assert_eq!(decode_datum(&hex).unwrap(), cid.to_string());
    }

    #[test]
    fn test_decode_datum_tag42_link() {
        let cid = sample_cid(2);
        let mut bytes = vec![0u8];
        bytes.extend(cid.to_bytes());
        let hex = datum_hex(vec![
            credential(),
            Cbor::Tag(CID_TAG, Box::new(Cbor::Bytes(bytes))),
        ]);
        assert_eq!(decode_datum(&hex).unwrap(), cid.to_string());
    }

    #[test]
    fn test_decode_datum_rejects_garbage() {
        assert!(decode_datum("zz").is_err());
        assert!(decode_datum(&datum_hex(vec![credential()])).is_err());
        assert!(decode_datum(&datum_hex(vec![credential(), Cbor::Text("x".into())])).is_err());
        assert!(decode_datum(&datum_hex(vec![credential(), Cbor::Bytes(vec![1, 2, 3])])).is_err());
    }

    #[test]
    fn test_filter_utxos() {
        let utxos = vec![utxo("a", &["lovelace", "tok"]), utxo("b", &["lovelace"])];

        let kept = filter_utxos(utxos.clone(), "tok");
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].tx_hash, "a");

        assert_eq!(filter_utxos(utxos, "").len(), 2);
    }

    #[test]
    fn test_tip_from_utxo_requires_datum() {
        let mut u = utxo("a", &[]);
        assert!(tip_from_utxo(&u).is_err());

        let cid = sample_cid(3);
        u.inline_datum = Some(datum_hex(vec![credential(), Cbor::Bytes(cid.to_bytes())]));
        let tip = tip_from_utxo(&u).unwrap();
        assert_eq!(tip.utxo_id(), "a#0");
        assert_eq!(tip.header_cid, cid.to_string());
    }
}
