use dagscope_scanner::ConfigError;
use dagscope_scanner::client::ensure_trailing_slash;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_SCRIPT_ADDRESS: &str = "addr1w8lyu0uj30gyytukg25ynfypvqlw7tt4duuu7lqd09qrnugm34xp8";
pub const DEFAULT_FILTER_TOKEN: &str =
    "30135f08305143796de4276083cc54e47fbcafb176df6b58ab3094464e6163617467756e6d61";
pub const DEFAULT_BLOCKFROST_URL: &str = "https://cardano-mainnet.blockfrost.io/api/v0/";
pub const DEFAULT_IPFS_GATEWAY: &str = "https://ipfs.io/";
pub const DEFAULT_IPLD_EXPLORER: &str = "https://explore.ipld.io/#/explore/";
pub const DEFAULT_CARDANO_EXPLORER: &str = "https://cardanoscan.io/";
pub const DEFAULT_LEVEL_LIMIT: usize = 100;

/// Persisted configuration keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    ScriptAddress,
    FilterToken,
    BlockfrostUrl,
    BlockfrostToken,
    IpfsGateway,
    IpldExplorer,
    CardanoExplorer,
    LevelLimit,
}

impl SettingKey {
    pub const ALL: [SettingKey; 8] = [
        SettingKey::ScriptAddress,
        SettingKey::FilterToken,
        SettingKey::BlockfrostUrl,
        SettingKey::BlockfrostToken,
        SettingKey::IpfsGateway,
        SettingKey::IpldExplorer,
        SettingKey::CardanoExplorer,
        SettingKey::LevelLimit,
    ];

    /// Name used in the settings table.
    pub fn storage_key(&self) -> &'static str {
        match self {
            SettingKey::ScriptAddress => "scriptAddress",
            SettingKey::FilterToken => "filterToken",
            SettingKey::BlockfrostUrl => "blockfrostUrl",
            SettingKey::BlockfrostToken => "blockfrostToken",
            SettingKey::IpfsGateway => "ipfsGateway",
            SettingKey::IpldExplorer => "ipldExplorer",
            SettingKey::CardanoExplorer => "cardanoExplorer",
            SettingKey::LevelLimit => "levelLimit",
        }
    }

    pub fn cli_name(&self) -> &'static str {
        match self {
            SettingKey::ScriptAddress => "script-address",
            SettingKey::FilterToken => "filter-token",
            SettingKey::BlockfrostUrl => "blockfrost-url",
            SettingKey::BlockfrostToken => "blockfrost-token",
            SettingKey::IpfsGateway => "ipfs-gateway",
            SettingKey::IpldExplorer => "ipld-explorer",
            SettingKey::CardanoExplorer => "cardano-explorer",
            SettingKey::LevelLimit => "level-limit",
        }
    }

    pub fn default_value(&self) -> Option<String> {
        match self {
            SettingKey::ScriptAddress => Some(DEFAULT_SCRIPT_ADDRESS.to_string()),
            SettingKey::FilterToken => Some(DEFAULT_FILTER_TOKEN.to_string()),
            SettingKey::BlockfrostUrl => Some(DEFAULT_BLOCKFROST_URL.to_string()),
            SettingKey::BlockfrostToken => None,
            SettingKey::IpfsGateway => Some(DEFAULT_IPFS_GATEWAY.to_string()),
            SettingKey::IpldExplorer => Some(DEFAULT_IPLD_EXPLORER.to_string()),
            SettingKey::CardanoExplorer => Some(DEFAULT_CARDANO_EXPLORER.to_string()),
            SettingKey::LevelLimit => Some(DEFAULT_LEVEL_LIMIT.to_string()),
        }
    }

    /// Changing a root input invalidates the current graph.
    pub fn is_root_input(&self) -> bool {
        matches!(
            self,
            SettingKey::ScriptAddress
                | SettingKey::FilterToken
                | SettingKey::BlockfrostUrl
                | SettingKey::BlockfrostToken
                | SettingKey::IpfsGateway
        )
    }

    pub fn is_secret(&self) -> bool {
        matches!(self, SettingKey::BlockfrostToken)
    }
}

impl FromStr for SettingKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .into_iter()
            .find(|k| k.storage_key() == s || k.cli_name() == s)
            .ok_or_else(|| ConfigError::UnknownKey(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerConfig {
    pub script_address: String,
    pub filter_token: String,
    pub blockfrost_url: String,
    pub blockfrost_token: String,
    pub ipfs_gateway: String,
    pub ipld_explorer: String,
    pub cardano_explorer: String,
    pub level_limit: usize,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            script_address: DEFAULT_SCRIPT_ADDRESS.to_string(),
            filter_token: DEFAULT_FILTER_TOKEN.to_string(),
            blockfrost_url: DEFAULT_BLOCKFROST_URL.to_string(),
            blockfrost_token: String::new(),
            ipfs_gateway: DEFAULT_IPFS_GATEWAY.to_string(),
            ipld_explorer: DEFAULT_IPLD_EXPLORER.to_string(),
            cardano_explorer: DEFAULT_CARDANO_EXPLORER.to_string(),
            level_limit: DEFAULT_LEVEL_LIMIT,
        }
    }
}

impl ExplorerConfig {
    /// Builds a configuration from stored pairs layered over the defaults.
    /// Unknown keys are ignored.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Self::default();
        for (key, value) in pairs {
            match key.parse::<SettingKey>() {
                Ok(key) => config.set(key, &value)?,
                Err(_) => tracing::warn!("Ignoring unknown setting {}", key),
            }
        }
        Ok(config)
    }

    pub fn get(&self, key: SettingKey) -> String {
        match key {
            SettingKey::ScriptAddress => self.script_address.clone(),
            SettingKey::FilterToken => self.filter_token.clone(),
            SettingKey::BlockfrostUrl => self.blockfrost_url.clone(),
            SettingKey::BlockfrostToken => self.blockfrost_token.clone(),
            SettingKey::IpfsGateway => self.ipfs_gateway.clone(),
            SettingKey::IpldExplorer => self.ipld_explorer.clone(),
            SettingKey::CardanoExplorer => self.cardano_explorer.clone(),
            SettingKey::LevelLimit => self.level_limit.to_string(),
        }
    }

    pub fn set(&mut self, key: SettingKey, value: &str) -> Result<(), ConfigError> {
        let value = value.trim().to_string();
        match key {
            SettingKey::ScriptAddress => self.script_address = value,
            SettingKey::FilterToken => self.filter_token = value,
            SettingKey::BlockfrostUrl => self.blockfrost_url = value,
            SettingKey::BlockfrostToken => self.blockfrost_token = value,
            SettingKey::IpfsGateway => self.ipfs_gateway = value,
            SettingKey::IpldExplorer => self.ipld_explorer = value,
            SettingKey::CardanoExplorer => self.cardano_explorer = value,
            SettingKey::LevelLimit => {
                self.level_limit = value.parse().map_err(|_| ConfigError::Invalid {
                    key: key.storage_key().to_string(),
                    reason: format!("'{}' is not a non-negative integer", value),
                })?
            }
        }
        Ok(())
    }

    /// Reverts a key to its default.
    pub fn unset(&mut self, key: SettingKey) {
        let defaults = Self::default();
        match key {
            SettingKey::ScriptAddress => self.script_address = defaults.script_address,
            SettingKey::FilterToken => self.filter_token = defaults.filter_token,
            SettingKey::BlockfrostUrl => self.blockfrost_url = defaults.blockfrost_url,
            SettingKey::BlockfrostToken => self.blockfrost_token = defaults.blockfrost_token,
            SettingKey::IpfsGateway => self.ipfs_gateway = defaults.ipfs_gateway,
            SettingKey::IpldExplorer => self.ipld_explorer = defaults.ipld_explorer,
            SettingKey::CardanoExplorer => self.cardano_explorer = defaults.cardano_explorer,
            SettingKey::LevelLimit => self.level_limit = defaults.level_limit,
        }
    }

    /// Every required field for a fetch, checked in the order an operator
    /// would fix them.
    pub fn validate_for_fetch(&self) -> Result<(), ConfigError> {
        let required = [
            (&self.blockfrost_token, "Blockfrost token"),
            (&self.blockfrost_url, "Blockfrost URL"),
            (&self.script_address, "script address"),
            (&self.ipfs_gateway, "IPFS gateway URL"),
        ];
        for (value, what) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing(what));
            }
        }
        Ok(())
    }

    /// Whether switching from `self` to `other` requires a fresh graph.
    pub fn root_inputs_differ(&self, other: &ExplorerConfig) -> bool {
        SettingKey::ALL
            .into_iter()
            .filter(SettingKey::is_root_input)
            .any(|key| self.get(key) != other.get(key))
    }

    pub fn ipld_explorer_base(&self) -> String {
        ensure_trailing_slash(&self.ipld_explorer)
    }

    pub fn cardano_explorer_base(&self) -> String {
        ensure_trailing_slash(&self.cardano_explorer)
    }
}
