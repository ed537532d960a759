pub mod blockfrost;
pub mod client;
pub mod document;
pub mod epoch;
pub mod error;
pub mod gateway;
pub mod graph;
pub mod identifier;
pub mod materializer;
pub mod source;

pub use blockfrost::{BlockfrostClient, RawUtxo};
pub use document::{Document, HeaderView};
pub use epoch::{EpochGuard, SessionEpoch};
pub use error::{ConfigError, GraphError, ScanError};
pub use gateway::GatewayClient;
pub use graph::{Edge, EdgeKind, GraphStore, Node, NodeKind};
pub use identifier::{Identifier, extract_identifier};
pub use materializer::{
    BranchFailure, FailureCallback, MaterializeSummary, Materializer, ProgressCallback, Tip,
};
pub use source::{BlockSource, UtxoSource};
