use crate::document::{Document, HeaderView};
use crate::epoch::EpochGuard;
use crate::error::Result;
use crate::graph::{EdgeKind, GraphStore, Node, NodeKind};
use crate::identifier::{Identifier, extract_identifier, utxo_identifier};
use crate::source::BlockSource;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

pub const DEFAULT_DEPTH_LIMIT: usize = 100;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 16;

/// Called with the running count of fetched headers and the latest id.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;
pub type FailureCallback = Arc<dyn Fn(&BranchFailure) + Send + Sync>;

/// A UTxO whose inline datum names a root header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tip {
    pub tx_hash: String,
    pub tx_index: u32,
    pub header_cid: Identifier,
}

impl Tip {
    pub fn utxo_id(&self) -> Identifier {
        utxo_identifier(&self.tx_hash, self.tx_index)
    }
}

/// A subtree that was pruned, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFailure {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterializeSummary {
    /// Root header ids reached from UTxOs, in seeding order.
    pub roots: Vec<Identifier>,
    /// Header documents fetched and applied.
    pub fetched: usize,
    /// Headers with children left unexpanded because of the depth ceiling.
    pub depth_limited: usize,
    pub failures: Vec<BranchFailure>,
    /// The session was reset while this traversal was running.
    pub superseded: bool,
}

/// Resolves header/body chains from root identifiers into a [`GraphStore`].
///
/// Fetches run as tasks fed from a work queue. The depth ceiling is checked
/// before a child is queued, and at most `max_in_flight` fetches are
/// outstanding at once. Results are applied to the store by the driving
/// loop, so inserts never race.
pub struct Materializer {
    source: Arc<dyn BlockSource>,
    depth_limit: usize,
    max_in_flight: usize,
    progress_callback: Option<ProgressCallback>,
    failure_callback: Option<FailureCallback>,
    epoch: Option<EpochGuard>,
}

impl Materializer {
    pub fn new(source: Arc<dyn BlockSource>) -> Self {
        Self {
            source,
            depth_limit: DEFAULT_DEPTH_LIMIT,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            progress_callback: None,
            failure_callback: None,
            epoch: None,
        }
    }

    pub fn with_depth_limit(mut self, depth_limit: usize) -> Self {
        self.depth_limit = depth_limit;
        self
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

    pub fn with_epoch_guard(mut self, guard: EpochGuard) -> Self {
        self.epoch = Some(guard);
        self
    }

    pub fn depth_limit(&self) -> usize {
        self.depth_limit
    }

    /// Materializes a single header reference. Returns its identifier, or
    /// `None` when the reference is malformed.
    pub async fn add_block(
        &self,
        store: &mut GraphStore,
        header_ref: &Value,
    ) -> (Option<Identifier>, MaterializeSummary) {
        let mut traversal = Traversal::new(self, store);
        let id = traversal.seed_block(header_ref);
        (id, traversal.run().await)
    }

    /// Adds the UTxO node, links it to its root header and materializes the
    /// chain behind it.
    pub async fn add_utxo(&self, store: &mut GraphStore, tip: &Tip) -> MaterializeSummary {
        self.materialize(store, std::slice::from_ref(tip)).await
    }

    /// Materializes every tip in one shared traversal.
    pub async fn materialize(&self, store: &mut GraphStore, tips: &[Tip]) -> MaterializeSummary {
        let mut traversal = Traversal::new(self, store);
        for tip in tips {
            traversal.seed_utxo(tip);
        }
        let summary = traversal.run().await;
        info!(
            "Materialized {} headers from {} tips ({} failures)",
            summary.fetched,
            tips.len(),
            summary.failures.len()
        );
        summary
    }

    fn is_current(&self) -> bool {
        self.epoch.as_ref().map(EpochGuard::is_current).unwrap_or(true)
    }

    /// `None` when the session was reset before `work` finished.
    async fn until_superseded<F: Future>(&self, work: F) -> Option<F::Output> {
        match &self.epoch {
            Some(guard) => guard.or_superseded(work).await,
            None => Some(work.await),
        }
    }
}

struct Traversal<'a> {
    materializer: &'a Materializer,
    store: &'a mut GraphStore,
    queue: VecDeque<(Identifier, usize)>,
    /// Smallest depth each header has been queued at.
    scheduled: HashMap<Identifier, usize>,
    summary: MaterializeSummary,
}

impl<'a> Traversal<'a> {
    fn new(materializer: &'a Materializer, store: &'a mut GraphStore) -> Self {
        Self {
            materializer,
            store,
            queue: VecDeque::new(),
            scheduled: HashMap::new(),
            summary: MaterializeSummary::default(),
        }
    }

    fn seed_block(&mut self, header_ref: &Value) -> Option<Identifier> {
        let Some(id) = extract_identifier(header_ref) else {
            self.fail("<root>".to_string(), format!("malformed header reference {}", header_ref));
            return None;
        };
        self.store.insert_node(Node::new(id.clone(), NodeKind::Header));
        self.schedule(id.clone(), 0);
        self.summary.roots.push(id.clone());
        Some(id)
    }

    fn seed_utxo(&mut self, tip: &Tip) {
        let utxo_id = tip.utxo_id();
        self.store.insert_node(
            Node::new(utxo_id.clone(), NodeKind::Utxo)
                .with_metadata("tx_hash", Some(&tip.tx_hash))
                .with_metadata("tx_index", Some(&tip.tx_index.to_string())),
        );
        let header_ref = Value::String(tip.header_cid.clone());
        if let Some(header_id) = self.seed_block(&header_ref) {
            self.link(&utxo_id, &header_id, EdgeKind::UtxoLink);
        }
    }

    fn schedule(&mut self, id: Identifier, depth: usize) {
        if let Some(&seen) = self.scheduled.get(&id)
            && seen <= depth
        {
            return;
        }
        self.scheduled.insert(id.clone(), depth);
        self.queue.push_back((id, depth));
    }

    async fn run(mut self) -> MaterializeSummary {
        if !self.materializer.is_current() {
            self.summary.superseded = true;
            return self.summary;
        }

        let mut in_flight: JoinSet<(Identifier, usize, Result<Document>)> = JoinSet::new();

        loop {
            while in_flight.len() < self.materializer.max_in_flight {
                let Some((id, depth)) = self.queue.pop_front() else {
                    break;
                };
                let source = self.materializer.source.clone();
                debug!("Queueing fetch of {} at depth {}", id, depth);
                in_flight.spawn(async move {
                    let result = source.fetch_block(&id).await;
                    (id, depth, result)
                });
            }

            let next = self.materializer.until_superseded(in_flight.join_next()).await;
            let joined = match next {
                Some(Some(joined)) if self.materializer.is_current() => joined,
                Some(None) => break,
                _ => {
                    debug!("Session superseded, aborting {} fetches", in_flight.len());
                    in_flight.abort_all();
                    self.queue.clear();
                    self.summary.superseded = true;
                    break;
                }
            };

            match joined {
                Ok((id, depth, Ok(doc))) => self.apply(id, depth, &doc),
                Ok((id, _, Err(e))) => self.fail(id, e.to_string()),
                Err(e) => self.fail("<task>".to_string(), e.to_string()),
            }
        }

        self.summary
    }

    fn apply(&mut self, id: Identifier, depth: usize, doc: &Document) {
        self.summary.fetched += 1;
        if let Some(ref callback) = self.materializer.progress_callback {
            callback(self.summary.fetched, id.clone());
        }

        let view = HeaderView::new(doc);
        if let Some(issuer) = view.issuer() {
            self.store.annotate(&id, "Issuer", issuer);
        }
        if !view.has_payload() {
            self.fail(id, "header has no Payload".to_string());
            return;
        }
        if let Some(comment) = view.comment() {
            self.store.annotate(&id, "Comment", comment);
        }

        match view.body_id() {
            Some(body_id) => {
                self.store.insert_node(
                    Node::new(body_id.clone(), NodeKind::Body)
                        .with_metadata("Schema", view.schema())
                        .with_metadata("MediaType", view.media_type()),
                );
                self.link(&id, &body_id, EdgeKind::BodyLink);
            }
            None => self.fail(id.clone(), "missing or malformed Body link".to_string()),
        }

        let accept = view.accept();
        let reject = view.reject();
        if depth >= self.materializer.depth_limit {
            if !accept.is_empty() || !reject.is_empty() {
                debug!("Depth limit {} reached at {}", self.materializer.depth_limit, id);
                self.summary.depth_limited += 1;
            }
            return;
        }

        self.link_children(&id, accept, EdgeKind::Accept, depth);
        self.link_children(&id, reject, EdgeKind::Reject, depth);
    }

    fn link_children(&mut self, parent: &str, entries: &[Value], kind: EdgeKind, depth: usize) {
        for entry in entries {
            match extract_identifier(entry) {
                Some(child) => {
                    self.store.insert_node(Node::new(child.clone(), NodeKind::Header));
                    self.link(parent, &child, kind);
                    self.schedule(child, depth + 1);
                }
                None => self.fail(
                    parent.to_string(),
                    format!("malformed {} link {}", kind.as_str(), entry),
                ),
            }
        }
    }

    fn link(&mut self, from: &str, to: &str, kind: EdgeKind) {
        if let Err(e) = self.store.insert_edge(from, to, kind) {
            warn!("{}", e);
        }
    }

    fn fail(&mut self, id: String, reason: String) {
        warn!("Pruned branch at {}: {}", id, reason);
        let failure = BranchFailure { id, reason };
        if let Some(ref callback) = self.materializer.failure_callback {
            callback(&failure);
        }
        self.summary.failures.push(failure);
    }
}
