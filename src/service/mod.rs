//! Node operations on top of a store: the translate-then-query contract,
//! validated updates, regression creation and timeout handling

use crate::core::error::ModelError;
use crate::core::ids::ObjectId;
use crate::core::node::{Hierarchy, Node, Regression, TypedNode};
use crate::core::schema::Schema;
use crate::core::state::StateValue;
use crate::core::timestamp::format_timestamp;
use crate::persistence::{NodeStore, StoreError};
use crate::query::{Condition, FilterValue};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Errors from service operations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Node not found: {0}")]
    NotFound(ObjectId),

    #[error("Node update requires an id")]
    MissingId,

    #[error("Cannot update node {id}: {reason}")]
    TransitionRejected { id: ObjectId, reason: String },

    /// The regression was stored but the failing node still lacks its
    /// link; retry with [`NodeService::link_regression`]
    #[error("Regression {regression} stored but node {node} was not linked to it: {source}")]
    RegressionUnlinked {
        regression: ObjectId,
        node: ObjectId,
        source: StoreError,
    },
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// Node service backed by a [`NodeStore`]
pub struct NodeService {
    store: Arc<dyn NodeStore>,
    schema: Schema,
}

impl NodeService {
    pub fn new(store: Arc<dyn NodeStore>, schema: Schema) -> Self {
        Self { store, schema }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    async fn fetch(&self, id: ObjectId) -> Result<Value> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(ServiceError::NotFound(id))
    }

    /// Fetch a node and validate it into its kind
    pub async fn get_node(&self, id: ObjectId) -> Result<TypedNode> {
        let doc = self.fetch(id).await?;
        Ok(self.schema.parse_node(&doc)?)
    }

    /// Translate filter parameters and query the store. When `kind` is
    /// given only nodes of that kind are returned.
    pub async fn find_nodes<I, K>(&self, kind: Option<&str>, params: I) -> Result<Vec<TypedNode>>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut filter = self.schema.translate(kind, params)?;
        if let Some(kind) = kind {
            if filter.get("kind").is_none() {
                filter.insert("kind", Condition::Eq(FilterValue::Text(kind.to_string())));
            }
        }
        debug!("Querying nodes: {}", filter);

        let docs = self.store.find(&filter).await?;
        let mut nodes = Vec::with_capacity(docs.len());
        for doc in &docs {
            nodes.push(self.schema.parse_node(doc)?);
        }
        Ok(nodes)
    }

    /// Validate and store a new node
    pub async fn submit_node(&self, doc: &Value) -> Result<TypedNode> {
        let mut node = self.schema.parse_node(doc)?;
        let id = self.store.insert(node.to_document(true)?).await?;
        node.set_id(id);
        info!("Created {} node {} ({})", node.kind(), id, node.name());
        Ok(node)
    }

    /// Validate an update, check the state transition against the stored
    /// node and commit it
    pub async fn submit_update(&self, doc: &Value) -> Result<TypedNode> {
        let mut node = self.schema.parse_node(doc)?;
        let id = node.id().ok_or(ServiceError::MissingId)?;
        let current = self.get_node(id).await?;

        let check = current.validate_node_state_transition(node.state());
        if !check.allowed {
            warn!("Rejected update of node {}: {}", id, check.reason);
            return Err(ServiceError::TransitionRejected {
                id,
                reason: check.reason,
            });
        }
        debug!("Node {}: {}", id, check.reason);

        node.touch(self.schema.clock());
        let explicit = doc
            .as_object()
            .map(|map| map.contains_key("processed_by_kcidb_bridge"))
            .unwrap_or(false);
        if !explicit {
            node.set_processed_by_kcidb_bridge(false);
        }

        self.store.update(id, node.to_document(true)?).await?;
        info!("Updated node {} ({} -> {})", id, current.state(), node.state());
        Ok(node)
    }

    /// Build a regression from two stored nodes, store it and link the
    /// failing node to it
    ///
    /// The two writes are not atomic. When the link cannot be written the
    /// regression stays stored and [`ServiceError::RegressionUnlinked`]
    /// names both nodes.
    pub async fn create_regression(&self, fail_id: ObjectId, pass_id: ObjectId) -> Result<Regression> {
        let fail = self.get_node(fail_id).await?;
        let pass = self.get_node(pass_id).await?;

        let mut regression = self
            .schema
            .create_regression(&fail, &pass)
            .map_err(ModelError::from)?;
        let id = self.store.insert(regression.to_document(true)?).await?;
        regression.id = Some(id);

        if let Err(e) = self.write_link(fail, id).await {
            warn!("Regression {} stored without a link from node {}: {}", id, fail_id, e);
            return Err(match e {
                ServiceError::Store(source) => ServiceError::RegressionUnlinked {
                    regression: id,
                    node: fail_id,
                    source,
                },
                other => other,
            });
        }

        info!("Created regression {} for node {}", id, fail_id);
        Ok(regression)
    }

    /// Point a stored node's `data.regression` at `regression`
    pub async fn link_regression(&self, node_id: ObjectId, regression: ObjectId) -> Result<()> {
        let node = self.get_node(node_id).await?;
        self.write_link(node, regression).await
    }

    async fn write_link(&self, mut node: TypedNode, regression: ObjectId) -> Result<()> {
        let Some(id) = node.id() else {
            return Err(ServiceError::MissingId);
        };
        if node.set_regression(regression) {
            node.touch(self.schema.clock());
            self.store.update(id, node.to_document(true)?).await?;
            debug!("Linked node {} to regression {}", id, regression);
        }
        Ok(())
    }

    /// Force every node past its timeout to done. Returns the ids of the
    /// expired nodes.
    pub async fn expire_timed_out(&self) -> Result<Vec<ObjectId>> {
        let now = self.schema.now();
        let params = vec![
            ("state__ne", json!(StateValue::Done.as_str())),
            ("timeout__lt", json!(format_timestamp(&now))),
        ];

        let mut expired = Vec::new();
        for mut node in self.find_nodes(None, params).await? {
            let Some(id) = node.id() else {
                continue;
            };
            let check = node.validate_node_state_transition(StateValue::Done);
            if !check.allowed {
                warn!("Not expiring node {}: {}", id, check.reason);
                continue;
            }

            node.mark_timed_out(now);
            self.store.update(id, node.to_document(true)?).await?;
            expired.push(id);
        }

        if !expired.is_empty() {
            info!("Expired {} timed out nodes", expired.len());
        }
        Ok(expired)
    }

    /// Fetch a node and all of its descendants
    pub async fn get_hierarchy(&self, id: ObjectId) -> Result<Hierarchy> {
        let root = self.schema.parse_generic(&self.fetch(id).await?)?;

        let mut descendants: Vec<Node> = Vec::new();
        let mut queue = VecDeque::from([id]);
        while let Some(parent) = queue.pop_front() {
            let filter = self
                .schema
                .translate(None, vec![("parent", json!(parent.to_hex()))])?;
            for doc in self.store.find(&filter).await? {
                let child = self.schema.parse_generic(&doc)?;
                if let Some(child_id) = child.id {
                    if child_id != id && !descendants.iter().any(|n| n.id == Some(child_id)) {
                        queue.push_back(child_id);
                        descendants.push(child);
                    }
                }
            }
        }

        Ok(Hierarchy::build(root, &descendants))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::{FixedClock, ModelConfig};
    use crate::persistence::InMemoryNodeStore;
    use chrono::{TimeZone, Utc};

    fn service() -> NodeService {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        NodeService::new(
            Arc::new(InMemoryNodeStore::new()),
            Schema::new(ModelConfig::default(), Arc::new(clock)),
        )
    }

    #[tokio::test]
    async fn test_submit_and_get() {
        let service = service();
        let node = service
            .submit_node(&json!({"kind": "checkout", "name": "checkout", "path": ["checkout"]}))
            .await
            .unwrap();
        let id = node.id().unwrap();

        let fetched = service.get_node(id).await.unwrap();
        assert_eq!(fetched, node);
        assert!(matches!(
            service.get_node(ObjectId::generate()).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_rejects_illegal_transition() {
        let service = service();
        let node = service
            .submit_node(&json!({"kind": "checkout", "name": "checkout", "path": ["checkout"], "state": "done"}))
            .await
            .unwrap();

        let mut doc = node.to_document(true).unwrap();
        doc["state"] = json!("running");
        let err = service.submit_update(&doc).await.unwrap_err();
        assert!(matches!(err, ServiceError::TransitionRejected { .. }));
        assert!(err.to_string().contains("from state done to state running"));
    }

    #[tokio::test]
    async fn test_update_resets_bridge_flag() {
        let service = service();
        let node = service
            .submit_node(&json!({
                "kind": "checkout", "name": "checkout", "path": ["checkout"],
                "processed_by_kcidb_bridge": true
            }))
            .await
            .unwrap();
        assert!(node.processed_by_kcidb_bridge());

        let mut doc = node.to_document(true).unwrap();
        doc.as_object_mut().unwrap().remove("processed_by_kcidb_bridge");
        doc["state"] = json!("available");
        let updated = service.submit_update(&doc).await.unwrap();
        assert!(!updated.processed_by_kcidb_bridge());
        assert_eq!(updated.state(), StateValue::Available);

        let mut doc = updated.to_document(true).unwrap();
        doc["processed_by_kcidb_bridge"] = json!(true);
        let updated = service.submit_update(&doc).await.unwrap();
        assert!(updated.processed_by_kcidb_bridge());
    }

    #[tokio::test]
    async fn test_update_requires_id() {
        let err = service()
            .submit_update(&json!({"kind": "checkout", "name": "c", "path": ["c"]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MissingId));
    }

    /// Store that refuses every update
    struct ReadOnlyStore(InMemoryNodeStore);

    #[async_trait::async_trait]
    impl NodeStore for ReadOnlyStore {
        async fn find_by_id(&self, id: ObjectId) -> std::result::Result<Option<Value>, StoreError> {
            self.0.find_by_id(id).await
        }

        async fn find(&self, filter: &crate::query::Filter) -> std::result::Result<Vec<Value>, StoreError> {
            self.0.find(filter).await
        }

        async fn insert(&self, doc: Value) -> std::result::Result<ObjectId, StoreError> {
            self.0.insert(doc).await
        }

        async fn update(&self, id: ObjectId, _doc: Value) -> std::result::Result<(), StoreError> {
            Err(StoreError::NotFound(id))
        }
    }

    fn test_doc(result: &str, created: &str) -> Value {
        json!({
            "kind": "test", "name": "baseline.login", "path": ["checkout", "baseline", "login"],
            "group": "baseline", "state": "done", "result": result, "created": created,
            "data": {"arch": "x86_64", "compiler": "gcc-12", "platform": "qemu-x86"}
        })
    }

    #[tokio::test]
    async fn test_unlinked_regression_is_reported() {
        let store = Arc::new(ReadOnlyStore(InMemoryNodeStore::new()));
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
        let service = NodeService::new(
            store.clone(),
            Schema::new(ModelConfig::default(), Arc::new(clock)),
        );

        let pass = service.submit_node(&test_doc("pass", "2024-04-29T10:00:00Z")).await.unwrap();
        let fail = service.submit_node(&test_doc("fail", "2024-04-30T10:00:00Z")).await.unwrap();
        let fail_id = fail.id().unwrap();

        let err = service
            .create_regression(fail_id, pass.id().unwrap())
            .await
            .unwrap_err();
        let ServiceError::RegressionUnlinked { regression, node, .. } = err else {
            panic!("expected an unlinked regression, got {:?}", err);
        };
        assert_eq!(node, fail_id);
        assert!(store.0.find_by_id(regression).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_link_regression_retries_the_link() {
        let service = service();
        let fail = service.submit_node(&test_doc("fail", "2024-04-30T10:00:00Z")).await.unwrap();
        let fail_id = fail.id().unwrap();
        let regression = ObjectId::generate();

        service.link_regression(fail_id, regression).await.unwrap();
        let TypedNode::Test(linked) = service.get_node(fail_id).await.unwrap() else {
            panic!("expected a test node");
        };
        assert_eq!(linked.data.regression, Some(regression));
    }

    #[tokio::test]
    async fn test_hierarchy() {
        let service = service();
        let root = service
            .submit_node(&json!({"kind": "checkout", "name": "checkout", "path": ["checkout"]}))
            .await
            .unwrap();
        let root_id = root.id().unwrap();
        let build = service
            .submit_node(&json!({
                "kind": "kbuild", "name": "kbuild", "path": ["checkout", "kbuild"],
                "parent": root_id.to_hex()
            }))
            .await
            .unwrap();
        service
            .submit_node(&json!({
                "kind": "test", "name": "baseline", "path": ["checkout", "kbuild", "baseline"],
                "parent": build.id().unwrap().to_hex()
            }))
            .await
            .unwrap();

        let tree = service.get_hierarchy(root_id).await.unwrap();
        assert_eq!(tree.node_count(), 3);
        assert_eq!(tree.child_nodes[0].child_nodes[0].node.name, "baseline");
    }
}
