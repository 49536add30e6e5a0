//! Node entity model

use crate::core::config::Clock;
use crate::core::data::{BuildDescriptors, CheckoutData, KbuildData, NodeData, RegressionData, TestData};
use crate::core::document::{strip_nulls, DataMap, DocReader, UrlKind};
use crate::core::error::{FieldError, ModelError, UnsupportedKindError};
use crate::core::ids::ObjectId;
use crate::core::state::{ResultValue, StateValue, TransitionCheck};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Kind tag of a generic node with a free-form payload
pub const GENERIC_KIND: &str = "node";

/// Concrete node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Checkout,
    Kbuild,
    Test,
    Job,
    Regression,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Checkout,
        NodeKind::Kbuild,
        NodeKind::Test,
        NodeKind::Job,
        NodeKind::Regression,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            NodeKind::Checkout => "checkout",
            NodeKind::Kbuild => "kbuild",
            NodeKind::Test => "test",
            NodeKind::Job => "job",
            NodeKind::Regression => "regression",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for NodeKind {
    type Err = UnsupportedKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == s)
            .ok_or_else(|| UnsupportedKindError { kind: s.to_string() })
    }
}

/// A node in the pipeline hierarchy
///
/// `D` is the payload stored under `data`; generic nodes keep it as a
/// free-form JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node<D = DataMap> {
    /// Store-assigned identifier, absent until the node is saved
    pub id: Option<ObjectId>,
    pub kind: String,
    pub name: String,
    /// Node names from the top-level node down to this one
    pub path: Vec<String>,
    pub group: Option<String>,
    pub parent: Option<ObjectId>,
    pub state: StateValue,
    pub result: Option<ResultValue>,
    /// Artifacts (binaries, logs...) by name
    pub artifacts: BTreeMap<String, String>,
    pub data: D,
    pub debug: DataMap,
    /// Restrict jobs that can be scheduled by this node
    pub jobfilter: Option<Vec<String>>,
    /// Restrict test jobs to specific platforms
    pub platform_filter: Vec<String>,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
    /// Expiry time
    pub timeout: DateTime<Utc>,
    /// Expiry time while in the available state
    pub holdoff: Option<DateTime<Utc>>,
    pub owner: Option<String>,
    /// Hash identifying the submitter token
    pub submitter: Option<String>,
    pub treeid: Option<String>,
    /// Groups allowed to update the node
    pub user_groups: Vec<String>,
    /// Reset on every update unless the update sets it explicitly
    pub processed_by_kcidb_bridge: bool,
}

pub type Checkout = Node<CheckoutData>;
pub type Kbuild = Node<KbuildData>;
pub type Test = Node<TestData>;
pub type Job = Node<TestData>;
pub type Regression = Node<RegressionData>;

/// Time source and timeout offset used to fill server defaults
#[derive(Debug, Clone, Copy)]
pub struct NodeDefaults {
    pub now: DateTime<Utc>,
    pub timeout: Duration,
}

impl NodeDefaults {
    pub fn new(clock: &dyn Clock, timeout: Duration) -> Self {
        Self {
            now: clock.now(),
            timeout,
        }
    }

    /// Default expiry for a node created now, capped at the latest
    /// representable instant
    pub fn timeout_at(&self) -> DateTime<Utc> {
        self.now
            .checked_add_signed(self.timeout)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl<D: NodeData> Node<D> {
    /// Create an unsaved node with server defaults
    pub fn new(kind: &str, name: impl Into<String>, path: Vec<String>, data: D, defaults: NodeDefaults) -> Self {
        Self {
            id: None,
            kind: kind.to_string(),
            name: name.into(),
            path,
            group: None,
            parent: None,
            state: StateValue::Running,
            result: D::DEFAULT_RESULT,
            artifacts: BTreeMap::new(),
            data,
            debug: DataMap::new(),
            jobfilter: None,
            platform_filter: Vec::new(),
            created: defaults.now,
            updated: defaults.now,
            timeout: defaults.timeout_at(),
            holdoff: None,
            owner: None,
            submitter: None,
            treeid: None,
            user_groups: Vec::new(),
            processed_by_kcidb_bridge: false,
        }
    }

    /// Read and validate a node document. `expected_kind` pins the kind
    /// tag; generic nodes accept any tag and default it to `node`.
    pub(crate) fn from_document(
        doc: &DataMap,
        expected_kind: Option<&str>,
        defaults: NodeDefaults,
    ) -> Result<Self, Vec<FieldError>> {
        let mut errors = Vec::new();
        let mut reader = DocReader::new(doc, "", &mut errors);

        let id = match reader.get("id") {
            Some(_) => reader.object_id("id"),
            None => reader.object_id("_id"),
        };
        let kind: String = reader
            .optional("kind")
            .unwrap_or_else(|| expected_kind.unwrap_or(GENERIC_KIND).to_string());
        if let Some(expected) = expected_kind {
            if kind != expected {
                reader.error("kind", format!("expected '{}', got '{}'", expected, kind));
            }
        }

        let name: Option<String> = reader.required("name");
        let path: Option<Vec<String>> = reader.required("path");
        let group = reader.optional("group");
        let parent = reader.object_id("parent");
        let state = reader.optional("state").unwrap_or(StateValue::Running);
        // An explicit null keeps the result unset; only a missing key
        // takes the kind's default
        let result = if doc.contains_key("result") {
            reader.optional("result")
        } else {
            D::DEFAULT_RESULT
        };

        let artifacts: BTreeMap<String, String> = reader.or_default("artifacts");
        for (artifact, url) in &artifacts {
            if let Err(e) = crate::core::document::check_url(url, UrlKind::Http) {
                reader.error(&format!("artifacts.{}", artifact), e);
            }
        }

        let data = match reader.get("data") {
            Some(Value::Object(_)) => reader.nested::<D>("data"),
            Some(other) => {
                reader.error("data", format!("expected an object, got {}", other));
                None
            }
            None => Some(D::default()),
        };
        let debug = reader.object("debug");
        let jobfilter = reader.optional("jobfilter");
        let platform_filter = reader.or_default("platform_filter");

        let created = reader.timestamp("created").unwrap_or(defaults.now);
        let updated = reader.timestamp("updated").unwrap_or(defaults.now);
        let timeout = reader
            .timestamp("timeout")
            .unwrap_or_else(|| defaults.timeout_at());
        let holdoff = reader.timestamp("holdoff");

        let owner = reader.optional("owner");
        let submitter = reader.optional("submitter");
        let treeid = reader.optional("treeid");
        let user_groups: Vec<String> = reader.or_default("user_groups");
        let unique: HashSet<&String> = user_groups.iter().collect();
        if unique.len() != user_groups.len() {
            reader.error("user_groups", "Groups must have unique names.");
        }
        let processed_by_kcidb_bridge = reader.or_default("processed_by_kcidb_bridge");

        if let (Some(path), Some(_)) = (&path, parent) {
            if path.is_empty() {
                reader.error("path", "path must not be empty for a node with a parent");
            }
        }

        match (name, path, data) {
            (Some(name), Some(path), Some(data)) if errors.is_empty() => Ok(Node {
                id,
                kind,
                name,
                path,
                group,
                parent,
                state,
                result,
                artifacts,
                data,
                debug,
                jobfilter,
                platform_filter,
                created,
                updated,
                timeout,
                holdoff,
                owner,
                submitter,
                treeid,
                user_groups,
                processed_by_kcidb_bridge,
            }),
            _ => Err(errors),
        }
    }

    /// Serialize to a document, optionally dropping null members
    pub fn to_document(&self, omit_nulls: bool) -> Result<Value, ModelError> {
        let value = serde_json::to_value(self)?;
        Ok(if omit_nulls { strip_nulls(value) } else { value })
    }

    /// Refresh the update timestamp
    pub fn touch(&mut self, clock: &dyn Clock) {
        self.updated = clock.now();
    }

    pub fn validate_node_state_transition(&self, new_state: StateValue) -> TransitionCheck {
        self.state.validate_transition(new_state)
    }

    pub fn descriptors(&self) -> Option<BuildDescriptors<'_>> {
        self.data.descriptors()
    }

    /// Identifier for messages, `<unsaved>` before the node is stored
    pub fn display_id(&self) -> String {
        self.id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "<unsaved>".to_string())
    }
}

/// A node parsed into the payload type matching its kind
#[derive(Debug, Clone, PartialEq)]
pub enum TypedNode {
    Checkout(Checkout),
    Kbuild(Kbuild),
    Test(Test),
    Job(Job),
    Regression(Regression),
}

macro_rules! with_node {
    ($typed:expr, $node:ident => $body:expr) => {
        match $typed {
            TypedNode::Checkout($node) => $body,
            TypedNode::Kbuild($node) => $body,
            TypedNode::Test($node) => $body,
            TypedNode::Job($node) => $body,
            TypedNode::Regression($node) => $body,
        }
    };
}

impl TypedNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            TypedNode::Checkout(_) => NodeKind::Checkout,
            TypedNode::Kbuild(_) => NodeKind::Kbuild,
            TypedNode::Test(_) => NodeKind::Test,
            TypedNode::Job(_) => NodeKind::Job,
            TypedNode::Regression(_) => NodeKind::Regression,
        }
    }

    pub fn id(&self) -> Option<ObjectId> {
        with_node!(self, n => n.id)
    }

    pub fn set_id(&mut self, id: ObjectId) {
        with_node!(self, n => n.id = Some(id))
    }

    pub fn name(&self) -> &str {
        with_node!(self, n => n.name.as_str())
    }

    pub fn group(&self) -> Option<&str> {
        with_node!(self, n => n.group.as_deref())
    }

    pub fn path(&self) -> &[String] {
        with_node!(self, n => n.path.as_slice())
    }

    pub fn parent(&self) -> Option<ObjectId> {
        with_node!(self, n => n.parent)
    }

    pub fn state(&self) -> StateValue {
        with_node!(self, n => n.state)
    }

    pub fn result(&self) -> Option<ResultValue> {
        with_node!(self, n => n.result)
    }

    pub fn created(&self) -> DateTime<Utc> {
        with_node!(self, n => n.created)
    }

    pub fn timeout(&self) -> DateTime<Utc> {
        with_node!(self, n => n.timeout)
    }

    pub fn display_id(&self) -> String {
        with_node!(self, n => n.display_id())
    }

    pub fn descriptors(&self) -> Option<BuildDescriptors<'_>> {
        with_node!(self, n => n.descriptors())
    }

    pub fn validate_node_state_transition(&self, new_state: StateValue) -> TransitionCheck {
        with_node!(self, n => n.validate_node_state_transition(new_state))
    }

    pub fn to_document(&self, omit_nulls: bool) -> Result<Value, ModelError> {
        with_node!(self, n => n.to_document(omit_nulls))
    }

    pub fn touch(&mut self, clock: &dyn Clock) {
        with_node!(self, n => n.touch(clock))
    }

    pub fn processed_by_kcidb_bridge(&self) -> bool {
        with_node!(self, n => n.processed_by_kcidb_bridge)
    }

    pub fn set_processed_by_kcidb_bridge(&mut self, processed: bool) {
        with_node!(self, n => n.processed_by_kcidb_bridge = processed)
    }

    /// Force the node to done after its deadline passed
    pub fn mark_timed_out(&mut self, now: DateTime<Utc>) {
        with_node!(self, n => {
            n.state = StateValue::Done;
            if n.result.is_none() {
                n.result = Some(ResultValue::Incomplete);
            }
            n.data.mark_timed_out();
            n.updated = now;
        })
    }

    /// Point this node at the regression it revealed
    pub fn set_regression(&mut self, regression: ObjectId) -> bool {
        with_node!(self, n => n.data.set_regression(regression))
    }
}

/// A node together with its descendants
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hierarchy {
    pub node: Node,
    pub child_nodes: Vec<Hierarchy>,
}

impl Hierarchy {
    /// Build the tree under `root` from a flat list by following `parent`
    pub fn build(root: Node, nodes: &[Node]) -> Self {
        let mut seen = HashSet::new();
        Self::build_inner(root, nodes, &mut seen)
    }

    fn build_inner(root: Node, nodes: &[Node], seen: &mut HashSet<ObjectId>) -> Self {
        let mut child_nodes = Vec::new();
        if let Some(id) = root.id {
            if seen.insert(id) {
                for child in nodes.iter().filter(|n| n.parent == Some(id)) {
                    child_nodes.push(Self::build_inner(child.clone(), nodes, seen));
                }
            }
        }
        Hierarchy {
            node: root,
            child_nodes,
        }
    }

    /// Number of nodes in the tree, root included
    pub fn node_count(&self) -> usize {
        1 + self.child_nodes.iter().map(Hierarchy::node_count).sum::<usize>()
    }
}
