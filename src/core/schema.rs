//! Kind registry: dispatches documents to their node subtype

use crate::core::config::{Clock, ModelConfig, SystemClock};
use crate::core::data::NodeData;
use crate::core::document::DataMap;
use crate::core::error::{FieldError, ModelError, UnsupportedKindError, ValidationError};
use crate::core::node::{Node, NodeDefaults, NodeKind, TypedNode, GENERIC_KIND};
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// How a designated field is converted from its string form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coercion {
    ObjectId,
    Timestamp,
    Integer,
}

/// Fields that hold identifiers, timestamps or integers for one kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSets {
    pub object_ids: Vec<&'static str>,
    pub timestamps: Vec<&'static str>,
    pub integers: Vec<&'static str>,
}

impl FieldSets {
    /// Fields every node carries
    pub fn base() -> Self {
        Self {
            object_ids: vec!["parent"],
            timestamps: vec!["created", "updated", "timeout", "holdoff"],
            integers: vec![
                "data.kernel_revision.version.version",
                "data.kernel_revision.version.patchlevel",
                "data.kernel_revision.version.sublevel",
            ],
        }
    }

    /// Additions declared by a subtype
    pub fn additions(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Checkout => Self::default(),
            NodeKind::Kbuild | NodeKind::Test | NodeKind::Job => Self {
                object_ids: vec!["data.regression"],
                ..Self::default()
            },
            NodeKind::Regression => Self {
                object_ids: vec!["data.fail_node", "data.pass_node"],
                timestamps: vec![
                    "data.fail_node.created",
                    "data.fail_node.updated",
                    "data.fail_node.timeout",
                    "data.fail_node.holdoff",
                    "data.pass_node.created",
                    "data.pass_node.updated",
                    "data.pass_node.timeout",
                    "data.pass_node.holdoff",
                ],
                integers: vec![
                    "data.failed_kernel_revision.version.version",
                    "data.failed_kernel_revision.version.patchlevel",
                    "data.failed_kernel_revision.version.sublevel",
                ],
            },
        }
    }

    /// Union of two sets, keeping declaration order
    pub fn merge(&self, other: &FieldSets) -> Self {
        fn union(a: &[&'static str], b: &[&'static str]) -> Vec<&'static str> {
            let mut out = a.to_vec();
            for field in b {
                if !out.contains(field) {
                    out.push(field);
                }
            }
            out
        }

        Self {
            object_ids: union(&self.object_ids, &other.object_ids),
            timestamps: union(&self.timestamps, &other.timestamps),
            integers: union(&self.integers, &other.integers),
        }
    }

    pub fn coercion_for(&self, field: &str) -> Option<Coercion> {
        if self.object_ids.contains(&field) {
            Some(Coercion::ObjectId)
        } else if self.timestamps.contains(&field) {
            Some(Coercion::Timestamp)
        } else if self.integers.contains(&field) {
            Some(Coercion::Integer)
        } else {
            None
        }
    }
}

type ParseFn = fn(&DataMap, NodeDefaults) -> Result<TypedNode, Vec<FieldError>>;

/// Registered subtype
#[derive(Clone)]
struct KindEntry {
    kind: NodeKind,
    fields: FieldSets,
    parse: ParseFn,
}

impl std::fmt::Debug for KindEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindEntry")
            .field("kind", &self.kind)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

fn parse_as<D: NodeData>(
    doc: &DataMap,
    kind: NodeKind,
    defaults: NodeDefaults,
) -> Result<Node<D>, Vec<FieldError>> {
    Node::<D>::from_document(doc, Some(kind.tag()), defaults)
}

/// Node schema: kind registry, designated field sets and server defaults
#[derive(Debug, Clone)]
pub struct Schema {
    config: ModelConfig,
    clock: Arc<dyn Clock>,
    base_fields: FieldSets,
    kinds: HashMap<&'static str, KindEntry>,
}

impl Schema {
    pub fn new(config: ModelConfig, clock: Arc<dyn Clock>) -> Self {
        let mut schema = Self {
            config,
            clock,
            base_fields: FieldSets::base(),
            kinds: HashMap::new(),
        };

        schema.register(NodeKind::Checkout, |doc, d| {
            parse_as(doc, NodeKind::Checkout, d).map(TypedNode::Checkout)
        });
        schema.register(NodeKind::Kbuild, |doc, d| {
            parse_as(doc, NodeKind::Kbuild, d).map(TypedNode::Kbuild)
        });
        schema.register(NodeKind::Test, |doc, d| {
            parse_as(doc, NodeKind::Test, d).map(TypedNode::Test)
        });
        schema.register(NodeKind::Job, |doc, d| {
            parse_as(doc, NodeKind::Job, d).map(TypedNode::Job)
        });
        schema.register(NodeKind::Regression, |doc, d| {
            parse_as(doc, NodeKind::Regression, d).map(TypedNode::Regression)
        });

        schema
    }

    /// Schema with default configuration and the wall clock
    pub fn with_defaults() -> Self {
        Self::new(ModelConfig::default(), Arc::new(SystemClock))
    }

    fn register(&mut self, kind: NodeKind, parse: ParseFn) {
        let fields = self.base_fields.merge(&FieldSets::additions(kind));
        self.kinds.insert(kind.tag(), KindEntry { kind, fields, parse });
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn defaults(&self) -> NodeDefaults {
        NodeDefaults::new(
            self.clock.as_ref(),
            self.config.default_timeout().unwrap_or(Duration::MAX),
        )
    }

    /// Registered kind tags
    pub fn kinds(&self) -> Vec<NodeKind> {
        let mut kinds: Vec<_> = self.kinds.values().map(|e| e.kind).collect();
        kinds.sort_by_key(|k| k.tag());
        kinds
    }

    /// Designated fields for a kind; `None` or the generic tag gives the
    /// base set
    pub fn field_sets(&self, kind: Option<&str>) -> Result<&FieldSets, UnsupportedKindError> {
        match kind {
            None | Some(GENERIC_KIND) => Ok(&self.base_fields),
            Some(tag) => self
                .kinds
                .get(tag)
                .map(|entry| &entry.fields)
                .ok_or_else(|| UnsupportedKindError { kind: tag.to_string() }),
        }
    }

    /// Validate a raw document into the subtype named by its `kind`
    pub fn parse_node(&self, doc: &Value) -> Result<TypedNode, ModelError> {
        let map = as_object(doc)?;
        let tag = match map.get("kind") {
            Some(Value::String(tag)) => tag.as_str(),
            Some(other) => {
                return Err(UnsupportedKindError {
                    kind: other.to_string(),
                }
                .into())
            }
            None => GENERIC_KIND,
        };

        let entry = self.kinds.get(tag).ok_or_else(|| UnsupportedKindError {
            kind: tag.to_string(),
        })?;
        debug!("Parsing {} document", tag);

        (entry.parse)(map, self.defaults()).map_err(|errors| ValidationError::new(tag, errors).into())
    }

    /// Validate a raw document as a generic node with a free-form payload
    pub fn parse_generic(&self, doc: &Value) -> Result<Node, ModelError> {
        let map = as_object(doc)?;
        Node::<DataMap>::from_document(map, None, self.defaults())
            .map_err(|errors| ValidationError::new(GENERIC_KIND, errors).into())
    }

    /// Re-validate a generically fetched node into its specific subtype
    pub fn upcast(&self, node: &Node) -> Result<TypedNode, ModelError> {
        self.parse_node(&node.to_document(true)?)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn as_object(doc: &Value) -> Result<&DataMap, ValidationError> {
    doc.as_object().ok_or_else(|| {
        ValidationError::new(
            GENERIC_KIND,
            vec![FieldError::new("", format!("expected a JSON object, got {}", doc))],
        )
    })
}
