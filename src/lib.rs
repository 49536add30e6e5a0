//! kci-model - node model, query translation and regression tracking for
//! a CI pipeline service

pub mod cli;
pub mod core;
pub mod persistence;
pub mod query;
pub mod service;

// Re-export commonly used types
pub use crate::core::{
    ModelConfig, ModelError, Node, NodeKind, ObjectId, Regression, ResultValue, Schema, StateValue, TypedNode,
};
pub use crate::persistence::{InMemoryNodeStore, NodeStore, StoreError};
pub use crate::query::{Condition, Filter, FilterValue};
pub use crate::service::{NodeService, ServiceError};
