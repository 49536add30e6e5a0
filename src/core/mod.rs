//! Core node model
//!
//! Entity types, validation, the state machine and regression synthesis.

pub mod config;
pub mod data;
pub mod document;
pub mod error;
pub mod event;
pub mod ids;
pub mod node;
pub mod regression;
pub mod revision;
pub mod schema;
pub mod state;
pub mod timestamp;

pub use config::{Clock, FixedClock, ModelConfig, SystemClock};
pub use data::*;
pub use document::DataMap;
pub use error::*;
pub use event::{EventHistory, PublishEvent};
pub use ids::ObjectId;
pub use node::*;
pub use revision::{KernelVersion, Revision};
pub use schema::{Coercion, FieldSets, Schema};
pub use state::*;
