//! Query parameter translation

pub mod coerce;
pub mod filter;
pub mod translator;

pub use filter::{Condition, Filter, FilterValue, KNOWN_OPERATORS};
pub use translator::{split_operator, QueryTranslator};
