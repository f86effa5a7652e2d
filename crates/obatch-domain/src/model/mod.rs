//! Sub-request model types.
//!
//! This module contains:
//! - Method, multiplicity and entity reference types
//! - Resource path grammar
//! - Query options and their validated facet
//! - Typed entity and `$links` bodies

mod body;
mod path;
mod query;
#[cfg(test)]
mod query_proptest;
mod types;

pub use body::{EntityBody, LinkBody, ID_PROPERTY};
pub use path::ResourcePath;
pub use query::{
    InlineCount, OrderBy, QueryFacet, QueryLimits, QueryOptions, EXPAND, FILTER, INLINECOUNT,
    ORDERBY, SEARCH, SELECT, SKIP, TOP,
};
pub use types::*;
