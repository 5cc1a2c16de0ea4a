//! Query definitions and their execution against segments.
//!
//! A [`QueryDefinition`] arrives as JSON or is built in code. Before any scan
//! its predicate is resolved against the active
//! [`FieldMap`](crate::schema::FieldMap) into a [`resolved::ResolvedQuery`];
//! unknown fields fail there with a query error.

pub mod definition;
pub mod matcher;
pub mod predicate;
pub mod resolved;
pub mod result;
pub mod scorer;

pub use definition::{
    CollectorRequest, FacetRequest, FunctionKind, FunctionRequest, Operator, QueryDefinition,
    SortDirection, SortField,
};
pub use predicate::{BoolQuery, Query};
pub use result::{ResultDefinition, ResultDocument};
