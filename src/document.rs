//! Documents and their conversion into indexable fields.
//!
//! - [`document::Document`] - field name to [`field_value::FieldValue`], with the
//!   reserved identity field [`document::ID_FIELD`]
//! - [`codec::DocumentCodec`] - full and partial encoding against a
//!   [`FieldMap`](crate::schema::FieldMap)
//! - [`identity::IdentityGenerator`] - time-ordered identities
//! - [`facets::FacetsConfig`] - the facet-config step

pub mod codec;
pub mod document;
pub mod facets;
pub mod field_value;
pub mod identity;
pub mod indexable;
