//! Versioned object store contract.
//!
//! The store holds JSON documents keyed by [`ResourceId`]. Every successful
//! save recomputes the object's ETag from its data, and writes can be made
//! conditional on the ETag the caller last observed.
//!
//! ## Concurrency rules
//!
//! - [`WritePrecondition::None`] saves unconditionally (upsert).
//! - [`WritePrecondition::MatchesETag`] saves only if the stored ETag equals the
//!   given one. A missing object is a mismatch and yields
//!   [`Error::Concurrency`], never [`Error::NotFound`].
//! - An unconditional delete of a missing object is [`Error::NotFound`]; a
//!   conditional one is [`Error::Concurrency`].
//!
//! Implementations never retry. Errors are classified and returned as-is.

pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::resource_id::ResourceId;

pub use memory::InMemoryClient;

/// Identity and version of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    /// The object's identifier.
    pub id: ResourceId,
    /// The content-derived version. Empty until the first save.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub etag: String,
}

/// A stored document and its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    /// Identity and version.
    pub metadata: Metadata,
    /// The document body.
    pub data: Value,
}

impl Object {
    /// Creates an unsaved object.
    #[must_use]
    pub fn new(id: ResourceId, data: Value) -> Self {
        Self {
            metadata: Metadata {
                id,
                etag: String::new(),
            },
            data,
        }
    }

    /// Creates an unsaved object from any serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if `value` cannot be converted to JSON.
    pub fn from_serializable<T: Serialize>(id: ResourceId, value: &T) -> Result<Self> {
        Ok(Self::new(id, serde_json::to_value(value)?))
    }

    /// Decodes the document body into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if the body does not match `T`.
    pub fn as_type<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(T::deserialize(&self.data)?)
    }

    /// The object's identifier.
    #[must_use]
    pub fn id(&self) -> &ResourceId {
        &self.metadata.id
    }

    /// The object's current ETag.
    #[must_use]
    pub fn etag(&self) -> &str {
        &self.metadata.etag
    }
}

/// Precondition for saves and deletes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WritePrecondition {
    /// Write unconditionally.
    #[default]
    None,
    /// Write only if the stored object's ETag matches.
    MatchesETag(String),
}

impl WritePrecondition {
    /// Builds a precondition from an optional ETag; empty means unconditional.
    #[must_use]
    pub fn from_etag(etag: &str) -> Self {
        if etag.is_empty() {
            Self::None
        } else {
            Self::MatchesETag(etag.to_string())
        }
    }
}

/// A shallow equality filter on a top-level field of the document body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryFilter {
    /// Top-level field name.
    pub field: String,
    /// Expected value. String fields compare directly; other JSON values
    /// compare by their compact encoding.
    pub value: String,
}

impl QueryFilter {
    /// Creates a filter.
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Returns true if `data` has the field with the expected value.
    #[must_use]
    pub fn matches(&self, data: &Value) -> bool {
        match data.get(&self.field) {
            Some(Value::String(s)) => *s == self.value,
            Some(other) => other.to_string() == self.value,
            None => false,
        }
    }
}

/// A scoped query over stored objects.
///
/// ```rust
/// use keel_core::database::Query;
/// use keel_core::resource_id::ResourceId;
///
/// let query = Query::new(ResourceId::parse("/planes/radius/local").unwrap())
///     .recursive()
///     .resource_type("Applications.Core/environments")
///     .filter("name", "env0");
/// assert!(query.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Query {
    /// The scope to search.
    pub root_scope: ResourceId,
    /// Include objects in scopes nested under `root_scope`.
    pub scope_recursive: bool,
    /// Fully-qualified type to match, compared without case. Empty matches any type.
    pub resource_type: String,
    /// Restrict resources to those whose path after `/providers/` starts with
    /// these segments.
    pub routing_scope_prefix: String,
    /// Match scope objects rather than resources.
    pub is_scope_query: bool,
    /// Field filters, all of which must match.
    pub filters: Vec<QueryFilter>,
}

impl Query {
    /// Creates a non-recursive resource query at `root_scope`.
    #[must_use]
    pub fn new(root_scope: ResourceId) -> Self {
        Self {
            root_scope,
            scope_recursive: false,
            resource_type: String::new(),
            routing_scope_prefix: String::new(),
            is_scope_query: false,
            filters: Vec::new(),
        }
    }

    /// Sets the resource type.
    #[must_use]
    pub fn resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    /// Searches nested scopes as well.
    #[must_use]
    pub const fn recursive(mut self) -> Self {
        self.scope_recursive = true;
        self
    }

    /// Matches scope objects instead of resources.
    #[must_use]
    pub const fn scopes(mut self) -> Self {
        self.is_scope_query = true;
        self
    }

    /// Sets the routing scope prefix.
    #[must_use]
    pub fn routing_scope_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.routing_scope_prefix = prefix.into();
        self
    }

    /// Adds a field filter.
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push(QueryFilter::new(field, value));
        self
    }

    /// Checks that the query is well formed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a routing prefix is combined with a
    /// scope query, the root scope names a resource, or the prefix contains an
    /// empty segment.
    pub fn validate(&self) -> Result<()> {
        if self.root_scope.is_resource() {
            return Err(Error::InvalidInput(format!(
                "query root scope '{}' must be a scope",
                self.root_scope
            )));
        }
        if self.is_scope_query && !self.routing_scope_prefix.is_empty() {
            return Err(Error::InvalidInput(
                "routing scope prefix is not supported for scope queries".into(),
            ));
        }
        let prefix = self.routing_scope_prefix.trim_matches('/');
        if !prefix.is_empty() && prefix.split('/').any(str::is_empty) {
            return Err(Error::InvalidInput(format!(
                "routing scope prefix '{}' contains an empty segment",
                self.routing_scope_prefix
            )));
        }
        Ok(())
    }

    /// Returns true if the object with `id` and `data` is selected by this query.
    #[must_use]
    pub fn matches(&self, id: &ResourceId, data: &Value) -> bool {
        let in_scope = if self.is_scope_query {
            id.is_scope()
                && id
                    .parent_scope()
                    .is_some_and(|parent| self.scope_matches(&parent))
        } else {
            id.is_resource() && self.scope_matches(&id.scope_id()) && self.prefix_matches(id)
        };
        if !in_scope {
            return false;
        }

        if !self.resource_type.is_empty()
            && !id.resource_type().eq_ignore_ascii_case(&self.resource_type)
        {
            return false;
        }

        self.filters.iter().all(|f| f.matches(data))
    }

    fn scope_matches(&self, scope: &ResourceId) -> bool {
        if self.scope_recursive {
            self.root_scope.scope_contains(scope)
        } else {
            self.root_scope.scope_eq_ignore_case(scope)
        }
    }

    fn prefix_matches(&self, id: &ResourceId) -> bool {
        let prefix = self.routing_scope_prefix.trim_matches('/').to_lowercase();
        if prefix.is_empty() {
            return true;
        }
        let routing = id.routing_scope().to_lowercase();
        routing == prefix
            || routing
                .strip_prefix(&prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Paging options for [`DatabaseClient::query`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Maximum items per page. `None` returns everything.
    pub max_items: Option<usize>,
    /// Continuation token from a previous page.
    pub pagination_token: Option<String>,
}

/// One page of query results.
#[derive(Debug, Clone, Default)]
pub struct ObjectQueryResult {
    /// The matching objects, in no guaranteed order.
    pub items: Vec<Object>,
    /// Token for the next page, if there is one.
    pub pagination_token: Option<String>,
}

/// Versioned object store.
///
/// Implementations must be safe to share across tasks.
#[async_trait]
pub trait DatabaseClient: Send + Sync + 'static {
    /// Reads the object at `id`.
    ///
    /// Returns [`Error::NotFound`] if it does not exist.
    async fn get(&self, id: &ResourceId) -> Result<Object>;

    /// Saves `object`, updating its ETag in place on success.
    ///
    /// Returns [`Error::Concurrency`] if the precondition is not met.
    async fn save(&self, object: &mut Object, precondition: WritePrecondition) -> Result<()>;

    /// Deletes the object at `id`.
    ///
    /// Returns [`Error::NotFound`] or [`Error::Concurrency`] per the module rules.
    async fn delete(&self, id: &ResourceId, precondition: WritePrecondition) -> Result<()>;

    /// Runs a scoped query. An empty result is not an error.
    async fn query(&self, query: &Query, options: &QueryOptions) -> Result<ObjectQueryResult>;
}
