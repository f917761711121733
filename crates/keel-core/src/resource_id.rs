//! Hierarchical resource identifiers.
//!
//! A resource identifier is a path made of two parts:
//!
//! - **Scope segments**: `(type, name)` pairs such as `subscriptions/{id}` or
//!   `resourceGroups/{name}`. UCP-qualified identifiers start with `/planes`.
//! - **Type segments**: everything after `/providers/`. The first segment carries
//!   the provider namespace (`Applications.Core/environments/env0`), nested
//!   segments carry only their type (`nestedType/nested1`).
//!
//! Segment names keep their case. Type and provider comparisons ignore case.
//!
//! # Example
//!
//! ```rust
//! use keel_core::resource_id::ResourceId;
//!
//! let id = ResourceId::parse(
//!     "/planes/radius/local/resourceGroups/rg/providers/Applications.Core/environments/env0",
//! )
//! .unwrap();
//!
//! assert_eq!(id.root_scope(), "/planes/radius/local/resourceGroups/rg");
//! assert_eq!(id.resource_type(), "Applications.Core/environments");
//! assert_eq!(id.name(), "env0");
//! ```

use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

const SEPARATOR: char = '/';
const PLANES_KEYWORD: &str = "planes";
const PROVIDERS_KEYWORD: &str = "providers";
const LOCATIONS_TYPE: &str = "locations";
const OPERATION_STATUSES_TYPE: &str = "operationstatuses";

/// A `(type, name)` pair in the scope part of an identifier.
#[derive(Debug, Clone)]
pub struct ScopeSegment {
    type_name: String,
    name: String,
}

impl ScopeSegment {
    /// Creates a scope segment.
    #[must_use]
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// The scope type, e.g. `resourceGroups`.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The scope name, e.g. `my-rg`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Compares type and name without regard to case.
    #[must_use]
    pub fn eq_ignore_case(&self, other: &Self) -> bool {
        self.type_name.eq_ignore_ascii_case(&other.type_name)
            && self.name.eq_ignore_ascii_case(&other.name)
    }
}

impl PartialEq for ScopeSegment {
    fn eq(&self, other: &Self) -> bool {
        self.type_name.eq_ignore_ascii_case(&other.type_name) && self.name == other.name
    }
}

impl Eq for ScopeSegment {}

impl Hash for ScopeSegment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name.to_ascii_lowercase().hash(state);
        self.name.hash(state);
    }
}

/// A `(type, name)` pair in the provider part of an identifier.
///
/// For the first segment the type includes the provider namespace.
#[derive(Debug, Clone)]
pub struct TypeSegment {
    type_name: String,
    name: String,
}

impl TypeSegment {
    /// Creates a type segment.
    #[must_use]
    pub fn new(type_name: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// The resource type, e.g. `Applications.Core/environments` or `nestedType`.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// The resource name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for TypeSegment {
    fn eq(&self, other: &Self) -> bool {
        self.type_name.eq_ignore_ascii_case(&other.type_name) && self.name == other.name
    }
}

impl Eq for TypeSegment {}

impl Hash for TypeSegment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_name.to_ascii_lowercase().hash(state);
        self.name.hash(state);
    }
}

/// A parsed, immutable resource identifier.
///
/// Equality ignores case for the `planes`/`providers` keywords and for
/// scope and resource types; names compare exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    ucp_qualified: bool,
    scope_segments: Vec<ScopeSegment>,
    type_segments: Vec<TypeSegment>,
}

impl ResourceId {
    /// Parses a resource identifier.
    ///
    /// A single trailing `/` is accepted. `/` is the empty root scope and
    /// `/planes` the empty UCP root scope.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedIdentifier`] if the path does not start with
    /// `/`, contains an empty segment, has a segment without a name, or uses
    /// a nested `providers` keyword.
    pub fn parse(id: &str) -> Result<Self> {
        let Some(rest) = id.strip_prefix(SEPARATOR) else {
            return Err(Error::malformed(id, "must start with '/'"));
        };
        if rest.is_empty() {
            return Ok(Self::root());
        }

        let rest = rest.strip_suffix(SEPARATOR).unwrap_or(rest);
        if rest.split(SEPARATOR).any(str::is_empty) {
            return Err(Error::malformed(id, "contains an empty segment"));
        }

        let mut tokens = rest.split(SEPARATOR).peekable();
        let ucp_qualified = tokens
            .next_if(|t| t.eq_ignore_ascii_case(PLANES_KEYWORD))
            .is_some();

        let mut scope_segments = Vec::new();
        while let Some(type_name) = tokens.next_if(|t| !t.eq_ignore_ascii_case(PROVIDERS_KEYWORD))
        {
            let Some(name) = tokens.next() else {
                return Err(Error::malformed(
                    id,
                    format!("scope segment '{type_name}' has no name"),
                ));
            };
            scope_segments.push(ScopeSegment::new(type_name, name));
        }

        let mut type_segments = Vec::new();
        if tokens.next().is_some() {
            let Some(namespace) = tokens.next() else {
                return Err(Error::malformed(id, "missing provider namespace"));
            };
            let remaining: Vec<&str> = tokens.collect();
            if remaining.is_empty() {
                return Err(Error::malformed(
                    id,
                    format!("missing resource type after provider namespace '{namespace}'"),
                ));
            }
            if remaining.len() % 2 != 0 {
                return Err(Error::malformed(id, "resource type segment has no name"));
            }
            for (index, pair) in remaining.chunks(2).enumerate() {
                let [type_name, name] = pair else {
                    return Err(Error::malformed(id, "resource type segment has no name"));
                };
                if type_name.eq_ignore_ascii_case(PROVIDERS_KEYWORD) {
                    return Err(Error::malformed(id, "extension resources are not supported"));
                }
                let type_name = if index == 0 {
                    format!("{namespace}/{type_name}")
                } else {
                    (*type_name).to_string()
                };
                type_segments.push(TypeSegment::new(type_name, *name));
            }
        }

        Ok(Self {
            ucp_qualified,
            scope_segments,
            type_segments,
        })
    }

    /// The empty, non-UCP root scope (`/`).
    #[must_use]
    pub const fn root() -> Self {
        Self {
            ucp_qualified: false,
            scope_segments: Vec::new(),
            type_segments: Vec::new(),
        }
    }

    /// Builds an identifier from segments.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedIdentifier`] if any segment has an empty type
    /// or name, or if the first type segment lacks a provider namespace.
    pub fn from_segments(
        ucp_qualified: bool,
        scope_segments: Vec<ScopeSegment>,
        type_segments: Vec<TypeSegment>,
    ) -> Result<Self> {
        let id = Self {
            ucp_qualified,
            scope_segments,
            type_segments,
        };

        let empty_scope = id
            .scope_segments
            .iter()
            .any(|s| s.type_name.is_empty() || s.name.is_empty());
        let empty_type = id
            .type_segments
            .iter()
            .any(|t| t.type_name.is_empty() || t.name.is_empty());
        if empty_scope || empty_type {
            return Err(Error::malformed(id.to_string(), "segments must be non-empty"));
        }
        if id
            .type_segments
            .first()
            .is_some_and(|t| !t.type_name.contains(SEPARATOR))
        {
            return Err(Error::malformed(
                id.to_string(),
                "first resource type must include a provider namespace",
            ));
        }
        Ok(id)
    }

    /// Returns true if the identifier is rooted at `/planes`.
    #[must_use]
    pub const fn is_ucp_qualified(&self) -> bool {
        self.ucp_qualified
    }

    /// The scope segments, outermost first.
    #[must_use]
    pub fn scope_segments(&self) -> &[ScopeSegment] {
        &self.scope_segments
    }

    /// The type segments, outermost first.
    #[must_use]
    pub fn type_segments(&self) -> &[TypeSegment] {
        &self.type_segments
    }

    /// Returns true if the identifier names a scope rather than a resource.
    #[must_use]
    pub fn is_scope(&self) -> bool {
        self.type_segments.is_empty()
    }

    /// Returns true if the identifier names a resource under `/providers/`.
    #[must_use]
    pub fn is_resource(&self) -> bool {
        !self.type_segments.is_empty()
    }

    /// The scope part rendered as a string, e.g. `/planes/radius/local`.
    #[must_use]
    pub fn root_scope(&self) -> String {
        self.scope_id().to_string()
    }

    /// The scope part as an identifier.
    #[must_use]
    pub fn scope_id(&self) -> Self {
        Self {
            ucp_qualified: self.ucp_qualified,
            scope_segments: self.scope_segments.clone(),
            type_segments: Vec::new(),
        }
    }

    /// The resource path after `/providers/`, e.g.
    /// `System.Resources/resourceType1/resource1/nestedType/nested1`.
    ///
    /// Empty for scopes.
    #[must_use]
    pub fn routing_scope(&self) -> String {
        let mut out = String::new();
        for (index, segment) in self.type_segments.iter().enumerate() {
            if index > 0 {
                out.push(SEPARATOR);
            }
            // Writing to a String cannot fail.
            let _ = write!(out, "{}/{}", segment.type_name, segment.name);
        }
        out
    }

    /// The fully-qualified type.
    ///
    /// For resources this joins every type segment
    /// (`System.Resources/resourceType1/nestedType`). For scopes it is the type
    /// of the last scope segment (`resourceGroups`). Empty for root scopes.
    #[must_use]
    pub fn resource_type(&self) -> String {
        if self.type_segments.is_empty() {
            return self
                .scope_segments
                .last()
                .map(|s| s.type_name.clone())
                .unwrap_or_default();
        }
        self.type_segments
            .iter()
            .map(|t| t.type_name.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// The name of the last segment. Empty for root scopes.
    #[must_use]
    pub fn name(&self) -> &str {
        self.type_segments
            .last()
            .map(TypeSegment::name)
            .or_else(|| self.scope_segments.last().map(ScopeSegment::name))
            .unwrap_or_default()
    }

    /// The provider namespace, e.g. `Applications.Core`.
    #[must_use]
    pub fn provider_namespace(&self) -> Option<&str> {
        self.type_segments
            .first()
            .and_then(|t| t.type_name.split(SEPARATOR).next())
    }

    /// The outermost scope: the plane (`/planes/radius/local`) or the
    /// subscription (`/subscriptions/{id}`).
    #[must_use]
    pub fn plane_scope(&self) -> Self {
        Self {
            ucp_qualified: self.ucp_qualified,
            scope_segments: self.scope_segments.iter().take(1).cloned().collect(),
            type_segments: Vec::new(),
        }
    }

    /// The scope that directly contains this identifier.
    ///
    /// For a resource this is its scope; for a scope it is the scope without
    /// its last segment. Root scopes have no parent.
    #[must_use]
    pub fn parent_scope(&self) -> Option<Self> {
        if self.is_resource() {
            return Some(self.scope_id());
        }
        let (_, parent) = self.scope_segments.split_last()?;
        Some(Self {
            ucp_qualified: self.ucp_qualified,
            scope_segments: parent.to_vec(),
            type_segments: Vec::new(),
        })
    }

    /// Returns true if both scopes are identical, ignoring case.
    #[must_use]
    pub fn scope_eq_ignore_case(&self, other: &Self) -> bool {
        self.ucp_qualified == other.ucp_qualified
            && self.scope_segments.len() == other.scope_segments.len()
            && self.scope_contains(other)
    }

    /// Returns true if `other`'s scope is this scope or nested beneath it,
    /// ignoring case.
    #[must_use]
    pub fn scope_contains(&self, other: &Self) -> bool {
        self.ucp_qualified == other.ucp_qualified
            && self.scope_segments.len() <= other.scope_segments.len()
            && self
                .scope_segments
                .iter()
                .zip(&other.scope_segments)
                .all(|(a, b)| a.eq_ignore_case(b))
    }

    /// The canonical store key: the string form, lower-cased.
    #[must_use]
    pub fn canonical_key(&self) -> String {
        self.to_string().to_lowercase()
    }

    /// Builds the identifier of the operation-status record for an operation
    /// on this resource:
    /// `<plane-scope>/providers/<namespace>/locations/<location>/operationstatuses/<operation_id>`.
    ///
    /// The namespace is lower-cased. The construction only depends on the
    /// plane scope and the provider namespace, so subscription- and
    /// plane-shaped identifiers are handled the same way.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedIdentifier`] if this identifier has no
    /// provider namespace or if `location`/`operation_id` is empty.
    pub fn operation_status_id(&self, location: &str, operation_id: &str) -> Result<Self> {
        let namespace = self.provider_namespace().ok_or_else(|| {
            Error::malformed(
                self.to_string(),
                "operation status requires a resource with a provider namespace",
            )
        })?;
        if location.is_empty() || operation_id.is_empty() {
            return Err(Error::malformed(
                self.to_string(),
                "operation status requires a location and an operation id",
            ));
        }

        Ok(Self {
            ucp_qualified: self.ucp_qualified,
            scope_segments: self.plane_scope().scope_segments,
            type_segments: vec![
                TypeSegment::new(
                    format!("{}/{LOCATIONS_TYPE}", namespace.to_lowercase()),
                    location,
                ),
                TypeSegment::new(OPERATION_STATUSES_TYPE, operation_id),
            ],
        })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut wrote = false;
        if self.ucp_qualified {
            write!(f, "/{PLANES_KEYWORD}")?;
            wrote = true;
        }
        for segment in &self.scope_segments {
            write!(f, "/{}/{}", segment.type_name, segment.name)?;
            wrote = true;
        }
        if !self.type_segments.is_empty() {
            write!(f, "/{PROVIDERS_KEYWORD}")?;
            for segment in &self.type_segments {
                write!(f, "/{}/{}", segment.type_name, segment.name)?;
            }
            wrote = true;
        }
        if !wrote {
            f.write_char(SEPARATOR)?;
        }
        Ok(())
    }
}

impl FromStr for ResourceId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
