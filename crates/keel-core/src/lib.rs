//! # keel-core
//!
//! Core primitives for the keel async-operation control plane.
//!
//! - **Resource identifiers**: hierarchical, case-aware addressing with
//!   operation-status derivation
//! - **Versioned object store**: ETag-guarded saves, scoped and recursive queries
//! - **Durable queue**: visibility windows, redelivery and expiry
//! - **Dequeue engine**: a cancellable background poll turned into a message stream
//! - **Error types**: one classified error enum shared by every contract
//!
//! ## Example
//!
//! ```rust
//! use keel_core::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> keel_core::Result<()> {
//! let store = InMemoryClient::new();
//! let id = ResourceId::parse("/planes/radius/local/resourceGroups/rg")?;
//!
//! let mut object = Object::new(id.clone(), serde_json::json!({"value": "1"}));
//! store.save(&mut object, WritePrecondition::None).await?;
//!
//! let stored = store.get(&id).await?;
//! assert_eq!(stored.etag(), object.etag());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod database;
pub mod error;
pub mod etag;
pub mod observability;
pub mod poller;
pub mod queue;
pub mod resource_id;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::database::{
        DatabaseClient, InMemoryClient, Object, ObjectQueryResult, Query, QueryFilter,
        QueryOptions, WritePrecondition,
    };
    pub use crate::error::{Error, Result};
    pub use crate::queue::{
        EnqueueOptions, InMemoryQueue, Message, QueueClient, QueueClientConfig, start_dequeuer,
    };
    pub use crate::resource_id::{ResourceId, ScopeSegment, TypeSegment};
}

pub use error::{Error, Result};
pub use observability::{LogFormat, init_logging};
pub use resource_id::ResourceId;
