//! # keel-rpc
//!
//! Async-operation handling for the keel control plane.
//!
//! A frontend accepts a long-running request, records its status and hands
//! the work to a queue. Workers pick it up through the dequeue engine in
//! `keel-core`, report progress back through the [`StatusManager`], and
//! clients poll until the operation finishes.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use keel_core::prelude::*;
//! use keel_rpc::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> keel_rpc::Result<()> {
//! let manager = AsyncOperationStatusManager::new(
//!     Arc::new(InMemoryClient::new()),
//!     Arc::new(InMemoryQueue::new("operations")),
//!     "global",
//! );
//!
//! let target = ResourceId::parse(
//!     "/planes/radius/local/resourceGroups/rg/providers/Applications.Core/environments/env0",
//! )?;
//! let ctx = RequestContext::new(target.clone(), "Applications.Core/environments|PUT".parse()?);
//! manager.queue_async_operation(&ctx, QueueOperationOptions::default()).await?;
//!
//! let status = manager.get(&target, ctx.operation_id).await?;
//! assert_eq!(status.operation.status, ProvisioningState::Updating);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod api;
pub mod config;
pub mod datamodel;
pub mod error;
pub mod frontend;
pub mod metrics;
pub mod request;
pub mod statusmanager;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::api::{
        AsyncOperationStatus, ErrorDetails, OperationMethod, OperationType, ProvisioningState,
        RequestContext,
    };
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::request::OperationRequest;
    pub use crate::statusmanager::{
        AsyncOperationStatusManager, QueueOperationOptions, Status, StatusManager,
    };
}

pub use error::{Error, Result};
pub use statusmanager::{AsyncOperationStatusManager, StatusManager};
