//! Client core for debugging API interfaces against a TestRunner execution
//! backend: the request and validator model, the debug endpoints, and the
//! tabbed session store that keeps work in progress across restarts.

pub mod cli;
pub mod collections;
pub mod config;
pub mod error;
pub mod hooks;
pub mod http;
pub mod logging;
pub mod storage;
pub mod tabs;
pub mod testing;

pub use config::{ClientConfig, SessionConfig};
pub use error::{ApiError, StorageError, ValidationError};
pub use http::{DebugClient, DebugResult, RequestDefinition, RequestPatch};
pub use tabs::{DebugTab, DebugTicket, TabId, TabMeta, TabSeed, TabStore};
