pub mod client;
pub mod method;
pub mod request;
pub mod response;

pub use client::DebugClient;
pub use method::HttpMethod;
pub use request::{BodyKind, KeyValuePair, RequestBody, RequestDefinition, RequestPatch};
pub use response::{DebugResult, DebugStatus, HookTrace, ResponseSnapshot, ValidationOutcome};
