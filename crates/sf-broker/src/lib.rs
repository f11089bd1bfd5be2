//! Tool broker: JSON-RPC 2.0 over a line-delimited duplex channel, exposing
//! the tool registry and adapter execution to an embedding agent runtime.
//!
//! Session lifecycle is `UNINITIALIZED -> INITIALIZED -> SERVING ->
//! CLOSING -> CLOSED`; `initialize` is the only method admitted before
//! `INITIALIZED`, and no method is admitted once `CLOSING`/`CLOSED`.

pub mod broker;
pub mod jsonrpc;
pub mod methods;
pub mod resources;
pub mod server;
pub mod session;

pub use broker::{BackpressurePolicy, BrokerConfig, BrokerSession};
pub use jsonrpc::{JsonRpcError, JsonRpcId, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse, error_codes};
pub use resources::{InMemoryResourceProvider, ResourceProvider};
pub use server::serve_stdio;
pub use session::SessionState;
