//! Switchyard Relay Library
//!
//! Forwards client requests to selected backends and translates
//! backend-facing failures into client-visible responses.

pub mod relay;

pub use relay::error::ProxyError;
pub use relay::forward::ProxyForwarder;
