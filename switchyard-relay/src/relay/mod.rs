pub mod error;
pub mod forward;

pub use error::ProxyError;
pub use forward::ProxyForwarder;
