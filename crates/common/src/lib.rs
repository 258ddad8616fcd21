//! Value types shared by the registry, sidecar, two-phase and saga crates.

pub mod method;
pub mod token;
pub mod types;

pub use method::HttpMethod;
pub use token::{EndpointToken, TokenError};
pub use types::TransactionId;
