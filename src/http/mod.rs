//! HTTP protocol surface
//!
//! Response assembly and the chain-backed streaming body.

pub mod body;
pub mod response;

pub use body::ChainBody;
