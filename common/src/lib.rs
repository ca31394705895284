//! Shared plumbing for `ctpeek`: content fingerprinting, the Consul KV
//! client, and the codec chain (LZW + gob) that consul-template uses for
//! its dedup payloads.

pub mod consul;
pub mod error;
pub mod fingerprint;
pub mod gob;
pub mod lzw;
pub mod template;

pub use error::Error;
pub use gob::Value;
