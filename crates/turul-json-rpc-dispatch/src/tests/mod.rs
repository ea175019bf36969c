//! Test modules for turul-json-rpc-dispatch crate
//!
//! End-to-end suites that drive [`crate::RpcServer`] from raw bytes to the
//! serialized outbound payload.

pub mod authorization_tests;
