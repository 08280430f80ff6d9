//! Async side of the DVN admin tool: settings, key custody and Solana RPC clients, and the
//! orchestrator that runs the `dvn-chains` pipeline for every requested chain.

pub mod constants;
pub mod custody;
pub mod deployment;
pub mod logging;
pub mod orchestrator;
pub mod result_sink;
pub mod settings;
pub mod signer;
pub mod sol;
