pub mod client;

pub use client::{BridgeClient, BridgeOutcome};
