//! Cache policy agent.
//!
//! Receives the three lifecycle signals a hosting runtime delivers
//! (install, activate, fetch) and decides, per request, whether to go
//! cache-first, network-first, or straight to the network.

pub mod agent;
pub mod route;
mod strategy;

#[cfg(test)]
mod testing;

pub use agent::{ActivateReport, CachePolicyAgent, InstallReport, LifecycleState};
pub use route::{BypassReason, Route, classify};
