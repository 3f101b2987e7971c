//! Domain types and the ports the lifecycle depends on.
//!
//! Nothing in here talks to storage or the outside world directly; the
//! `ports` traits are implemented under `infrastructure` and `interfaces`.

pub mod actor;
pub mod allocation;
pub mod money;
pub mod payment;
pub mod ports;
