//! Application layer containing the lifecycle orchestration.
//!
//! `TransitionEngine` owns every guarded write to a payment. The allocation
//! ledger, disbursement recorder and generation job build on it, and
//! `PayrollDesk` exposes them behind one entry point.

pub mod desk;
pub mod disbursement;
pub mod engine;
pub mod generation;
pub mod guard;
pub mod ledger;
