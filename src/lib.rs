//! Core library for the swap-pipeline project.
//!
//! A single swap runs wallet connection, asset resolution, a Uniswap V3
//! pool snapshot, route construction and settlement planning before
//! submitting one router transaction and waiting for its receipt. See
//! [`orchestrator::SwapOrchestrator`] for the entry point.

pub mod config;
pub mod dex;
pub mod errors;
pub mod ledger;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod registry;
pub mod route;
pub mod settlement;
pub mod utils;
