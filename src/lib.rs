//! Minimum-cost diet optimization service: assembles nutrient-bound
//! constraints over a priced product table, solves the linear program and
//! serves the resulting basket over HTTP.

pub mod assemble;
pub mod debug_dump;
pub mod domain;
pub mod models;
pub mod objective;
pub mod report;
pub mod server;
pub mod store;
