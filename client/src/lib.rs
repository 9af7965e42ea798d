//! Client-side utilities for the DAO voting program.
//!
//! Includes instruction-building contexts, the transaction orchestrator, read-only views and the
//! proposal board view model, rejection classification, and an in-memory stand-in for the program.

pub mod actions;
pub mod board;
pub mod connection;
pub mod context;
pub mod forms;
pub mod logs;
pub mod mock_helpers;
pub mod pda;
pub mod rejection;
pub mod transactions;
pub mod views;

pub use logs::LogColor;
