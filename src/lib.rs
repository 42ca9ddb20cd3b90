// ABOUTME: Library root for stackplan - the graph, resolvers, hooks and plan executor.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod hooks;
pub mod output;
pub mod plan;
pub mod provider;
pub mod resolvers;
pub mod stack;
pub mod types;
