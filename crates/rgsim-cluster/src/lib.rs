//! Simulated placement metadata for a sharded, replicated key-value store.
//!
//! A [`Cluster`] tracks stores, the regions tiling the keyspace, their peers
//! and leaders, and lets tests split, merge, move leadership, take stores
//! down and inject per-request delays between steps.

pub mod bootstrap;
mod cluster;
mod delay;
mod id;
mod query;
mod region;
mod split;
mod store;

pub use cluster::Cluster;
