pub mod bunker;
pub mod conditions;
pub mod config;
pub mod data;
pub mod distance;
pub mod market;
pub mod parse;
pub mod portfolio;
pub mod problem;
pub mod query;
pub mod scenario;
pub mod termination;
pub mod voyage;

#[cfg(test)]
mod fixtures;

pub use query::{Desk, QueryError, Scope};
