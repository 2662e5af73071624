pub mod commands;
pub mod connection;
pub mod engine;
pub mod mapper;
pub mod output;
pub mod parser;
pub mod properties;
pub mod property;
pub mod schedule;
pub mod schema;
pub mod transport;

#[cfg(test)]
mod fixtures;
