pub mod backend;
pub mod cache;
pub mod config;
pub mod controller;
pub mod error;
pub mod models;
pub mod paths;
pub mod scheduler;
pub mod session;
pub mod sources;

#[cfg(test)]
mod testing;
