pub mod cli;
pub mod config;
pub mod delegate;
pub mod doctor;
pub mod error;
pub mod orchestrator;
pub mod profiles;
pub mod provider;
pub mod runner;
pub mod task;
pub mod telemetry;
pub mod theme;
pub mod tools;

#[cfg(test)]
mod tests;
