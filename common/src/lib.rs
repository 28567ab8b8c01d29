// Common library: recurring reminder scheduling shared by the API binary and tests

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod errors;
pub mod gateway;
pub mod lifecycle;
pub mod models;
pub mod recurrence;
pub mod scheduler;
pub mod telemetry;
pub mod users;
pub mod validation;
