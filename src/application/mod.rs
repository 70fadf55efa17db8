// Deletion impact analysis and execution
pub mod deletion;

// Wiring of persistence and services for binaries
pub mod bootstrap;
