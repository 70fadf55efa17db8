// Deletion domain: entities, catalog, impacts, strategies, results
pub mod deletion;

// Repository traits
pub mod repositories;

// Domain-specific error types
pub mod errors;
