pub mod traits;

// Rate provider implementations
pub mod frankfurter;
