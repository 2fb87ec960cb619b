//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use parceltiles::pyramid::BuildError;
use parceltiles::store::StoreError;
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Invalid command-line argument combination
    InvalidArgs(String),
    /// Failed to connect to the spatial database
    Database(String),
    /// Tile archive error
    Store(StoreError),
    /// Pyramid build failed before any tile work started
    Build(BuildError),
    /// Tile server failed to bind or serve
    Serve(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        if let CliError::Database(_) = self {
            eprintln!();
            eprintln!("Make sure:");
            eprintln!("  1. The database is reachable at the given connection string");
            eprintln!("  2. The PostGIS extension is installed (CREATE EXTENSION postgis)");
            eprintln!("  3. The source table exists and has a geometry column");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::InvalidArgs(msg) => write!(f, "Invalid arguments: {}", msg),
            CliError::Database(msg) => write!(f, "Database connection failed: {}", msg),
            CliError::Store(e) => write!(f, "Tile archive error: {}", e),
            CliError::Build(e) => write!(f, "Pyramid build failed: {}", e),
            CliError::Serve(e) => write!(f, "Tile server error: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) => Some(e),
            CliError::Store(e) => Some(e),
            CliError::Build(e) => Some(e),
            CliError::Serve(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<BuildError> for CliError {
    fn from(e: BuildError) -> Self {
        CliError::Build(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_args_display() {
        let err = CliError::InvalidArgs("bad bbox".to_string());
        assert_eq!(err.to_string(), "Invalid arguments: bad bbox");
    }

    #[test]
    fn test_database_display() {
        let err = CliError::Database("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_error_trait() {
        fn assert_error<E: std::error::Error>() {}
        assert_error::<CliError>();
    }
}
