//! # Riposte Common
//!
//! Common types shared across the Riposte crates.
//!
//! This crate provides:
//! - ID types (EntityId)
//! - The top-level error type and result alias
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id_roundtrip() {
        let id = EntityId::from_raw(42);
        assert_eq!(id.raw(), 42);
        assert!(id.is_valid());
        assert!(!EntityId::NULL.is_valid());
    }

    #[test]
    fn test_error_display() {
        let err = RiposteError::Config("bad value".to_string());
        assert_eq!(err.to_string(), "Configuration error: bad value");
    }
}
