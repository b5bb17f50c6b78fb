//! # Edgeflow Core Storage
//!
//! Filesystem access used by the runtime: atomic writes for offset files and
//! reads for pipeline definitions. Everything goes through the
//! [`StorageProvider`] trait so offset stores can be pointed at other backends.
pub mod error;
pub mod provider;
pub mod local;

pub use provider::StorageProvider;
pub use local::LocalStorageProvider;

// Test module declaration
#[cfg(test)]
mod tests;
