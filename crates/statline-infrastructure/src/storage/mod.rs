//! File-backed storage primitives.

mod atomic_toml;
mod secret_storage;

pub use atomic_toml::{AtomicTomlError, AtomicTomlFile};
pub use secret_storage::{ProviderSecret, SecretConfig, SecretStorage, SecretStorageError};
