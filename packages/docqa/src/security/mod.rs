//! Credential handling and output hardening.

mod credentials;

pub use credentials::{ApiCredentials, SecretString, PLACEHOLDER_API_KEY};
