//! Authentication for remote shell access
//!
//! Decides which credential an operation needs and produces it.

pub mod method;
pub mod resolver;

pub use method::AuthMethod;
pub use resolver::{
    CredentialRequest, CredentialRequirement, CredentialResolver, ResolvedCredential,
};
