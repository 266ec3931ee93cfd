//! Authentication module
//!
//! Contains the reachability probe, the token exchange and the login
//! coordinator that drives them.

mod login;
mod probe;
pub mod token;

pub use login::{
    CredentialMode, CredentialState, LoginCoordinator, LoginState, PROBE_DEBOUNCE,
};
