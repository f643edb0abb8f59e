pub mod model;
pub mod token;

pub use model::{CredentialStatus, CurrentUser, StorageScope, TokenPair, UserRole};
