//! Identity collaborator
//!
//! Resolves the credential presented at admission into the identity that owns
//! the session. Any failure rejects the connection before anything is registered.

use async_trait::async_trait;
use emotrack_common::IdentityId;

use crate::error::Result;

/// Resolve a caller-supplied credential to an identity
///
/// Implementations return `Error::Auth` for every rejection, including
/// backend failures during the lookup.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, credential: &str) -> Result<IdentityId>;
}
