//! Content ownership port.
//!
//! The content repository is an external collaborator; this is the one fact
//! the paywall needs from it.

use crate::domain::foundation::{ContentId, DomainError, UserId};
use async_trait::async_trait;

#[async_trait]
pub trait ContentOwnership: Send + Sync {
    /// True if `user_id` created `content_id`. Unknown content is `false`.
    async fn is_creator(&self, user_id: &UserId, content_id: &ContentId)
        -> Result<bool, DomainError>;
}
