//! Strongly-typed identifier value objects.
//!
//! Every identifier in this domain is an opaque string issued by someone else:
//! payment and transaction ids by the payment network, user ids by the session
//! provider, content ids by the content repository. None of them are parsed,
//! they are only required to be non-empty.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// Declares an opaque, non-empty string identifier.
///
/// Generates the constructor, accessors, `Display`, and serde support that
/// rejects empty strings on deserialization.
macro_rules! opaque_string_id {
    ($(#[$meta:meta])* $name:ident, $field:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "`, returning error if empty.")]
            pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(ValidationError::empty_field($field));
                }
                Ok(Self(id))
            }

            /// Returns the inner string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = ValidationError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

opaque_string_id!(
    /// Payment identifier issued by the payment network.
    ///
    /// Primary key of a payment record and the scope of reconciliation locks.
    PaymentId,
    "payment_id"
);

opaque_string_id!(
    /// User identifier (supplied by the session provider).
    UserId,
    "user_id"
);

opaque_string_id!(
    /// Identifier of a piece of creator-published content.
    ContentId,
    "content_id"
);

opaque_string_id!(
    /// Settlement transaction identifier reported by the client and
    /// verified against the payment network.
    TransactionId,
    "transaction_id"
);
