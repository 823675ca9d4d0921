//! Caller credentials passed through to external services.

use std::fmt;

/// An authentication token for the user requesting processing of a batch of
/// IDs. Handlers use it to look up and mutate records in authenticated
/// external services on the caller's behalf.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken {
    user_name: String,
    secret: String,
}

impl AuthToken {
    /// Create a token for the given user.
    pub fn new(user_name: impl Into<String>, secret: impl Into<String>) -> Self {
        AuthToken {
            user_name: user_name.into(),
            secret: secret.into(),
        }
    }

    /// The user name the token belongs to.
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    /// The token secret, for the Authorization header of outgoing requests.
    pub fn secret(&self) -> &str {
        &self.secret
    }
}

// the secret must never end up in logs or error messages
impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("user_name", &self.user_name)
            .field("secret", &"<redacted>")
            .finish()
    }
}
