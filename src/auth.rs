//! Identity capability injected into the survey backend client.
//!
//! The hosting application obtains tokens from its own sign-in flow; this
//! crate only needs something that can produce a bearer token on demand, so
//! the dependency is a trait rather than shared global state.

/// Supplies the bearer token attached to survey backend requests.
pub trait IdentityProvider: Send + Sync {
    /// Current token, or `None` when the caller is unauthenticated.
    fn bearer_token(&self) -> Option<String>;
}

/// A fixed token minted by the external sign-in flow.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

impl IdentityProvider for StaticToken {
    fn bearer_token(&self) -> Option<String> {
        Some(self.0.clone())
    }
}

/// No credentials; requests go out without an Authorization header.
pub struct Anonymous;

impl IdentityProvider for Anonymous {
    fn bearer_token(&self) -> Option<String> {
        None
    }
}
