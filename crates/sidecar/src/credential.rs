//! Inbound credential verification.

/// Decides whether a presented `Authorization` value is acceptable.
///
/// Call sites only depend on this trait, so the shared-secret check can be
/// replaced by a stronger scheme without touching them.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, presented: &str) -> bool;
}

/// Accepts exactly one secret string, compared by equality.
#[derive(Clone)]
pub struct SharedSecret(String);

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The secret, for use as the outbound `Authorization` value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

// Keep the secret out of logs.
impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret(***)")
    }
}

impl CredentialVerifier for SharedSecret {
    fn verify(&self, presented: &str) -> bool {
        presented == self.0
    }
}

impl<F> CredentialVerifier for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn verify(&self, presented: &str) -> bool {
        self(presented)
    }
}
