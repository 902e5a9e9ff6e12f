use secrecy::SecretString;

/// Process-wide configuration that is not part of any single request:
/// the credential signing key and the optional bootstrap secret. Both are
/// read once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub signing_key: SecretString,
    pub first_secret: Option<SecretString>,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(signing_key: SecretString, first_secret: Option<SecretString>) -> Self {
        Self {
            signing_key,
            first_secret,
        }
    }
}
