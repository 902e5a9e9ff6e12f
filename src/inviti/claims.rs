use crate::inviti::store::tokens::PendingToken;
use serde::{Deserialize, Serialize};

/// Issuer embedded in every credential this service signs. Credentials
/// minted by anything else are rejected at verification.
pub const ISSUER: &str = "inviti";

/// Audience embedded in every credential. Same value as the issuer: the
/// service talks to itself.
pub const AUDIENCE: &str = ISSUER;

// Canonical string forms for the boolean claims. Decoding is exact-text:
// anything that is not one of these two strings is not a flag.
const FLAG_TRUE: &str = "True";
const FLAG_FALSE: &str = "False";

/// Payload of a bearer credential.
///
/// The underlying claim representation only carries strings, so the two
/// permission flags use a canonical encoding shared by [`encode_flag`] and
/// [`decode_flag`]. The subject is the decimal form of the user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub aud: String,
    pub sub: String,
    pub can_manage_permissions: String,
    pub can_manage_vacancies: String,
}

impl Claims {
    /// Build the claim set for a user that just consumed a pending secret.
    #[must_use]
    pub fn new(user_id: u64, token: &PendingToken) -> Self {
        Self {
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            sub: user_id.to_string(),
            can_manage_permissions: encode_flag(token.can_manage_permissions).to_string(),
            can_manage_vacancies: encode_flag(token.can_manage_vacancies).to_string(),
        }
    }

    /// Recover the user id from the subject claim.
    ///
    /// Returns `None` when the claim does not parse as an unsigned integer;
    /// callers treat that as an authorization failure.
    #[must_use]
    pub fn user_id(&self) -> Option<u64> {
        self.sub.parse::<u64>().ok()
    }

    #[must_use]
    pub fn manage_permissions(&self) -> Option<bool> {
        decode_flag(&self.can_manage_permissions)
    }

    #[must_use]
    pub fn manage_vacancies(&self) -> Option<bool> {
        decode_flag(&self.can_manage_vacancies)
    }
}

#[must_use]
pub fn encode_flag(value: bool) -> &'static str {
    if value {
        FLAG_TRUE
    } else {
        FLAG_FALSE
    }
}

#[must_use]
pub fn decode_flag(value: &str) -> Option<bool> {
    match value {
        FLAG_TRUE => Some(true),
        FLAG_FALSE => Some(false),
        _ => None,
    }
}
