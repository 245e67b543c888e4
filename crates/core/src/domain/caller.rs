use serde::{Deserialize, Serialize};

/// Caller identity as supplied by the verification layer.
///
/// The engine never validates tokens itself. Absence of `email` means any
/// structured-data intent must ask the caller to sign in instead of touching
/// the order store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    pub subject_id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

impl CallerIdentity {
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref().filter(|email| !email.trim().is_empty())
    }
}
