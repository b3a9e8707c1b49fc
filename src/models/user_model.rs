use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{validate_max_chars, Patch, ValidationError};

pub const MAX_DISPLAY_NAME_LEN: usize = 100;
pub const MAX_BIO_LEN: usize = 1000;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn apply_profile(&mut self, update: &ProfileUpdate) {
        update.display_name.apply_to(&mut self.display_name);
        update.bio.apply_to(&mut self.bio);
        update.avatar_url.apply_to(&mut self.avatar_url);
    }
}

/// A user to insert. Only the hash of the bearer token is kept.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub token_hash: String,
    pub is_admin: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub display_name: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub bio: Patch<String>,
    #[serde(default, skip_serializing_if = "Patch::is_absent")]
    pub avatar_url: Patch<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_max_chars("display_name", self.display_name.value(), MAX_DISPLAY_NAME_LEN)?;
        validate_max_chars("bio", self.bio.value(), MAX_BIO_LEN)?;
        if let Some(url) = self.avatar_url.value() {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ValidationError::new("avatar_url must be an http(s) URL"));
            }
        }
        Ok(())
    }
}
