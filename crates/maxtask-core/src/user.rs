use anyhow::{Context, bail};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::datetime::flexible_timestamp;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub phone: String,
    /// Data URI of the uploaded picture.
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(with = "flexible_timestamp")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Upper-cased first letters of each word, used when there is no avatar.
    pub fn initials(&self) -> String {
        self.name
            .split_whitespace()
            .filter_map(|word| word.chars().next())
            .flat_map(char::to_uppercase)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub avatar: Option<Option<String>>,
}

impl UserPatch {
    /// Profile form rules for the fields present in the patch.
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(name) = &self.name
            && name.trim().chars().count() < 2
        {
            bail!("name must have at least 2 characters");
        }

        if let Some(email) = &self.email {
            let email_re = Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$")
                .context("failed to compile email regex")?;
            if !email_re.is_match(email.trim()) {
                bail!("invalid email: {email}");
            }
        }

        if let Some(phone) = &self.phone {
            let phone_re =
                Regex::new(r"^[\d\s()+\-]+$").context("failed to compile phone regex")?;
            if phone.chars().count() < 10 {
                bail!("phone must have at least 10 digits");
            }
            if !phone_re.is_match(phone) {
                bail!("invalid phone format: {phone}");
            }
        }

        if let Some(Some(avatar)) = &self.avatar
            && !avatar.is_empty()
            && !avatar.starts_with("data:")
        {
            bail!("avatar must be a data URI");
        }

        Ok(())
    }
}

/// The signed-in user of a session, if any.
#[derive(Debug, Clone, Default)]
pub struct UserStore {
    user: Option<User>,
}

impl UserStore {
    pub fn new(user: Option<User>) -> Self {
        Self { user }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    /// Merges `patch` into the current user. Returns `false` when there is
    /// no user to update.
    #[tracing::instrument(skip(self, patch))]
    pub fn update_user(&mut self, patch: UserPatch) -> bool {
        let Some(user) = self.user.as_mut() else {
            debug!("no current user; update ignored");
            return false;
        };

        if let Some(name) = patch.name {
            user.name = name;
        }
        if let Some(email) = patch.email {
            user.email = email;
        }
        if let Some(phone) = patch.phone {
            user.phone = phone;
        }
        if let Some(avatar) = patch.avatar {
            user.avatar = avatar;
        }
        info!(id = user.id, "updated user");
        true
    }

    #[tracing::instrument(skip(self, user), fields(present = user.is_some()))]
    pub fn set_user(&mut self, user: Option<User>) {
        self.user = user;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{User, UserPatch, UserStore};

    fn user() -> User {
        User {
            id: 1,
            name: "joao silva".to_string(),
            email: "joao@email.com".to_string(),
            phone: "(11) 99999-9999".to_string(),
            avatar: None,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn update_merges_into_current_user() {
        let mut store = UserStore::new(Some(user()));
        assert!(store.update_user(UserPatch {
            phone: Some("+55 11 98888-7777".to_string()),
            ..UserPatch::default()
        }));

        let current = store.user().unwrap();
        assert_eq!(current.phone, "+55 11 98888-7777");
        assert_eq!(current.email, "joao@email.com");
    }

    #[test]
    fn update_without_user_is_a_noop() {
        let mut store = UserStore::new(Some(user()));
        store.set_user(None);
        assert!(!store.update_user(UserPatch {
            name: Some("Ana".to_string()),
            ..UserPatch::default()
        }));
        assert!(store.user().is_none());
    }

    #[test]
    fn initials_use_each_word() {
        assert_eq!(user().initials(), "JS");
    }

    #[test]
    fn validation_mirrors_profile_form() {
        let ok = UserPatch {
            name: Some("Ana".to_string()),
            email: Some("ana@example.org".to_string()),
            phone: Some("(21) 3333-4444".to_string()),
            avatar: Some(Some("data:image/png;base64,AAAA".to_string())),
        };
        assert!(ok.validate().is_ok());

        let short_name = UserPatch {
            name: Some("A".to_string()),
            ..UserPatch::default()
        };
        assert!(short_name.validate().is_err());

        let bad_email = UserPatch {
            email: Some("ana.example.org".to_string()),
            ..UserPatch::default()
        };
        assert!(bad_email.validate().is_err());

        let letters = UserPatch {
            phone: Some("call me maybe".to_string()),
            ..UserPatch::default()
        };
        assert!(letters.validate().is_err());

        let too_short = UserPatch {
            phone: Some("1234".to_string()),
            ..UserPatch::default()
        };
        assert!(too_short.validate().is_err());
    }
}
