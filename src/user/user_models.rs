use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref USERNAME_RE: Regex =
        Regex::new(r"^[A-Za-z0-9_.-]{3,32}$").expect("valid username regex");
}

/// The authenticated caller of a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user_id: usize,
    pub email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub user_id: usize,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub github_username: Option<String>,
    pub created: i64,
    pub updated: i64,
}

/// Fields a user may change on their own profile.
/// `None` leaves the field untouched, an empty string clears an optional field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub bio: Option<String>,
    pub github_username: Option<String>,
}

pub fn is_valid_username(username: &str) -> bool {
    USERNAME_RE.is_match(username)
}

/// Username derived from the local part of an e-mail address, used when
/// signing up without one and when backfilling profiles.
pub fn username_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    let mut username: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .take(32)
        .collect();
    while username.len() < 3 {
        username.push('_');
    }
    username
}
