use super::{
    auth::{AuthToken, AuthTokenValue, HashedPassword},
    user_models::{is_valid_username, username_from_email, Identity, Profile, ProfileUpdate},
    FullUserStore,
};
use crate::sqlite_persistence::is_unique_violation;
use std::{sync::Arc, time::SystemTime};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const MIN_PASSWORD_CHARS: usize = 8;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("{0} is already taken")]
    Conflict(&'static str),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("User {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Persistence(#[from] anyhow::Error),
}

impl AccountError {
    fn validation<S: Into<String>>(field: &'static str, message: S) -> Self {
        AccountError::Validation {
            field,
            message: message.into(),
        }
    }
}

type AccountResult<T> = Result<T, AccountError>;

fn validate_username(username: &str) -> AccountResult<()> {
    if !is_valid_username(username) {
        return Err(AccountError::validation(
            "username",
            "must be 3 to 32 letters, digits, '_', '.' or '-'",
        ));
    }
    Ok(())
}

pub struct UserManager {
    user_store: Arc<dyn FullUserStore>,
}

impl UserManager {
    pub fn new(user_store: Arc<dyn FullUserStore>) -> Self {
        Self { user_store }
    }

    /// Creates an account, returning the new user id and its username.
    pub fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: Option<&str>,
    ) -> AccountResult<(usize, String)> {
        let email = email.trim().to_lowercase();
        if !email.contains('@') {
            return Err(AccountError::validation("email", "must be an e-mail address"));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(AccountError::validation(
                "password",
                format!("must be at least {} characters", MIN_PASSWORD_CHARS),
            ));
        }
        let username = match username.map(str::trim).filter(|u| !u.is_empty()) {
            Some(username) => username.to_string(),
            None => username_from_email(&email),
        };
        validate_username(&username)?;

        if self.user_store.get_user_id(&email)?.is_some() {
            return Err(AccountError::Conflict("email"));
        }
        if self.user_store.get_profile_by_username(&username)?.is_some() {
            return Err(AccountError::Conflict("username"));
        }

        let hashed = HashedPassword::new(password)?;
        let user_id = self
            .user_store
            .create_user(&email, &username, &hashed)
            .map_err(|err| {
                if is_unique_violation(&err) {
                    AccountError::Conflict("email or username")
                } else {
                    AccountError::Persistence(err)
                }
            })?;
        info!("Signed up user {} as {}", user_id, username);
        Ok((user_id, username))
    }

    /// Checks the password and issues a fresh auth token.
    pub fn login(&self, email: &str, password: &str) -> AccountResult<AuthToken> {
        let email = email.trim().to_lowercase();
        let Some(user_id) = self.user_store.get_user_id(&email)? else {
            debug!("Login for unknown e-mail {}", email);
            return Err(AccountError::InvalidCredentials);
        };
        let Some(credentials) = self.user_store.get_password_credentials(user_id)? else {
            warn!("User {} has no password credentials", user_id);
            return Err(AccountError::InvalidCredentials);
        };

        let verified = credentials.verify(password)?;
        self.user_store
            .touch_password_credentials(user_id, verified)?;
        if !verified {
            return Err(AccountError::InvalidCredentials);
        }

        let token = AuthToken {
            user_id,
            created: SystemTime::now(),
            last_used: None,
            value: AuthTokenValue::generate(),
        };
        self.user_store.add_user_auth_token(token.clone())?;
        Ok(token)
    }

    pub fn logout(&self, token: &AuthTokenValue) -> AccountResult<()> {
        if self.user_store.delete_user_auth_token(token)?.is_none() {
            debug!("Logout with an unknown token");
        }
        Ok(())
    }

    /// Resolves a session token to the identity it belongs to and marks it used.
    pub fn identity_for_token(&self, token: &AuthTokenValue) -> AccountResult<Option<Identity>> {
        let Some(auth_token) = self.user_store.get_user_auth_token(token)? else {
            return Ok(None);
        };
        let Some(email) = self.user_store.get_user_email(auth_token.user_id)? else {
            return Ok(None);
        };
        self.user_store
            .update_user_auth_token_last_used_timestamp(token)?;
        Ok(Some(Identity {
            user_id: auth_token.user_id,
            email,
        }))
    }

    /// Returns the user's own profile, creating it if the account predates profiles.
    pub fn get_profile(&self, identity: &Identity) -> AccountResult<Profile> {
        if let Some(profile) = self.user_store.get_profile(identity.user_id)? {
            return Ok(profile);
        }
        info!("Creating missing profile for user {}", identity.user_id);
        Ok(self
            .user_store
            .create_profile(identity.user_id, &username_from_email(&identity.email))?)
    }

    /// Public profile lookup, returns Ok(None) for users without a profile.
    pub fn find_profile(&self, user_id: usize) -> AccountResult<Option<Profile>> {
        Ok(self.user_store.get_profile(user_id)?)
    }

    pub fn get_profile_by_username(&self, username: &str) -> AccountResult<Profile> {
        self.user_store
            .get_profile_by_username(username)?
            .ok_or_else(|| AccountError::NotFound(username.to_string()))
    }

    pub fn update_profile(
        &self,
        identity: &Identity,
        update: &ProfileUpdate,
    ) -> AccountResult<Profile> {
        let current = self.get_profile(identity)?;
        if let Some(username) = &update.username {
            let username = username.trim();
            validate_username(username)?;
            if username != current.username
                && self.user_store.get_profile_by_username(username)?.is_some()
            {
                return Err(AccountError::Conflict("username"));
            }
        }

        self.user_store
            .update_profile(identity.user_id, update)
            .map_err(|err| {
                if is_unique_violation(&err) {
                    AccountError::Conflict("username")
                } else {
                    AccountError::Persistence(err)
                }
            })?
            .ok_or_else(|| AccountError::NotFound(identity.user_id.to_string()))
    }

    pub fn set_avatar_url(&self, identity: &Identity, avatar_url: &str) -> AccountResult<Profile> {
        self.get_profile(identity)?;
        self.user_store
            .set_avatar_url(identity.user_id, Some(avatar_url))?
            .ok_or_else(|| AccountError::NotFound(identity.user_id.to_string()))
    }

    pub fn prune_unused_auth_tokens(&self, unused_for_days: u64) -> AccountResult<usize> {
        Ok(self.user_store.prune_unused_auth_tokens(unused_for_days)?)
    }
}
