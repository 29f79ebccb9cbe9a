use super::auth::{AuthToken, AuthTokenValue, HashedPassword, PasswordCredentials};
use super::user_models::{Profile, ProfileUpdate};
use anyhow::Result;

pub trait UserAuthCredentialsStore: Send + Sync {
    /// Returns the user's password credentials.
    /// Returns Ok(None) if the user has none.
    fn get_password_credentials(&self, user_id: usize) -> Result<Option<PasswordCredentials>>;

    /// Records a failed or successful login attempt on the credentials.
    fn touch_password_credentials(&self, user_id: usize, success: bool) -> Result<()>;
}

pub trait UserAuthTokenStore: Send + Sync {
    /// Returns a user's authentication token given an AuthTokenValue.
    /// Returns Ok(None) if the token does not exist.
    fn get_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Deletes an auth token given the token value.
    /// Returns Ok(None) if the token does not exist.
    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>>;

    /// Updates an auth token with the latest timestamp.
    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()>;

    /// Adds a new auth token.
    fn add_user_auth_token(&self, token: AuthToken) -> Result<()>;

    /// Prunes auth tokens that haven't been used for the specified number of days.
    /// Tokens never used count from their creation.
    /// Returns the number of tokens that were deleted.
    fn prune_unused_auth_tokens(&self, unused_for_days: u64) -> Result<usize>;
}

pub trait ProfileStore: Send + Sync {
    /// Returns Ok(None) if the user has no profile.
    fn get_profile(&self, user_id: usize) -> Result<Option<Profile>>;

    /// Returns Ok(None) if no profile has the username.
    fn get_profile_by_username(&self, username: &str) -> Result<Option<Profile>>;

    /// Creates an empty profile with the given username.
    fn create_profile(&self, user_id: usize, username: &str) -> Result<Profile>;

    /// Applies the update. Returns Ok(None) if the user has no profile.
    fn update_profile(&self, user_id: usize, update: &ProfileUpdate) -> Result<Option<Profile>>;

    /// Sets or clears the avatar url. Returns Ok(None) if the user has no profile.
    fn set_avatar_url(&self, user_id: usize, avatar_url: Option<&str>) -> Result<Option<Profile>>;
}

pub trait UserStore: UserAuthTokenStore + UserAuthCredentialsStore + Send + Sync {
    /// Creates the user with password credentials and profile in one transaction.
    /// Returns the user id.
    fn create_user(
        &self,
        email: &str,
        username: &str,
        password: &HashedPassword,
    ) -> Result<usize>;

    /// Returns Ok(None) if the user does not exist.
    fn get_user_email(&self, user_id: usize) -> Result<Option<String>>;

    /// Returns Ok(None) if no user has the e-mail.
    fn get_user_id(&self, email: &str) -> Result<Option<usize>>;
}

/// Everything the account layer needs from persistence.
pub trait FullUserStore: UserStore + ProfileStore {}

impl<T: UserStore + ProfileStore> FullUserStore for T {}
