pub mod auth;
mod sqlite_user_store;
mod user_manager;
pub mod user_models;
mod user_store;

pub use auth::{AuthToken, AuthTokenValue, HashedPassword, PasswordCredentials};
pub use sqlite_user_store::SqliteUserStore;
pub use user_manager::{AccountError, UserManager};
pub use user_models::{Identity, Profile, ProfileUpdate};
pub use user_store::{
    FullUserStore, ProfileStore, UserAuthCredentialsStore, UserAuthTokenStore, UserStore,
};
