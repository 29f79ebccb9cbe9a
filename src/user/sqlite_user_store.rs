use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_versioned_db, system_time_from_column_result, unix_now, Column, ForeignKey,
    ForeignKeyOnChange, SqlType, Table, VersionedSchema, DEFAULT_TIMESTAMP,
};
use crate::user::*;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::{
    path::Path,
    str::FromStr,
    sync::{Arc, Mutex},
    time::SystemTime,
};
use tracing::{debug, info};

use super::auth::CredentialsHasher;
use super::user_models::username_from_email;

const USER_FK: ForeignKey = ForeignKey {
    foreign_table: "user",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

/// V 0
const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("email", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[&["email"]],
    indices: &[],
};
const AUTH_TOKEN_TABLE_V_0: Table = Table {
    name: "auth_token",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("value", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[&["value"]],
    indices: &[("idx_auth_token_user_id", "user_id")],
};
const USER_PASSWORD_CREDENTIALS_V_0: Table = Table {
    name: "user_password_credentials",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hash", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!("last_tried", &SqlType::Integer),
        sqlite_column!("last_used", &SqlType::Integer),
    ],
    unique_constraints: &[&["user_id"]],
    indices: &[],
};

/// V 1
const PROFILE_TABLE_V_1: Table = Table {
    name: "profile",
    columns: &[
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            is_primary_key = true,
            foreign_key = Some(&USER_FK)
        ),
        sqlite_column!("username", &SqlType::Text, non_null = true),
        sqlite_column!("full_name", &SqlType::Text),
        sqlite_column!("avatar_url", &SqlType::Text),
        sqlite_column!("bio", &SqlType::Text),
        sqlite_column!("github_username", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            non_null = true,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[&["username"]],
    indices: &[],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[
    VersionedSchema {
        version: 0,
        tables: &[
            USER_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            USER_PASSWORD_CREDENTIALS_V_0,
        ],
        migration: None,
    },
    VersionedSchema {
        version: 1,
        tables: &[
            USER_TABLE_V_0,
            AUTH_TOKEN_TABLE_V_0,
            USER_PASSWORD_CREDENTIALS_V_0,
            PROFILE_TABLE_V_1,
        ],
        migration: Some(|conn: &Connection| {
            PROFILE_TABLE_V_1.create(conn)?;
            let mut stmt = conn.prepare("SELECT id, email FROM user ORDER BY id")?;
            let users = stmt
                .query_map([], |row| Ok((row.get::<_, usize>(0)?, row.get::<_, String>(1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            for (user_id, email) in users {
                let username = available_username(conn, &username_from_email(&email), user_id)?;
                conn.execute(
                    "INSERT INTO profile (user_id, username) VALUES (?1, ?2)",
                    params![user_id, username],
                )?;
            }
            Ok(())
        }),
    },
];

/// Returns `base`, or `base` suffixed with the user id when taken.
fn available_username(conn: &Connection, base: &str, user_id: usize) -> Result<String> {
    let taken: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM profile WHERE username = ?1)",
        params![base],
        |row| row.get(0),
    )?;
    if !taken {
        return Ok(base.to_string());
    }
    let suffix = format!("_{}", user_id);
    let keep = 32usize.saturating_sub(suffix.len());
    Ok(format!("{}{}", &base[..base.len().min(keep)], suffix))
}

const PROFILE_COLUMNS: &str =
    "user_id, username, full_name, avatar_url, bio, github_username, created, updated";

fn profile_from_row(row: &Row) -> rusqlite::Result<Profile> {
    Ok(Profile {
        user_id: row.get(0)?,
        username: row.get(1)?,
        full_name: row.get(2)?,
        avatar_url: row.get(3)?,
        bio: row.get(4)?,
        github_username: row.get(5)?,
        created: row.get(6)?,
        updated: row.get(7)?,
    })
}

fn auth_token_from_row(row: &Row) -> rusqlite::Result<AuthToken> {
    Ok(AuthToken {
        user_id: row.get(0)?,
        value: AuthTokenValue(row.get(1)?),
        created: system_time_from_column_result(row.get(2)?),
        last_used: row
            .get::<usize, Option<i64>>(3)?
            .map(system_time_from_column_result),
    })
}

fn read_profile(conn: &Connection, user_id: usize) -> Result<Option<Profile>> {
    Ok(conn
        .query_row(
            &format!("SELECT {PROFILE_COLUMNS} FROM profile WHERE user_id = ?1"),
            params![user_id],
            profile_from_row,
        )
        .optional()?)
}

/// Empty strings clear an optional profile field.
fn normalize(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned_db(db_path, VERSIONED_SCHEMAS, "user")?;
        Ok(SqliteUserStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[cfg(test)]
impl SqliteUserStore {
    pub(crate) fn conn_for_tests(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap()
    }
}

impl UserStore for SqliteUserStore {
    fn create_user(&self, email: &str, username: &str, password: &HashedPassword) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        tx.execute("INSERT INTO user (email) VALUES (?1)", params![email])
            .with_context(|| format!("Failed to create user {}", email))?;
        let user_id = tx.last_insert_rowid() as usize;

        tx.execute(
            "INSERT INTO user_password_credentials (user_id, salt, hash, hasher) VALUES (?1, ?2, ?3, ?4)",
            params![user_id, password.salt, password.hash, password.hasher.to_string()],
        )?;
        tx.execute(
            "INSERT INTO profile (user_id, username) VALUES (?1, ?2)",
            params![user_id, username],
        )
        .with_context(|| format!("Failed to create profile {}", username))?;

        tx.commit()?;
        debug!("Created user {} with id {}", email, user_id);
        Ok(user_id)
    }

    fn get_user_email(&self, user_id: usize) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT email FROM {} WHERE id = ?1", USER_TABLE_V_0.name),
                params![user_id],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn get_user_id(&self, email: &str) -> Result<Option<usize>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT id FROM {} WHERE email = ?1", USER_TABLE_V_0.name),
                params![email],
                |row| row.get(0),
            )
            .optional()?)
    }
}

impl UserAuthTokenStore for SqliteUserStore {
    fn get_user_auth_token(&self, value: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                "SELECT user_id, value, created, last_used FROM auth_token WHERE value = ?1",
                params![value.0],
                auth_token_from_row,
            )
            .optional()?)
    }

    fn delete_user_auth_token(&self, token: &AuthTokenValue) -> Result<Option<AuthToken>> {
        let Some(token) = self.get_user_auth_token(token)? else {
            return Ok(None);
        };
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM auth_token WHERE value = ?1",
            params![token.value.0],
        )?;
        Ok(Some(token))
    }

    fn update_user_auth_token_last_used_timestamp(&self, token: &AuthTokenValue) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE auth_token SET last_used = ?1 WHERE value = ?2",
            params![unix_now(), token.0],
        )?;
        Ok(())
    }

    fn add_user_auth_token(&self, token: AuthToken) -> Result<()> {
        let created = token
            .created
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_else(|_| unix_now());
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO auth_token (value, user_id, created) VALUES (?1, ?2, ?3)",
            params![token.value.0, token.user_id, created],
        )?;
        Ok(())
    }

    fn prune_unused_auth_tokens(&self, unused_for_days: u64) -> Result<usize> {
        let cutoff = unix_now() - (unused_for_days as i64) * 24 * 60 * 60;
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM auth_token WHERE COALESCE(last_used, created) < ?1",
            params![cutoff],
        )?;
        if deleted > 0 {
            info!("Pruned {} auth tokens unused for {} days", deleted, unused_for_days);
        }
        Ok(deleted)
    }
}

impl UserAuthCredentialsStore for SqliteUserStore {
    fn get_password_credentials(&self, user_id: usize) -> Result<Option<PasswordCredentials>> {
        let conn = self.conn.lock().unwrap();
        let row = conn
            .query_row(
                "SELECT user_id, salt, hash, hasher, created, last_tried, last_used
                 FROM user_password_credentials WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok((
                        row.get::<_, usize>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<i64>>(4)?,
                        row.get::<_, Option<i64>>(5)?,
                        row.get::<_, Option<i64>>(6)?,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, salt, hash, hasher, created, last_tried, last_used)) = row else {
            return Ok(None);
        };
        Ok(Some(PasswordCredentials {
            user_id,
            salt,
            hash,
            hasher: CredentialsHasher::from_str(&hasher)?,
            created: system_time_from_column_result(created.unwrap_or_default()),
            last_tried: last_tried.map(system_time_from_column_result),
            last_used: last_used.map(system_time_from_column_result),
        }))
    }

    fn touch_password_credentials(&self, user_id: usize, success: bool) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let sql = if success {
            "UPDATE user_password_credentials SET last_tried = ?1, last_used = ?1 WHERE user_id = ?2"
        } else {
            "UPDATE user_password_credentials SET last_tried = ?1 WHERE user_id = ?2"
        };
        conn.execute(sql, params![unix_now(), user_id])?;
        Ok(())
    }
}

impl ProfileStore for SqliteUserStore {
    fn get_profile(&self, user_id: usize) -> Result<Option<Profile>> {
        let conn = self.conn.lock().unwrap();
        read_profile(&conn, user_id)
    }

    fn get_profile_by_username(&self, username: &str) -> Result<Option<Profile>> {
        let conn = self.conn.lock().unwrap();
        Ok(conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM profile WHERE username = ?1"),
                params![username],
                profile_from_row,
            )
            .optional()?)
    }

    fn create_profile(&self, user_id: usize, username: &str) -> Result<Profile> {
        let conn = self.conn.lock().unwrap();
        let username = available_username(&conn, username, user_id)?;
        conn.execute(
            "INSERT INTO profile (user_id, username) VALUES (?1, ?2)",
            params![user_id, username],
        )
        .with_context(|| format!("Failed to create profile for user {}", user_id))?;
        read_profile(&conn, user_id)?.context("Created profile not found")
    }

    fn update_profile(&self, user_id: usize, update: &ProfileUpdate) -> Result<Option<Profile>> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        if read_profile(&tx, user_id)?.is_none() {
            return Ok(None);
        }

        if let Some(username) = &update.username {
            tx.execute(
                "UPDATE profile SET username = ?1 WHERE user_id = ?2",
                params![username.trim(), user_id],
            )
            .with_context(|| format!("Failed to change username to {}", username))?;
        }
        for (column, value) in [
            ("full_name", &update.full_name),
            ("bio", &update.bio),
            ("github_username", &update.github_username),
        ] {
            if let Some(value) = value {
                tx.execute(
                    &format!("UPDATE profile SET {column} = ?1 WHERE user_id = ?2"),
                    params![normalize(value), user_id],
                )?;
            }
        }
        tx.execute(
            "UPDATE profile SET updated = ?1 WHERE user_id = ?2",
            params![unix_now(), user_id],
        )?;

        let profile = read_profile(&tx, user_id)?;
        tx.commit()?;
        Ok(profile)
    }

    fn set_avatar_url(&self, user_id: usize, avatar_url: Option<&str>) -> Result<Option<Profile>> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE profile SET avatar_url = ?1, updated = ?2 WHERE user_id = ?3",
            params![avatar_url, unix_now(), user_id],
        )?;
        if updated == 0 {
            return Ok(None);
        }
        read_profile(&conn, user_id)
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::sqlite_persistence::{is_unique_violation, BASE_DB_VERSION};
    use tempfile::TempDir;

    fn create_tmp_store() -> (SqliteUserStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let temp_file_path = temp_dir.path().join("test.db");
        let store = SqliteUserStore::new(&temp_file_path).unwrap();
        (store, temp_dir)
    }

    fn password() -> HashedPassword {
        HashedPassword::new("a-good-password").unwrap()
    }

    #[test]
    fn test_create_user() {
        let (store, _temp_dir) = create_tmp_store();

        let user_id = store
            .create_user("jane@example.com", "jane", &password())
            .unwrap();
        assert_eq!(user_id, 1);
        assert_eq!(
            store.get_user_id("jane@example.com").unwrap(),
            Some(user_id)
        );
        assert_eq!(
            store.get_user_email(user_id).unwrap().as_deref(),
            Some("jane@example.com")
        );
        assert_eq!(store.get_profile(user_id).unwrap().unwrap().username, "jane");
        assert!(store
            .get_password_credentials(user_id)
            .unwrap()
            .unwrap()
            .verify("a-good-password")
            .unwrap());

        let duplicate = store
            .create_user("jane@example.com", "jane2", &password())
            .unwrap_err();
        assert!(is_unique_violation(&duplicate));
    }

    #[test]
    fn duplicate_username_rolls_back_user() {
        let (store, _temp_dir) = create_tmp_store();
        store
            .create_user("a@example.com", "taken", &password())
            .unwrap();

        let err = store
            .create_user("b@example.com", "taken", &password())
            .unwrap_err();

        assert!(is_unique_violation(&err));
        assert_eq!(store.get_user_id("b@example.com").unwrap(), None);
    }

    #[test]
    fn handles_auth_tokens() {
        let (store, _temp_dir) = create_tmp_store();
        let user_id = store
            .create_user("jane@example.com", "jane", &password())
            .unwrap();

        let value = AuthTokenValue::generate();
        store
            .add_user_auth_token(AuthToken {
                user_id,
                created: SystemTime::now(),
                last_used: None,
                value: value.clone(),
            })
            .unwrap();

        let token = store.get_user_auth_token(&value).unwrap().unwrap();
        assert_eq!(token.user_id, user_id);
        assert!(token.last_used.is_none());

        store
            .update_user_auth_token_last_used_timestamp(&value)
            .unwrap();
        assert!(store
            .get_user_auth_token(&value)
            .unwrap()
            .unwrap()
            .last_used
            .is_some());

        assert!(store.delete_user_auth_token(&value).unwrap().is_some());
        assert!(store.get_user_auth_token(&value).unwrap().is_none());
        assert!(store.delete_user_auth_token(&value).unwrap().is_none());
    }

    #[test]
    fn prunes_stale_tokens_only() {
        let (store, _temp_dir) = create_tmp_store();
        let user_id = store
            .create_user("jane@example.com", "jane", &password())
            .unwrap();

        let stale = AuthTokenValue::generate();
        let fresh = AuthTokenValue::generate();
        let forty_days = std::time::Duration::from_secs(40 * 24 * 60 * 60);
        store
            .add_user_auth_token(AuthToken {
                user_id,
                created: SystemTime::now() - forty_days,
                last_used: None,
                value: stale.clone(),
            })
            .unwrap();
        store
            .add_user_auth_token(AuthToken {
                user_id,
                created: SystemTime::now() - forty_days,
                last_used: None,
                value: fresh.clone(),
            })
            .unwrap();
        store
            .update_user_auth_token_last_used_timestamp(&fresh)
            .unwrap();

        assert_eq!(store.prune_unused_auth_tokens(30).unwrap(), 1);
        assert!(store.get_user_auth_token(&stale).unwrap().is_none());
        assert!(store.get_user_auth_token(&fresh).unwrap().is_some());
    }

    #[test]
    fn updates_profile_fields() {
        let (store, _temp_dir) = create_tmp_store();
        let user_id = store
            .create_user("jane@example.com", "jane", &password())
            .unwrap();

        let profile = store
            .update_profile(
                user_id,
                &ProfileUpdate {
                    username: None,
                    full_name: Some("Jane Doe".to_string()),
                    bio: Some("hello".to_string()),
                    github_username: Some("janed".to_string()),
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(profile.full_name.as_deref(), Some("Jane Doe"));
        assert_eq!(profile.github_username.as_deref(), Some("janed"));

        let profile = store
            .update_profile(
                user_id,
                &ProfileUpdate {
                    username: Some("jane_d".to_string()),
                    bio: Some("   ".to_string()),
                    ..Default::default()
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(profile.username, "jane_d");
        assert_eq!(profile.bio, None);
        assert_eq!(profile.full_name.as_deref(), Some("Jane Doe"));

        let with_avatar = store
            .set_avatar_url(user_id, Some("http://x/avatars/1/1.png"))
            .unwrap()
            .unwrap();
        assert_eq!(
            with_avatar.avatar_url.as_deref(),
            Some("http://x/avatars/1/1.png")
        );
        assert!(store
            .update_profile(42, &ProfileUpdate::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_migration_v0_to_v1() {
        let temp_dir = TempDir::new().unwrap();
        let temp_file_path = temp_dir.path().join("test_migration.db");

        {
            let conn = Connection::open(&temp_file_path).unwrap();
            VERSIONED_SCHEMAS[0].create(&conn).unwrap();
            conn.execute(
                "INSERT INTO user (email) VALUES (?1)",
                params!["sam@example.com"],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO user (email) VALUES (?1)",
                params!["sam@other.org"],
            )
            .unwrap();

            let db_version: i64 = conn
                .query_row("PRAGMA user_version;", [], |row| row.get(0))
                .unwrap();
            assert_eq!(db_version, BASE_DB_VERSION as i64);
        }

        let store = SqliteUserStore::new(&temp_file_path).unwrap();

        {
            let conn = store.conn.lock().unwrap();
            let db_version: i64 = conn
                .query_row("PRAGMA user_version;", [], |row| row.get(0))
                .unwrap();
            assert_eq!(db_version, BASE_DB_VERSION as i64 + 1);
        }

        assert_eq!(store.get_profile(1).unwrap().unwrap().username, "sam");
        assert_eq!(store.get_profile(2).unwrap().unwrap().username, "sam_2");
        assert_eq!(
            store.get_profile_by_username("sam_2").unwrap().unwrap().user_id,
            2
        );
    }
}
