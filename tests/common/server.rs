//! Test server lifecycle management
//!
//! Each test gets an isolated server with its own databases and media directory.

use super::constants::*;
use super::fixtures::create_test_db_dir;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use vibey_server::forum::{ForumManager, ForumStore, SqliteForumStore};
use vibey_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use vibey_server::storage::{avatar_bucket_policy, AvatarService, FsObjectStorage};
use vibey_server::user::{SqliteUserStore, UserManager};
use vibey_server::votes::{VoteAggregator, VoteStore};

/// Test server instance with isolated databases
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Forum store for direct database access in tests
    #[allow(dead_code)]
    pub forum_store: Arc<SqliteForumStore>,

    /// Root of the served media directory
    #[allow(dead_code)]
    pub media_path: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_db_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// # Panics
    ///
    /// Panics if fixture creation, port binding or startup fails.
    pub async fn spawn() -> Self {
        let temp_db_dir = create_test_db_dir().expect("Failed to create test databases");
        let media_path = temp_db_dir.path().join("media");

        let user_store = Arc::new(
            SqliteUserStore::new(temp_db_dir.path().join("user.db"))
                .expect("Failed to open user store"),
        );
        let forum_store = Arc::new(
            SqliteForumStore::new(temp_db_dir.path().join("forum.db"))
                .expect("Failed to open forum store"),
        );

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let avatar_storage = FsObjectStorage::new(
            media_path.join("avatars"),
            format!("{}/media/avatars", base_url),
            avatar_bucket_policy(AVATAR_MAX_SIZE_BYTES),
        );

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            metrics_port: 0,
            frontend_dir_path: None,
            media_path: Some(media_path.to_string_lossy().to_string()),
            avatar_max_size_bytes: AVATAR_MAX_SIZE_BYTES,
        };

        let app = make_app(
            config,
            Arc::new(UserManager::new(user_store)),
            Arc::new(ForumManager::new(
                forum_store.clone() as Arc<dyn ForumStore>
            )),
            Arc::new(VoteAggregator::new(
                forum_store.clone() as Arc<dyn VoteStore>
            )),
            Arc::new(AvatarService::new(Arc::new(avatar_storage))),
        )
        .expect("Failed to build app");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            forum_store,
            media_path,
            _temp_db_dir: temp_db_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling `/`
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
