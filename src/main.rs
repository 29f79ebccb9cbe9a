use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vibey_server::config::{AppConfig, CliConfig, FileConfig};
use vibey_server::forum::{ForumManager, ForumStore, SqliteForumStore};
use vibey_server::server::{metrics, run_server, RequestsLoggingLevel, ServerConfig};
use vibey_server::storage::{avatar_bucket_policy, AvatarService, FsObjectStorage};
use vibey_server::user::{SqliteUserStore, UserManager};
use vibey_server::votes::{VoteAggregator, VoteStore};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding user.db and forum.db.
    #[clap(long, value_parser = parse_path)]
    pub db_dir: Option<PathBuf>,

    /// Directory for uploaded media, defaults to <db-dir>/media.
    #[clap(long, value_parser = parse_path)]
    pub media_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,

    /// Public base url used when building media urls.
    #[clap(long)]
    pub public_base_url: Option<String>,

    /// Auth tokens unused for this many days are deleted. Set to 0 to disable pruning.
    #[clap(long, default_value_t = 30)]
    pub auth_token_retention_days: u64,

    /// Interval in hours between pruning runs.
    #[clap(long, default_value_t = 24)]
    pub prune_interval_hours: u64,

    /// Recompute every thread and reply vote counter from the stored votes before serving.
    #[clap(long)]
    pub reconcile_votes: bool,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            db_dir: args.db_dir.clone(),
            media_path: args.media_path.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
            public_base_url: args.public_base_url.clone(),
            auth_token_retention_days: args.auth_token_retention_days,
            prune_interval_hours: args.prune_interval_hours,
        }
    }
}

fn spawn_token_pruning(user_manager: Arc<UserManager>, retention_days: u64, interval_hours: u64) {
    info!(
        "Auth token pruning enabled: retaining {} days, pruning every {} hours",
        retention_days, interval_hours
    );

    tokio::spawn(async move {
        let interval = Duration::from_secs(interval_hours * 60 * 60);
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;

            match user_manager.prune_unused_auth_tokens(retention_days) {
                Ok(count) => {
                    if count > 0 {
                        info!("Pruned {} unused auth tokens", count);
                    }
                }
                Err(e) => {
                    error!("Failed to prune auth tokens: {}", e);
                }
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    info!("Initializing metrics...");
    metrics::init_metrics();

    info!("Opening user database at {:?}...", config.user_db_path());
    let user_store = Arc::new(SqliteUserStore::new(config.user_db_path())?);
    let user_manager = Arc::new(UserManager::new(user_store));

    info!("Opening forum database at {:?}...", config.forum_db_path());
    let forum_store = Arc::new(SqliteForumStore::new(config.forum_db_path())?);
    let forum_manager = Arc::new(ForumManager::new(
        forum_store.clone() as Arc<dyn ForumStore>
    ));
    let vote_aggregator = Arc::new(VoteAggregator::new(forum_store as Arc<dyn VoteStore>));
    if cli_args.reconcile_votes {
        info!("Reconciling vote counters...");
        vote_aggregator
            .reconcile_all()
            .context("Failed to reconcile vote counters")?;
    }

    forum_manager
        .seed_categories(&config.categories)
        .context("Failed to seed categories")?;

    std::fs::create_dir_all(config.avatars_dir())
        .with_context(|| format!("Failed to create {:?}", config.avatars_dir()))?;
    let avatar_storage = FsObjectStorage::new(
        config.avatars_dir(),
        config.avatars_base_url(),
        avatar_bucket_policy(config.avatar_max_size_bytes),
    );
    let avatar_service = Arc::new(AvatarService::new(Arc::new(avatar_storage)));

    if config.auth_token_retention_days > 0 {
        spawn_token_pruning(
            user_manager.clone(),
            config.auth_token_retention_days,
            config.prune_interval_hours,
        );
    }

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        metrics_port: config.metrics_port,
        frontend_dir_path: config.frontend_dir_path.clone(),
        media_path: Some(config.media_path.to_string_lossy().to_string()),
        avatar_max_size_bytes: config.avatar_max_size_bytes,
    };

    info!("Ready to serve at port {}!", config.port);
    run_server(
        server_config,
        user_manager,
        forum_manager,
        vote_aggregator,
        avatar_service,
    )
    .await
}
