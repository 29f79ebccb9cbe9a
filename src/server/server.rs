use anyhow::{Context, Result};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use axum_extra::extract::cookie::{Cookie, SameSite};
use tower_http::services::ServeDir;

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "slowdown")]
use super::slowdown_request;
use super::{
    error::ApiError, forum_routes::make_forum_routes, log_requests, metrics,
    session::COOKIE_SESSION_TOKEN_KEY, state::*, user_routes::make_user_routes, ServerConfig,
};
use crate::server::session::Session;
use crate::user::{AuthTokenValue, Profile};

#[derive(Serialize)]
struct ServerStats {
    pub uptime: String,
    pub version: &'static str,
    pub started_at: String,
}

fn format_uptime(duration: Duration) -> String {
    let total_seconds = duration.as_secs();

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{}d {:02}:{:02}:{:02}", days, hours, minutes, seconds)
}

#[derive(Deserialize, Debug)]
struct SignUpBody {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Serialize)]
struct SignUpResponse {
    user_id: usize,
    username: String,
}

#[derive(Deserialize)]
struct LoginBody {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
struct LoginSuccessResponse {
    token: String,
}

#[derive(Serialize)]
struct SessionResponse {
    user_id: usize,
    email: String,
    profile: Profile,
}

async fn home(State(state): State<ServerState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed();
    let started_at = chrono::Utc::now()
        - chrono::Duration::from_std(uptime).unwrap_or_else(|_| chrono::Duration::zero());
    let stats = ServerStats {
        uptime: format_uptime(uptime),
        version: env!("CARGO_PKG_VERSION"),
        started_at: started_at.to_rfc3339(),
    };
    Json(stats)
}

fn session_cookie(value: String) -> Cookie<'static> {
    Cookie::build((COOKIE_SESSION_TOKEN_KEY, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

async fn sign_up(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<SignUpBody>,
) -> Result<Response, ApiError> {
    debug!("sign_up() called for {}", body.email);
    let (user_id, username) =
        user_manager.sign_up(&body.email, &body.password, body.username.as_deref())?;
    Ok((
        StatusCode::CREATED,
        Json(SignUpResponse { user_id, username }),
    )
        .into_response())
}

async fn login(
    State(user_manager): State<GuardedUserManager>,
    Json(body): Json<LoginBody>,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let auth_token = match user_manager.login(&body.email, &body.password) {
        Ok(token) => token,
        Err(err) => {
            metrics::record_login_attempt("failure", start.elapsed());
            return Err(err.into());
        }
    };
    metrics::record_login_attempt("success", start.elapsed());
    info!("User {} logged in", auth_token.user_id);

    let cookie = session_cookie(auth_token.value.0.clone());
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie.to_string())],
        Json(LoginSuccessResponse {
            token: auth_token.value.0,
        }),
    )
        .into_response())
}

async fn logout(
    State(user_manager): State<GuardedUserManager>,
    session: Session,
) -> Result<Response, ApiError> {
    user_manager.logout(&AuthTokenValue(session.token))?;

    let mut cookie = session_cookie(String::new());
    // Expire it in the past
    cookie.set_expires(time::OffsetDateTime::now_utc() - time::Duration::days(1));
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]).into_response())
}

async fn get_session(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
) -> Result<Json<SessionResponse>, ApiError> {
    let profile = user_manager.get_profile(&session.identity)?;
    Ok(Json(SessionResponse {
        user_id: session.identity.user_id,
        email: session.identity.email,
        profile,
    }))
}

pub fn make_app(
    config: ServerConfig,
    user_manager: GuardedUserManager,
    forum_manager: GuardedForumManager,
    vote_aggregator: GuardedVoteAggregator,
    avatar_service: GuardedAvatarService,
) -> Result<Router> {
    let state = ServerState::new(
        config.clone(),
        user_manager,
        forum_manager,
        vote_aggregator,
        avatar_service,
    );

    let auth_routes: Router = Router::new()
        .route("/signup", post(sign_up))
        .route("/login", post(login))
        .route("/logout", get(logout))
        .route("/session", get(get_session))
        .with_state(state.clone());

    let home_router: Router = match &config.frontend_dir_path {
        Some(frontend_path) => {
            let static_files_service =
                ServeDir::new(frontend_path).append_index_html_on_directories(true);
            Router::new().fallback_service(static_files_service)
        }
        None => Router::new()
            .route("/", get(home))
            .with_state(state.clone()),
    };

    let mut app: Router = home_router
        .nest("/v1/auth", auth_routes)
        .nest("/v1/forum", make_forum_routes(state.clone()))
        .nest("/v1/user", make_user_routes(state.clone()));

    if let Some(media_path) = &config.media_path {
        app = app.nest_service("/media", ServeDir::new(media_path));
    }

    #[cfg(feature = "slowdown")]
    {
        app = app.layer(middleware::from_fn(slowdown_request));
    }
    app = app.layer(middleware::from_fn_with_state(state.clone(), log_requests));

    Ok(app)
}

fn make_metrics_app() -> Router {
    Router::new().route("/metrics", get(metrics::metrics_handler))
}

pub async fn run_server(
    config: ServerConfig,
    user_manager: GuardedUserManager,
    forum_manager: GuardedForumManager,
    vote_aggregator: GuardedVoteAggregator,
    avatar_service: GuardedAvatarService,
) -> Result<()> {
    let port = config.port;
    let metrics_port = config.metrics_port;
    let app = make_app(
        config,
        user_manager,
        forum_manager,
        vote_aggregator,
        avatar_service,
    )?;

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port))
        .await
        .with_context(|| format!("Failed to bind port {}", port))?;
    let metrics_listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", metrics_port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", metrics_port))?;

    info!("Serving on port {}, metrics on port {}", port, metrics_port);
    futures::future::try_join(
        async { axum::serve(listener, app).await.context("Main server failed") },
        async {
            axum::serve(metrics_listener, make_metrics_app())
                .await
                .context("Metrics server failed")
        },
    )
    .await?;
    Ok(())
}
