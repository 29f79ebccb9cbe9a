use super::error::ApiError;
use super::metrics;
use super::session::Session;
use super::state::*;
use crate::forum::{Page, ThreadSort, ThreadView, UserActivity};
use crate::user::{Profile, ProfileUpdate};

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{debug, info, warn};

const RECENT_THREADS_LIMIT: usize = 5;
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

#[derive(Serialize)]
struct ActivityStats {
    threads: usize,
    replies: usize,
    /// Upvotes received on the user's threads and replies.
    upvotes: i64,
    upvotes_cast: usize,
}

impl ActivityStats {
    fn new(activity: UserActivity, upvotes_cast: usize) -> Self {
        ActivityStats {
            threads: activity.threads,
            replies: activity.replies,
            upvotes: activity.upvotes_received,
            upvotes_cast,
        }
    }
}

#[derive(Serialize)]
struct ProfilePage {
    profile: Profile,
    stats: ActivityStats,
    recent_threads: Vec<ThreadView>,
}

/// Profiles without a recorded avatar fall back to the newest stored one.
async fn with_stored_avatar(avatars: &GuardedAvatarService, mut profile: Profile) -> Profile {
    if profile.avatar_url.is_none() {
        match avatars.latest_avatar_url(profile.user_id).await {
            Ok(url) => profile.avatar_url = url,
            Err(err) => warn!(
                "Could not look up stored avatar of user {}: {}",
                profile.user_id, err
            ),
        }
    }
    profile
}

async fn profile_page(state: &ServerState, profile: Profile) -> Result<ProfilePage, ApiError> {
    let profile = with_stored_avatar(&state.avatar_service, profile).await;
    let activity = state.forum_manager.user_activity(profile.user_id)?;
    let upvotes_cast = state.vote_aggregator.upvotes_cast(profile.user_id)?;
    let recent_threads = state
        .forum_manager
        .list_threads(
            None,
            Some(profile.user_id),
            ThreadSort::Newest,
            Page::new(None, Some(RECENT_THREADS_LIMIT)),
        )?
        .into_iter()
        .map(|thread| ThreadView::new(thread, None))
        .collect();
    Ok(ProfilePage {
        profile,
        stats: ActivityStats::new(activity, upvotes_cast),
        recent_threads,
    })
}

async fn get_profile(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    State(avatars): State<GuardedAvatarService>,
) -> Result<Json<Profile>, ApiError> {
    let profile = user_manager.get_profile(&session.identity)?;
    Ok(Json(with_stored_avatar(&avatars, profile).await))
}

async fn put_profile(
    session: Session,
    State(user_manager): State<GuardedUserManager>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
    debug!("Updating profile of user {}", session.user_id());
    Ok(Json(
        user_manager.update_profile(&session.identity, &update)?,
    ))
}

async fn upload_avatar(
    session: Session,
    State(state): State<ServerState>,
    mut multipart: Multipart,
) -> Result<Json<Profile>, ApiError> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(|err| ApiError::Validation {
        field: "file",
        message: err.body_text(),
    })? {
        if field.name() == Some("file") {
            let bytes = field.bytes().await.map_err(|err| ApiError::Validation {
                field: "file",
                message: err.body_text(),
            })?;
            file = Some(bytes);
            break;
        }
    }
    let bytes = file.ok_or_else(|| ApiError::Validation {
        field: "file",
        message: "multipart field `file` is missing".to_string(),
    })?;

    let url = match state
        .avatar_service
        .upload_avatar(session.user_id(), &bytes)
        .await
    {
        Ok(url) => url,
        Err(err) => {
            metrics::record_avatar_upload("rejected");
            return Err(err.into());
        }
    };
    metrics::record_avatar_upload("stored");
    info!("User {} avatar is now {}", session.user_id(), url);

    Ok(Json(
        state.user_manager.set_avatar_url(&session.identity, &url)?,
    ))
}

async fn get_dashboard(
    session: Session,
    State(state): State<ServerState>,
) -> Result<Json<ProfilePage>, ApiError> {
    let profile = state.user_manager.get_profile(&session.identity)?;
    Ok(Json(profile_page(&state, profile).await?))
}

async fn get_public_profile(
    State(state): State<ServerState>,
    Path(username): Path<String>,
) -> Result<Json<ProfilePage>, ApiError> {
    let profile = state.user_manager.get_profile_by_username(&username)?;
    Ok(Json(profile_page(&state, profile).await?))
}

pub fn make_user_routes(state: ServerState) -> Router {
    let avatar_body_limit = state.config.avatar_max_size_bytes + MULTIPART_OVERHEAD_BYTES;
    Router::new()
        .route("/profile", get(get_profile).put(put_profile))
        .route(
            "/avatar",
            post(upload_avatar).layer(DefaultBodyLimit::max(avatar_body_limit)),
        )
        .route("/dashboard", get(get_dashboard))
        .route("/profiles/{username}", get(get_public_profile))
        .with_state(state)
}
