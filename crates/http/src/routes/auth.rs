//! Edge auth routes under `/api/auth`.
//!
//! The identity API's tokens never reach the browser: they live in the
//! encrypted session cookie and are replayed server-side.

use crate::{
    error::HttpError,
    services::ServerSession,
    state::AppState,
    types::{ActionResponse, SessionResponse},
};
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use portal_core::{LoginPayload, RegistrationPayload};
use tracing::instrument;

type Rejection = (CookieJar, HttpError);

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .route("/user", get(user))
}

/// `POST /api/auth/login`
#[instrument(name = "edge_login", skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(credentials): Json<LoginPayload>,
) -> Result<(CookieJar, Json<SessionResponse>), HttpError> {
    let grant = state.upstream.login(&credentials).await.map_err(|e| {
        warn!(status = ?e.status(), "Upstream login failed");
        HttpError::from(e)
    })?;

    let session = ServerSession::from_grant(grant, state.sessions.ttl(), Utc::now()).ok_or_else(|| {
        warn!("Upstream login returned no access token or user");
        HttpError::AuthenticationFailed("Invalid credentials".to_string())
    })?;

    let jar = state.sessions.save(jar, &session)?;
    info!(username = session.user.username(), "Login successful");

    Ok((
        jar,
        Json(SessionResponse {
            success: true,
            message: Some("Login successful".to_string()),
            user: Some(session.user),
        }),
    ))
}

/// `POST /api/auth/register`
#[instrument(name = "edge_register", skip_all)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegistrationPayload>,
) -> Result<Json<ActionResponse>, HttpError> {
    let response = state.upstream.register(&payload).await.map_err(|e| {
        warn!(status = ?e.status(), "Upstream registration failed");
        HttpError::from(e)
    })?;

    Ok(Json(ActionResponse {
        success: true,
        message: response
            .message
            .unwrap_or_else(|| "Registration successful".to_string()),
        data: response.data,
    }))
}

/// `POST /api/auth/logout`. Always succeeds and always clears the cookie.
#[instrument(name = "edge_logout", skip_all)]
pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Json<ActionResponse>) {
    let token_id = state
        .sessions
        .load(&jar)
        .and_then(|session| session.token_id().map(str::to_string));

    let message = match token_id {
        Some(token_id) => match state.upstream.logout(Some(&token_id)).await {
            Ok(_) => "Logged out successfully",
            Err(e) => {
                warn!(status = ?e.status(), "Upstream logout failed, clearing session anyway");
                "Logged out"
            }
        },
        None => "Logged out successfully",
    };

    (
        state.sessions.clear(jar),
        Json(ActionResponse {
            success: true,
            message: message.to_string(),
            data: None,
        }),
    )
}

/// `POST /api/auth/refresh`. Any failure clears the session.
#[instrument(name = "edge_refresh", skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SessionResponse>), Rejection> {
    let reject = |jar: CookieJar, message: String| {
        warn!(%message, "Session refresh failed");
        Err((state.sessions.clear(jar), HttpError::AuthenticationFailed(message)))
    };

    let Some(token_id) = state
        .sessions
        .load(&jar)
        .and_then(|session| session.token_id().map(str::to_string))
    else {
        return reject(jar, "No active session".to_string());
    };

    let grant = match state.upstream.refresh(Some(&token_id)).await {
        Ok(grant) => grant,
        Err(e) => {
            let message = e
                .user_message()
                .unwrap_or_else(|| "Token refresh failed".to_string());
            return reject(jar, message);
        }
    };

    let Some(session) = ServerSession::from_grant(grant, state.sessions.ttl(), Utc::now()) else {
        return reject(jar, "Token refresh failed".to_string());
    };

    let jar = match state.sessions.save(jar.clone(), &session) {
        Ok(jar) => jar,
        Err(e) => return Err((state.sessions.clear(jar), e)),
    };

    debug!("Session refreshed");
    Ok((
        jar,
        Json(SessionResponse {
            success: true,
            message: Some("Token refreshed successfully".to_string()),
            user: Some(session.user),
        }),
    ))
}

/// `GET /api/auth/user`. Re-reads the identity and updates the session.
///
/// An expired access token answers 401 without an upstream call so the
/// browser can `POST /api/auth/refresh`.
#[instrument(name = "edge_user", skip_all)]
pub async fn user(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<SessionResponse>), Rejection> {
    let Some(mut session) = state.sessions.load(&jar) else {
        return Err((
            state.sessions.clear(jar),
            HttpError::AuthenticationFailed("Not authenticated".to_string()),
        ));
    };

    // Keep the cookie: its `token_id` can still mint a new access token
    if session.is_expired(Utc::now()) {
        debug!("Session access token expired");
        return Err((
            jar,
            HttpError::AuthenticationFailed("Session expired".to_string()),
        ));
    }

    match state.upstream.current_user(&session.access_token).await {
        Ok(user) => {
            session.user = user;
            let jar = match state.sessions.save(jar.clone(), &session) {
                Ok(jar) => jar,
                Err(e) => return Err((state.sessions.clear(jar), e)),
            };
            Ok((
                jar,
                Json(SessionResponse {
                    success: true,
                    message: None,
                    user: Some(session.user),
                }),
            ))
        }
        Err(e) => {
            warn!(status = ?e.status(), "Upstream user lookup failed");
            let message = e
                .user_message()
                .unwrap_or_else(|| "Failed to fetch user".to_string());
            Err((
                state.sessions.clear(jar),
                HttpError::AuthenticationFailed(message),
            ))
        }
    }
}
