use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{
        rejection::JsonRejection,
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        ConnectInfo, Request, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bridge::AuthError;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{ConfigResponse, LoginRequest, StatusResponse},
};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{info, warn};

use crate::{app_state::AppState, ws::WsChannel};

pub(crate) const SESSION_COOKIE: &str = "session_token";
const LOGIN_PAGE: &str = "/login.html";

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub(crate) fn build_router(state: Arc<AppState>) -> Router {
    let static_dir = state.static_dir.clone();

    let protected = Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .route("/api/config", get(http_config))
        .route("/api/logout", get(logout))
        .route_layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_session,
        ));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/login", post(login))
        .route_service(
            LOGIN_PAGE,
            ServeFile::new(static_dir.join("static").join("login.html")),
        )
        .nest_service("/static", ServeDir::new(static_dir.join("static")))
        .route("/ws", get(ws_handler))
        .merge(protected)
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Value of the session cookie, if the request carries one.
pub(crate) fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

/// Best-effort originating address: proxy headers first, then the peer.
pub(crate) fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };
    if let Some(first) = header_value("x-forwarded-for")
        .and_then(|xff| xff.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_string();
    }
    if let Some(real) = header_value("x-real-ip") {
        return real.to_string();
    }
    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn redirect_to_login() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, LOGIN_PAGE)]).into_response()
}

fn session_set_cookie(token: &str, max_age_secs: i64) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE}={token}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Strict"
    ))
    .ok()
}

async fn require_session(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let authorized = session_cookie(request.headers())
        .is_some_and(|token| state.sessions.validate_token(&token));
    if !authorized {
        return redirect_to_login();
    }
    next.run(request).await
}

async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let client_ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let Json(req) = body.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError::new(ErrorCode::Validation, e.body_text())),
        )
    })?;

    let session = state.sessions.login(&req.password).map_err(|e| match e {
        AuthError::InvalidPassword | AuthError::InvalidToken => {
            warn!(%client_ip, "login failed: invalid password");
            (
                StatusCode::UNAUTHORIZED,
                Json(ApiError::new(ErrorCode::Unauthorized, "invalid password")),
            )
        }
        AuthError::Entropy(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        ),
    })?;
    info!(%client_ip, "login successful");

    let cookie = session_set_cookie(&session.token, state.sessions.ttl().num_seconds())
        .ok_or_else(|| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiError::new(ErrorCode::Internal, "unencodable session token")),
            )
        })?;
    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(StatusResponse::ok()),
    )
        .into_response())
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(token) = session_cookie(&headers) {
        state.sessions.logout(&token);
    }
    let mut response = redirect_to_login();
    if let Some(cleared) = session_set_cookie("", 0) {
        response.headers_mut().insert(header::SET_COOKIE, cleared);
    }
    response
}

async fn http_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    let snapshot = state.config.get();
    Json(ConfigResponse {
        buttons: snapshot.midi.buttons.iter().map(|b| b.view()).collect(),
    })
}

async fn ws_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    peer: Option<ConnectInfo<SocketAddr>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let client_ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr));
    let token = session_cookie(&headers);
    let auth = match state.dispatcher.authenticate(token.as_deref()) {
        Ok(auth) => auth,
        Err(err) => {
            warn!(%client_ip, error = %err, "live connection refused");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ApiError::new(ErrorCode::Unauthorized, err.to_string())),
            )
                .into_response();
        }
    };
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| async move {
        dispatcher
            .serve(auth, WsChannel::new(socket), &client_ip)
            .await;
    })
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
