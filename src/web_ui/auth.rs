//! Cookie sessions and the login pages.

use std::convert::Infallible;
use askama::Template;
use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use cookie::{Cookie, SameSite};
use dashmap::DashMap;
use log::{info, warn};
use serde::Deserialize;
use crate::entities::{User, UserId};
use crate::utils::hash_utils::new_session_token;
use crate::web_ui::error::{redirect_to, WebError};
use crate::web_ui::{AppState, HtmlTemplate};

pub const SESSION_COOKIE: &str = "tagmark_session";

/// Session token to user mapping. Sessions live as long as the process.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: DashMap<String, UserId>,
}

impl SessionStore {
    pub fn create(&self, user_id: UserId) -> String {
        let token = new_session_token();
        self.sessions.insert(token.clone(), user_id);
        token
    }

    pub fn get(&self, token: &str) -> Option<UserId> {
        self.sessions.get(token).map(|x| *x.value())
    }

    pub fn remove(&self, token: &str) -> Option<UserId> {
        self.sessions.remove(token).map(|(_, user_id)| user_id)
    }
}

fn session_token(headers: &HeaderMap) -> Option<String> {
    headers.get_all(COOKIE).iter()
        .filter_map(|x| x.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(|x| x.ok())
        .find(|x| x.name() == SESSION_COOKIE)
        .map(|x| x.value().to_string())
}

fn session_cookie(token: &str) -> String {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
        .to_string()
}

fn removal_cookie() -> String {
    let mut cookie = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    cookie.make_removal();
    cookie.to_string()
}

/// The signed in user, if any. Never rejects.
pub struct CurrentUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user_id = match session_token(&parts.headers).and_then(|x| state.sessions.get(&x)) {
            Some(user_id) => user_id,
            None => return Ok(CurrentUser(None)),
        };
        let client = state.client.read().await;
        Ok(CurrentUser(client.get_user_by_id(user_id)))
    }
}

impl CurrentUser {
    pub fn require(self, login_url: &str) -> Result<User, WebError> {
        self.0.ok_or_else(|| WebError::Unauthenticated { login_url: login_url.to_string(), next: None })
    }

    /// Like [`CurrentUser::require`], but the login page sends the user back to `next`.
    pub fn require_and_return(self, login_url: &str, next: &str) -> Result<User, WebError> {
        self.0.ok_or_else(|| WebError::Unauthenticated {
            login_url: login_url.to_string(),
            next: Some(next.to_string()),
        })
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/logout", post(logout))
}

#[derive(Template)]
#[template(path = "login.html")]
struct LoginTemplate {
    current_user: Option<User>,
    next: String,
    error: Option<String>,
}

#[derive(Deserialize)]
struct LoginQuery {
    next: Option<String>,
}

#[derive(Deserialize)]
struct LoginForm {
    username: String,
    password: String,
    next: Option<String>,
}

/// Only local absolute paths are followed after login.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(next) if next.starts_with('/') && !next.starts_with("//") => next,
        _ => "/",
    }
}

async fn login_page(CurrentUser(current_user): CurrentUser, Query(query): Query<LoginQuery>) -> impl IntoResponse {
    let next = safe_next(query.next.as_deref()).to_string();
    HtmlTemplate(LoginTemplate { current_user, next, error: None })
}

async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let next = safe_next(form.next.as_deref()).to_string();
    let client = state.client.read().await;
    let user = client.authenticate(&form.username, &form.password);
    drop(client);

    match user {
        Some(user) => {
            let token = state.sessions.create(user.id);
            info!("user logged in: {}", user);
            let mut response = redirect_to(&next);
            if let Ok(value) = session_cookie(&token).parse() {
                response.headers_mut().insert(SET_COOKIE, value);
            }
            response
        }
        None => {
            warn!("failed login attempt for: {}", form.username);
            let error = Some("Invalid username or password.".to_string());
            HtmlTemplate(LoginTemplate { current_user: None, next, error }).into_response()
        }
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.remove(&token);
    }
    let mut response = redirect_to("/");
    if let Ok(value) = removal_cookie().parse() {
        response.headers_mut().insert(SET_COOKIE, value);
    }
    response
}
