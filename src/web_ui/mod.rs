pub mod auth;
pub mod bookmarks;
pub mod error;
pub mod listings;
pub mod pages;
pub mod routes;

use std::sync::Arc;
use anyhow::Context;
use askama::Template;
use axum::body::Body;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use axum_macros::FromRef;
use http::header::{CACHE_CONTROL, CONTENT_TYPE};
use http::{HeaderValue, StatusCode};
use log::info;
use random_port::{PortPicker, Protocol};
use serde::Serialize;
use tokio::sync::RwLock;
use tower_http::trace::TraceLayer;
use crate::client::TagmarkClient;
use crate::config::AppConfig;
use crate::library::{Book, Quote};
use crate::utils::hash_utils::xxhash_str;
use crate::web_ui::auth::SessionStore;
use crate::web_ui::routes::Pathmaker;

// styles
const TAGMARK_STYLES: &[u8] = include_bytes!("assets/styles/tagmark.css");

pub async fn serve(config: AppConfig, client: TagmarkClient) -> anyhow::Result<()> {
    info!("users: {}, books: {}, quotes: {}", client.get_all_users().len(), client.get_all_books().len(), client.get_all_quotes().len());

    let port = match config.port {
        Some(port) => port,
        None => PortPicker::new().protocol(Protocol::Tcp).pick()
            .map_err(|e| anyhow::anyhow!("failed to pick a free port: {:?}", e))?,
    };

    info!("initializing router...");
    let router = build_router(AppState::new(config, client));

    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await
        .with_context(|| format!("failed to bind to address {}", addr))?;
    info!("listening on http://{}", &addr);
    axum::serve(listener, router).await.context("error running HTTP server")?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        // styles
        .route("/styles/tagmark.css", get(get_tagmark_styles))

        // bookmark panels, one route set per bookmarkable type
        .merge(Pathmaker::<Book>::new().into_router())
        .merge(Pathmaker::<Quote>::new().into_router())

        .merge(listings::router())
        .merge(pages::router())
        .merge(auth::router())

        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[derive(Clone, FromRef)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub client: Arc<RwLock<TagmarkClient>>,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(config: AppConfig, client: TagmarkClient) -> Self {
        Self {
            config: Arc::new(config),
            client: Arc::new(RwLock::new(client)),
            sessions: Arc::new(SessionStore::default()),
        }
    }
}

pub struct HtmlTemplate<T>(pub T);

impl<T> IntoResponse for HtmlTemplate<T>
    where
        T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(html) => Html(html).into_response(),
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to render template. Error: {}", err),
            ).into_response(),
        }
    }
}

async fn get_tagmark_styles() -> impl IntoResponse {
    let mut response = Response::new(Body::from(TAGMARK_STYLES));
    response.headers_mut().insert(CACHE_CONTROL, HeaderValue::from_static("public, max-age=31536000"));
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/css"));
    response
}

/// A tag chip: the name plus colors derived from it, so a tag looks the same everywhere.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ExtendedTag {
    pub name: String,
    pub url: String,
    pub bg_color: String,
    pub fg_color: String,
}

impl From<String> for ExtendedTag {
    fn from(tag: String) -> Self {
        let bg_color = get_bg_color(&tag);
        let fg_color = get_fg_color(&bg_color);
        Self {
            url: format!("/tag/{}", urlencoding::encode(&tag)),
            name: tag,
            bg_color,
            fg_color,
        }
    }
}

fn get_bg_color(text: &str) -> String {
    const MAX_VALUE: u64 = 0xFFFFFF;
    let color = xxhash_str(text) % MAX_VALUE;
    format!("#{:06x}", color)
}

fn get_fg_color(bg_color: &str) -> String {
    let bg_color = bg_color.trim_start_matches('#');
    let channel = |range: std::ops::Range<usize>| {
        bg_color.get(range)
            .and_then(|x| u8::from_str_radix(x, 16).ok())
            .unwrap_or(0) as f32
    };
    let yiq = (channel(0..2) * 299.0 + channel(2..4) * 587.0 + channel(4..6) * 114.0) / 1000.0;
    let fg_color = if yiq >= 128.0 { "black" } else { "white" };
    fg_color.to_string()
}


#[cfg(test)]
mod tests {
    use axum::http::Request;
    use tower::ServiceExt;
    use super::test_utils::*;
    use super::*;

    #[test]
    fn tag_colors_are_stable() {
        let tag = ExtendedTag::from("sci-fi".to_string());
        assert_eq!(tag, ExtendedTag::from("sci-fi".to_string()));
        assert_eq!(tag.bg_color.len(), 7);
        assert!(tag.bg_color.starts_with('#'));
        assert_eq!(tag.url, "/tag/sci-fi");
    }

    #[test]
    fn fg_color_contrasts_with_background() {
        assert_eq!(get_fg_color("#ffffff"), "black");
        assert_eq!(get_fg_color("#000000"), "white");
        assert_eq!(get_fg_color("#ffff00"), "black");
        assert_eq!(get_fg_color("#0000ff"), "white");
    }

    #[tokio::test]
    async fn serves_styles() {
        let app = TestApp::new().await;
        let request = Request::builder().uri("/styles/tagmark.css").body(Body::empty()).unwrap();
        let response = app.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/css");
    }
}
