//! Pages of the sample library app around the bookmark panels.

use askama::Template;
use axum::extract::{OriginalUri, Path, State};
use axum::routing::get;
use axum::Router;
use crate::client::TagmarkClient;
use crate::content_types::Bookmarkable;
use crate::entities::User;
use crate::library::{Book, Quote};
use crate::web_ui::auth::CurrentUser;
use crate::web_ui::bookmarks::PanelContext;
use crate::web_ui::error::WebError;
use crate::web_ui::routes::{Pathmaker, GET_ITEM, LAUNCH_MODAL};
use crate::web_ui::{AppState, HtmlTemplate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/book/detail/:pk", get(book_detail))
        .route("/user/:username", get(user_profile))
        .route("/books/:username", get(saved_books))
        .route("/quotes/:username", get(saved_quotes))
}

/// An object with the URLs of its bookmark panel.
pub struct ObjectLink {
    pub label: String,
    pub url: Option<String>,
    pub modal_url: String,
    pub panel_url: String,
}

impl ObjectLink {
    fn create<T: Bookmarkable>(object: &T, client: &TagmarkClient) -> Self {
        let object_id = object.object_id();
        Self {
            label: object.describe(client),
            url: object.detail_url(),
            modal_url: Pathmaker::<T>::reverse(LAUNCH_MODAL, &object_id),
            panel_url: Pathmaker::<T>::reverse(GET_ITEM, &object_id),
        }
    }

    /// Link whose panel shows `owner`'s bookmark state.
    fn create_for_owner<T: Bookmarkable>(object: &T, client: &TagmarkClient, owner: &User) -> Self {
        let mut link = Self::create(object, client);
        link.panel_url = Pathmaker::<T>::reverse_as_user(&object.object_id(), &owner.username);
        link
    }
}

#[derive(Template)]
#[template(path = "pages/index.html")]
struct IndexTemplate {
    current_user: Option<User>,
    books: Vec<ObjectLink>,
    quotes: Vec<ObjectLink>,
    users: Vec<User>,
}

async fn index(State(state): State<AppState>, CurrentUser(current_user): CurrentUser) -> HtmlTemplate<IndexTemplate> {
    let client = state.client.read().await;
    let books = client.get_all_books().iter().map(|x| ObjectLink::create(x, &client)).collect();
    let quotes = client.get_all_quotes().iter().map(|x| ObjectLink::create(x, &client)).collect();
    let users = client.get_all_users();
    HtmlTemplate(IndexTemplate { current_user, books, quotes, users })
}

#[derive(Template)]
#[template(path = "pages/book_detail.html")]
struct BookDetailTemplate {
    current_user: Option<User>,
    book: Book,
    author: String,
    panel: PanelContext,
    quotes: Vec<ObjectLink>,
    saved_quotes: Vec<ObjectLink>,
}

async fn book_detail(
    State(state): State<AppState>,
    current_user: CurrentUser,
    OriginalUri(uri): OriginalUri,
    Path(pk): Path<String>,
) -> Result<HtmlTemplate<BookDetailTemplate>, WebError> {
    let user = current_user.require_and_return(&state.config.login_url, uri.path())?;
    let client = state.client.read().await;
    let book = Book::find(&client, &pk).ok_or(WebError::NotFound)?;
    let author = client.get_user_by_id(book.author).map(|x| x.full_name()).unwrap_or_default();
    let panel = PanelContext::create(&book, &client, Some(&user), false)?;
    let saved_ids = client.get_bookmarked_object_ids(user.id, Quote::MODEL_NAME);
    let quotes = client.get_quotes_of_book(book.id);
    let saved_quotes = quotes.iter()
        .filter(|x| saved_ids.contains(&x.object_id()))
        .map(|x| ObjectLink::create(x, &client))
        .collect();
    let quotes = quotes.iter().map(|x| ObjectLink::create(x, &client)).collect();
    Ok(HtmlTemplate(BookDetailTemplate { current_user: Some(user), book, author, panel, quotes, saved_quotes }))
}

#[derive(Template)]
#[template(path = "pages/user_profile.html")]
struct UserProfileTemplate {
    current_user: Option<User>,
    profile: User,
    saved_books_count: usize,
    saved_quotes_count: usize,
    authored_books: Vec<ObjectLink>,
}

async fn user_profile(
    State(state): State<AppState>,
    CurrentUser(current_user): CurrentUser,
    Path(username): Path<String>,
) -> Result<HtmlTemplate<UserProfileTemplate>, WebError> {
    let client = state.client.read().await;
    let profile = client.get_user_by_username(&username).ok_or(WebError::NotFound)?;
    let saved_books_count = client.get_bookmarked_object_ids(profile.id, Book::MODEL_NAME).len();
    let saved_quotes_count = client.get_bookmarked_object_ids(profile.id, Quote::MODEL_NAME).len();
    let authored_books = client.get_all_books().iter()
        .filter(|x| x.author == profile.id)
        .map(|x| ObjectLink::create(x, &client))
        .collect();
    Ok(HtmlTemplate(UserProfileTemplate { current_user, profile, saved_books_count, saved_quotes_count, authored_books }))
}

#[derive(Template)]
#[template(path = "pages/saved_objs.html")]
struct SavedObjsTemplate {
    current_user: Option<User>,
    profile: User,
    title: &'static str,
    objs: Vec<ObjectLink>,
}

fn saved_objects<T: Bookmarkable>(client: &TagmarkClient, owner: &User) -> Vec<ObjectLink> {
    client.get_bookmarked_object_ids(owner.id, T::MODEL_NAME).iter()
        .filter_map(|x| T::find(client, x))
        .map(|x| ObjectLink::create_for_owner(&x, client, owner))
        .collect()
}

async fn render_saved<T: Bookmarkable>(
    state: AppState,
    current_user: Option<User>,
    username: String,
) -> Result<HtmlTemplate<SavedObjsTemplate>, WebError> {
    let client = state.client.read().await;
    let profile = client.get_user_by_username(&username).ok_or(WebError::NotFound)?;
    let objs = saved_objects::<T>(&client, &profile);
    Ok(HtmlTemplate(SavedObjsTemplate { current_user, profile, title: T::VERBOSE_NAME_PLURAL, objs }))
}

async fn saved_books(
    State(state): State<AppState>,
    CurrentUser(current_user): CurrentUser,
    Path(username): Path<String>,
) -> Result<HtmlTemplate<SavedObjsTemplate>, WebError> {
    render_saved::<Book>(state, current_user, username).await
}

async fn saved_quotes(
    State(state): State<AppState>,
    CurrentUser(current_user): CurrentUser,
    Path(username): Path<String>,
) -> Result<HtmlTemplate<SavedObjsTemplate>, WebError> {
    render_saved::<Quote>(state, current_user, username).await
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::header::{COOKIE, LOCATION};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;
    use crate::web_ui::auth::SESSION_COOKIE;
    use crate::web_ui::test_utils::*;
    use super::*;

    fn request(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = token {
            builder = builder.header(COOKIE, format!("{}={}", SESSION_COOKIE, token));
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn index_lists_library() {
        let app = TestApp::new().await;
        let response = app.router().oneshot(request("/", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("Dune by Juan Cruz"));
        assert!(body.contains("Fear is the mind-killer."));
        assert!(body.contains("/user/maria"));
    }

    #[tokio::test]
    async fn book_detail_requires_login() {
        let app = TestApp::new().await;
        let uri = format!("/book/detail/{}", app.book_id().await);
        let response = app.router().oneshot(request(&uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()[LOCATION].to_str().unwrap().to_string();
        assert_eq!(location, format!("/login?next=%2Fbook%2Fdetail%2F{}", app.book_id().await));

        let token = app.login("maria").await;
        let response = app.router().oneshot(request(&uri, Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("A desert planet."));

        let response = app.router().oneshot(request("/book/detail/404", Some(&token))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn saved_pages_show_owner_bookmarks() {
        let app = TestApp::new().await;
        let quote = app.quote_id().await;
        {
            let mut client = app.state.client.write().await;
            let maria = client.get_user_by_username("maria").unwrap().id;
            let quote = client.get_quote(&quote.parse().unwrap()).unwrap();
            client.toggle_bookmark(maria, &quote.entity_ref()).await.unwrap();
        }

        let response = app.router().oneshot(request("/quotes/maria", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_string(response).await;
        assert!(body.contains("Fear is the mind-killer."));
        assert!(body.contains(&format!("/quote/get_item/{}/maria", quote)));

        let response = app.router().oneshot(request("/books/maria", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(!body_string(response).await.contains("Dune by Juan Cruz"));

        let response = app.router().oneshot(request("/user/maria", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.router().oneshot(request("/quotes/nobody", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
