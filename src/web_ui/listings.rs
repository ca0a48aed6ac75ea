use askama::Template;
use axum::extract::{Path, State};
use axum::routing::get;
use axum::Router;
use crate::client::TagmarkClient;
use crate::content_types::ContentTypeId;
use crate::entities::{Bookmark, User};
use crate::web_ui::auth::CurrentUser;
use crate::web_ui::error::WebError;
use crate::web_ui::routes::{make_action_url, LAUNCH_MODAL};
use crate::web_ui::{AppState, ExtendedTag, HtmlTemplate};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tag/:slug", get(filtered_objs))
        .route("/tag/:slug/:type_id", get(filtered_objs_of_type))
        .route("/tags", get(list_of_tags))
        .route("/objs", get(bookmark_objs))
}

/// A bookmarked object as shown in listings.
pub struct BookmarkRow {
    pub label: String,
    pub url: Option<String>,
    pub verbose_name: &'static str,
    pub modal_url: String,
    pub tags: Vec<ExtendedTag>,
}

/// Rows for `bookmarks`, skipping bookmarks whose object no longer resolves.
pub fn bookmark_rows(client: &TagmarkClient, bookmarks: Vec<Bookmark>) -> Vec<BookmarkRow> {
    bookmarks.into_iter()
        .filter_map(|bookmark| {
            let resolved = client.resolve(&bookmark.target)?;
            Some(BookmarkRow {
                modal_url: make_action_url(resolved.model, LAUNCH_MODAL, &resolved.object_id),
                label: resolved.label,
                url: resolved.url,
                verbose_name: resolved.verbose_name,
                tags: bookmark.tags.into_iter().map(ExtendedTag::from).collect(),
            })
        })
        .collect()
}

#[derive(Template)]
#[template(path = "listings/filtered_objs.html")]
struct FilteredObjsTemplate {
    current_user: Option<User>,
    tag: ExtendedTag,
    type_label: Option<&'static str>,
    objs: Vec<BookmarkRow>,
}

async fn filtered_objs(
    State(state): State<AppState>,
    CurrentUser(current_user): CurrentUser,
    Path(slug): Path<String>,
) -> Result<HtmlTemplate<FilteredObjsTemplate>, WebError> {
    render_filtered(state, current_user, slug, None).await
}

async fn filtered_objs_of_type(
    State(state): State<AppState>,
    CurrentUser(current_user): CurrentUser,
    Path((slug, type_id)): Path<(String, ContentTypeId)>,
) -> Result<HtmlTemplate<FilteredObjsTemplate>, WebError> {
    render_filtered(state, current_user, slug, Some(type_id)).await
}

async fn render_filtered(
    state: AppState,
    current_user: Option<User>,
    slug: String,
    type_id: Option<ContentTypeId>,
) -> Result<HtmlTemplate<FilteredObjsTemplate>, WebError> {
    let client = state.client.read().await;
    let type_label = match type_id {
        Some(id) => Some(client.content_types().get_by_id(id).ok_or(WebError::NotFound)?.verbose_name_plural),
        None => None,
    };
    let objs = match &current_user {
        Some(user) => {
            let tag = client.get_tag(&slug).ok_or(WebError::NotFound)?;
            bookmark_rows(&client, client.extract_from(user.id, &tag, type_id))
        }
        None => vec![],
    };
    Ok(HtmlTemplate(FilteredObjsTemplate { current_user, tag: ExtendedTag::from(slug), type_label, objs }))
}

pub struct TypeCountRow {
    pub label: &'static str,
    pub count: usize,
    pub url: String,
}

pub struct TagRow {
    pub tag: ExtendedTag,
    pub total: usize,
    pub counts: Vec<TypeCountRow>,
}

#[derive(Template)]
#[template(path = "listings/list_of_tags.html")]
struct ListOfTagsTemplate {
    current_user: Option<User>,
    rows: Vec<TagRow>,
}

async fn list_of_tags(
    State(state): State<AppState>,
    CurrentUser(current_user): CurrentUser,
) -> HtmlTemplate<ListOfTagsTemplate> {
    let rows = match &current_user {
        Some(user) => {
            let client = state.client.read().await;
            client.tags_made_by_user(user.id, client.content_types().all()).into_iter()
                .map(|summary| {
                    let tag = ExtendedTag::from(summary.tag.name.clone());
                    let counts = summary.counts.iter()
                        .map(|x| TypeCountRow {
                            label: x.label,
                            count: x.count,
                            url: format!("{}/{}", tag.url, x.content_type_id),
                        })
                        .collect();
                    TagRow { total: summary.total(), tag, counts }
                })
                .collect()
        }
        None => vec![],
    };
    HtmlTemplate(ListOfTagsTemplate { current_user, rows })
}

#[derive(Template)]
#[template(path = "listings/bookmark_objs.html")]
struct BookmarkObjsTemplate {
    current_user: Option<User>,
    objs: Vec<BookmarkRow>,
}

async fn bookmark_objs(
    State(state): State<AppState>,
    CurrentUser(current_user): CurrentUser,
) -> HtmlTemplate<BookmarkObjsTemplate> {
    let objs = match &current_user {
        Some(user) => {
            let client = state.client.read().await;
            bookmark_rows(&client, client.get_bookmarks_by_user(user.id))
        }
        None => vec![],
    };
    HtmlTemplate(BookmarkObjsTemplate { current_user, objs })
}
