//! Generic bookmark panel handlers, mounted once per bookmarkable type by
//! [`Pathmaker`](crate::web_ui::routes::Pathmaker).

use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Form;
use http::{Method, StatusCode};
use log::info;
use serde::Deserialize;
use crate::client::TagmarkClient;
use crate::content_types::Bookmarkable;
use crate::entities::User;
use crate::utils::split_tags;
use crate::web_ui::auth::CurrentUser;
use crate::web_ui::error::WebError;
use crate::web_ui::routes::{Pathmaker, ADD_TAGS, DEL_TAG, GET_ITEM, TOGGLE_STATUS};
use crate::web_ui::{AppState, ExtendedTag, HtmlTemplate};

pub const TAG_DELETED_EVENT: &str = "tagDeleted";

/// Everything the bookmark panel of one object shows.
pub struct PanelContext {
    pub dom_id: String,
    pub model: &'static str,
    pub verbose_name: &'static str,
    pub object_id: String,
    pub label: String,
    pub content: String,
    /// Username whose bookmark state is shown, `None` for anonymous visitors.
    pub viewer: Option<String>,
    pub read_only: bool,
    pub is_bookmarked: bool,
    pub tags: Vec<ExtendedTag>,
    pub toggle_url: String,
    pub add_tags_url: String,
    pub del_tag_url: String,
    pub refresh_url: String,
}

impl PanelContext {
    pub fn create<T: Bookmarkable>(object: &T, client: &TagmarkClient, viewer: Option<&User>, read_only: bool) -> Result<Self, WebError> {
        let object_id = object.object_id();
        let target = object.entity_ref();
        let (is_bookmarked, tags) = match viewer {
            Some(user) => (
                client.is_bookmarked(user.id, &target),
                client.get_user_tags(user.id, &target).into_iter().map(|x| ExtendedTag::from(x.name)).collect(),
            ),
            None => (false, vec![]),
        };
        let refresh_url = match viewer {
            Some(user) if read_only => Pathmaker::<T>::reverse_as_user(&object_id, &user.username),
            _ => Pathmaker::<T>::reverse(GET_ITEM, &object_id),
        };
        Ok(Self {
            dom_id: format!("{}-{}", T::MODEL_NAME, object_id),
            model: T::MODEL_NAME,
            verbose_name: T::VERBOSE_NAME,
            label: object.describe(client),
            content: object.panel_content(client)?,
            viewer: viewer.map(|x| x.username.clone()),
            read_only: read_only || viewer.is_none(),
            is_bookmarked,
            tags,
            toggle_url: Pathmaker::<T>::reverse(TOGGLE_STATUS, &object_id),
            add_tags_url: Pathmaker::<T>::reverse(ADD_TAGS, &object_id),
            del_tag_url: Pathmaker::<T>::reverse(DEL_TAG, &object_id),
            refresh_url,
            object_id,
        })
    }
}

#[derive(Template)]
#[template(path = "bookmarks/panel.html")]
pub struct PanelTemplate {
    pub panel: PanelContext,
}

#[derive(Template)]
#[template(path = "bookmarks/modal.html")]
pub struct ModalTemplate {
    pub panel: PanelContext,
}

#[derive(Deserialize)]
pub struct TagsForm {
    tags: Option<String>,
}

#[derive(Deserialize)]
pub struct TagParam {
    tag: Option<String>,
}

pub async fn missing_pk() -> WebError {
    WebError::BadRequest("missing object identifier")
}

fn find<T: Bookmarkable>(client: &TagmarkClient, pk: &str) -> Result<T, WebError> {
    T::find(client, pk).ok_or(WebError::NotFound)
}

pub async fn launch_modal<T: Bookmarkable>(
    method: Method,
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(pk): Path<String>,
) -> Result<HtmlTemplate<ModalTemplate>, WebError> {
    if method != Method::GET {
        return Err(WebError::BadRequest("expected GET"));
    }
    let user = current_user.require(&state.config.login_url)?;
    let client = state.client.read().await;
    let object = find::<T>(&client, &pk)?;
    let panel = PanelContext::create(&object, &client, Some(&user), false)?;
    Ok(HtmlTemplate(ModalTemplate { panel }))
}

pub async fn get_item<T: Bookmarkable>(
    method: Method,
    State(state): State<AppState>,
    CurrentUser(current_user): CurrentUser,
    Path(pk): Path<String>,
) -> Result<HtmlTemplate<PanelTemplate>, WebError> {
    if method != Method::GET {
        return Err(WebError::BadRequest("expected GET"));
    }
    let client = state.client.read().await;
    let object = find::<T>(&client, &pk)?;
    let panel = PanelContext::create(&object, &client, current_user.as_ref(), false)?;
    Ok(HtmlTemplate(PanelTemplate { panel }))
}

/// Panel of the object as `username` sees it. Read-only unless it is the visitor's own.
pub async fn get_item_as_user<T: Bookmarkable>(
    method: Method,
    State(state): State<AppState>,
    CurrentUser(current_user): CurrentUser,
    Path((pk, username)): Path<(String, String)>,
) -> Result<HtmlTemplate<PanelTemplate>, WebError> {
    if method != Method::GET {
        return Err(WebError::BadRequest("expected GET"));
    }
    let client = state.client.read().await;
    let owner = client.get_user_by_username(&username).ok_or(WebError::NotFound)?;
    let object = find::<T>(&client, &pk)?;
    let read_only = current_user.map_or(true, |x| x.id != owner.id);
    let panel = PanelContext::create(&object, &client, Some(&owner), read_only)?;
    Ok(HtmlTemplate(PanelTemplate { panel }))
}

pub async fn toggle_status<T: Bookmarkable>(
    method: Method,
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(pk): Path<String>,
) -> Result<HtmlTemplate<PanelTemplate>, WebError> {
    let login_url = &state.config.login_url;
    if method != Method::PUT {
        return Err(WebError::Unauthenticated { login_url: login_url.clone(), next: None });
    }
    let user = current_user.require(login_url)?;
    let mut client = state.client.write().await;
    let object = find::<T>(&client, &pk)?;
    let target = object.entity_ref();
    let is_bookmarked = client.toggle_bookmark(user.id, &target).await?;
    info!("user {} toggled {}: bookmarked={}", user, target, is_bookmarked);
    let panel = PanelContext::create(&object, &client, Some(&user), false)?;
    Ok(HtmlTemplate(PanelTemplate { panel }))
}

pub async fn add_tags<T: Bookmarkable>(
    method: Method,
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(pk): Path<String>,
    form: Option<Form<TagsForm>>,
) -> Result<HtmlTemplate<PanelTemplate>, WebError> {
    if method != Method::POST {
        return Err(WebError::BadRequest("expected POST"));
    }
    let user = current_user.require(&state.config.login_url)?;
    let names = form
        .and_then(|Form(x)| x.tags)
        .map(|x| split_tags(&x))
        .unwrap_or_default();
    let mut client = state.client.write().await;
    let object = find::<T>(&client, &pk)?;
    if !names.is_empty() {
        client.add_tags(user.id, &object.entity_ref(), &names).await?;
    }
    let panel = PanelContext::create(&object, &client, Some(&user), false)?;
    Ok(HtmlTemplate(PanelTemplate { panel }))
}

/// Detaches one tag, if one was sent. The panel reloads itself on the `tagDeleted` event, so the body is empty.
pub async fn del_tag<T: Bookmarkable>(
    method: Method,
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(pk): Path<String>,
    query: Option<Query<TagParam>>,
    form: Option<Form<TagParam>>,
) -> Result<Response, WebError> {
    if method != Method::DELETE {
        return Err(WebError::BadRequest("expected DELETE"));
    }
    let user = current_user.require(&state.config.login_url)?;
    let tag = query.and_then(|Query(x)| x.tag)
        .or_else(|| form.and_then(|Form(x)| x.tag))
        .filter(|x| !x.trim().is_empty());
    let mut client = state.client.write().await;
    let object = find::<T>(&client, &pk)?;
    if let Some(tag) = tag {
        let target = object.entity_ref();
        if client.remove_tag(user.id, &target, &tag).await? {
            info!("user {} removed tag {} from {}", user, tag, target);
        }
    }
    Ok((StatusCode::OK, [("HX-Trigger", TAG_DELETED_EVENT)]).into_response())
}
