//! Route derivation for bookmarkable types.
//!
//! Every type gets the same five actions under `/{model}/{action}/...`. Route names follow
//! `{action}_{model}`. Routes without an identifier are "fake": templates use them as a base
//! URL and requesting one answers 400.

use std::marker::PhantomData;
use axum::routing::{any, MethodRouter};
use axum::Router;
use crate::content_types::Bookmarkable;
use crate::web_ui::bookmarks;
use crate::web_ui::AppState;

pub const LAUNCH_MODAL: &str = "launch_modal";
pub const GET_ITEM: &str = "get_item";
pub const ADD_TAGS: &str = "add_tags";
pub const DEL_TAG: &str = "del_tag";
pub const TOGGLE_STATUS: &str = "toggle_status";

pub const ACTIONS: [&str; 5] = [LAUNCH_MODAL, GET_ITEM, ADD_TAGS, DEL_TAG, TOGGLE_STATUS];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionPath {
    pub action: &'static str,
    pub name: String,
    pub route: String,
    pub fake: bool,
}

/// URL of `action` on the `model` object identified by `pk`.
pub fn make_action_url(model: &str, action: &str, pk: &str) -> String {
    format!("/{}/{}/{}", model, action, urlencoding::encode(pk))
}

pub struct Pathmaker<T: Bookmarkable> {
    _marker: PhantomData<T>,
}

impl<T: Bookmarkable> Default for Pathmaker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Bookmarkable> Pathmaker<T> {
    pub fn new() -> Self {
        Self { _marker: PhantomData }
    }

    pub fn route_name(action: &str) -> String {
        format!("{}_{}", action, T::MODEL_NAME)
    }


    /// Concrete URL of `action` for the object identified by `pk`.
    pub fn reverse(action: &str, pk: &str) -> String {
        make_action_url(T::MODEL_NAME, action, pk)
    }

    /// Identifier-less URL of `action`, for building URLs client side. Every route of the
    /// action hangs off it.
    pub fn reverse_fake(action: &str) -> String {
        format!("/{}/{}/", T::MODEL_NAME, action)
    }

    /// `get_item` URL showing `username`'s bookmark state of the object.
    pub fn reverse_as_user(pk: &str, username: &str) -> String {
        format!("{}/{}", Self::reverse(GET_ITEM, pk), urlencoding::encode(username))
    }

    pub fn make_patterns(&self) -> Vec<ActionPath> {
        let path = |action: &'static str, suffix: &str, fake: bool| ActionPath {
            action,
            name: Self::route_name(action),
            route: format!("{}{}", Self::reverse_fake(action), suffix),
            fake,
        };
        vec![
            path(LAUNCH_MODAL, "", true),
            path(LAUNCH_MODAL, ":pk", false),
            path(GET_ITEM, "", true),
            path(GET_ITEM, ":pk", false),
            path(GET_ITEM, ":pk/:username", false),
            path(ADD_TAGS, ":pk", false),
            path(DEL_TAG, ":pk", false),
            path(TOGGLE_STATUS, ":pk", false),
        ]
    }

    fn handler_for(pattern: &ActionPath) -> MethodRouter<AppState> {
        if pattern.fake {
            return any(bookmarks::missing_pk);
        }
        match (pattern.action, pattern.route.ends_with(":username")) {
            (GET_ITEM, true) => any(bookmarks::get_item_as_user::<T>),
            (GET_ITEM, false) => any(bookmarks::get_item::<T>),
            (LAUNCH_MODAL, _) => any(bookmarks::launch_modal::<T>),
            (ADD_TAGS, _) => any(bookmarks::add_tags::<T>),
            (DEL_TAG, _) => any(bookmarks::del_tag::<T>),
            _ => any(bookmarks::toggle_status::<T>),
        }
    }

    pub fn into_router(self) -> Router<AppState> {
        self.make_patterns().iter().fold(Router::new(), |router, pattern| {
            router.route(&pattern.route, Self::handler_for(pattern))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::library::{Book, Quote};
    use super::*;

    #[test]
    fn patterns_follow_naming_convention() {
        let patterns = Pathmaker::<Book>::new().make_patterns();
        assert_eq!(patterns.len(), 8);
        for pattern in &patterns {
            assert_eq!(pattern.name, format!("{}_book", pattern.action));
            assert!(pattern.route.starts_with(&format!("/book/{}/", pattern.action)));
            assert_eq!(pattern.fake, pattern.route.ends_with('/'));
        }
        for action in ACTIONS {
            assert!(patterns.iter().any(|x| x.action == action && !x.fake));
        }
        let fakes = patterns.iter().filter(|x| x.fake).map(|x| x.route.as_str()).collect::<Vec<&str>>();
        assert_eq!(fakes, vec!["/book/launch_modal/", "/book/get_item/"]);
        assert!(patterns.iter().any(|x| x.route == "/book/get_item/:pk/:username"));
    }

    #[test]
    fn patterns_are_deterministic() {
        assert_eq!(Pathmaker::<Quote>::new().make_patterns(), Pathmaker::<Quote>::new().make_patterns());
        assert_eq!(Pathmaker::<Quote>::route_name(TOGGLE_STATUS), "toggle_status_quote");
    }

    #[test]
    fn reverse_builds_concrete_urls() {
        assert_eq!(Pathmaker::<Book>::reverse(ADD_TAGS, "12"), "/book/add_tags/12");
        assert_eq!(Pathmaker::<Book>::reverse_fake(GET_ITEM), "/book/get_item/");
        assert_eq!(Pathmaker::<Book>::reverse_as_user("3", "maria"), "/book/get_item/3/maria");
        assert_eq!(Pathmaker::<Quote>::reverse(DEL_TAG, "a b"), "/quote/del_tag/a%20b");
        assert_eq!(make_action_url("quote", LAUNCH_MODAL, "7"), "/quote/launch_modal/7");
    }
}
