//! Per-user tag queries across every bookmarkable type.
//!
//! `tags_made_by_user` starts from the distinct tags a user applied and folds one
//! [`TypeAnnotation`] per candidate type over that base set. Each annotation is built from a
//! single pass over the user's bookmarks of its type, so the cost grows with the number of
//! types, not with the number of tags.

use std::collections::HashMap;
use itertools::Itertools;
use crate::client::{sort_tags, TagmarkClient};
use crate::content_types::{ContentType, ContentTypeId};
use crate::entities::{Bookmark, Tag, TagName, TagSummary, TypeCount, UserId};

/// Bookmark counts per tag for one user and one content type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeAnnotation {
    pub content_type_id: ContentTypeId,
    pub model: &'static str,
    pub label: &'static str,
    counts: HashMap<TagName, usize>,
}

impl TypeAnnotation {
    pub fn count(&self, tag: &str) -> usize {
        self.counts.get(tag).copied().unwrap_or(0)
    }

    fn apply(&self, summary: &mut TagSummary) {
        summary.counts.push(TypeCount {
            content_type_id: self.content_type_id,
            model: self.model,
            label: self.label,
            count: self.count(&summary.tag.name),
        });
    }
}

impl TagmarkClient {
    /// Distinct tags `user` applied on any of their bookmarks, newest first.
    pub fn filter_by_user(&self, user: UserId) -> Vec<Tag> {
        let tags = self.get_bookmarks_by_user(user).iter()
            .flat_map(|x| x.tags.iter())
            .unique()
            .filter_map(|x| self.get_tag(x))
            .collect::<Vec<Tag>>();
        sort_tags(tags)
    }

    pub fn prep_for_annotation(&self, user: UserId, content_type: &ContentType) -> TypeAnnotation {
        let mut counts: HashMap<TagName, usize> = HashMap::new();
        for bookmark in self.get_bookmarks_by_user(user) {
            if bookmark.target.content_type != content_type.model {
                continue;
            }
            for tag in bookmark.tags {
                *counts.entry(tag).or_default() += 1;
            }
        }
        TypeAnnotation {
            content_type_id: content_type.id,
            model: content_type.model,
            label: content_type.verbose_name,
            counts,
        }
    }

    /// Tags applied by `user`, each annotated with how many of the user's bookmarks of every
    /// type in `types` carry it. Types the user never bookmarked count zero.
    pub fn tags_made_by_user(&self, user: UserId, types: &[ContentType]) -> Vec<TagSummary> {
        let mut summaries = self.filter_by_user(user).into_iter()
            .map(|tag| TagSummary { tag, counts: Vec::with_capacity(types.len()) })
            .collect::<Vec<TagSummary>>();
        for content_type in types {
            let annotation = self.prep_for_annotation(user, content_type);
            summaries.iter_mut().for_each(|x| annotation.apply(x));
        }
        summaries
    }

    /// Bookmarks of `user` carrying `tag`, optionally only those pointing at objects of one
    /// content type. Unknown content type ids match nothing.
    pub fn extract_from(&self, user: UserId, tag: &Tag, content_type: Option<ContentTypeId>) -> Vec<Bookmark> {
        let model = match content_type {
            Some(id) => match self.content_types().get_by_id(id) {
                Some(content_type) => Some(content_type.model),
                None => return vec![],
            },
            None => None,
        };
        self.get_bookmarks_by_user(user).into_iter()
            .filter(|x| x.has_tag(&tag.name))
            .filter(|x| model.map_or(true, |model| x.target.content_type == model))
            .collect()
    }
}
