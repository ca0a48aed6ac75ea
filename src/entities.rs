use std::fmt::{Display, Formatter};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::content_types::ContentTypeId;

pub type UserId = i64;
pub type BookmarkId = i64;
pub type TagName = String;

pub enum InsertResult<T> {
    Existing(T),
    New(T),
}

impl<T> InsertResult<T> {
    pub fn safe_unwrap(self) -> T {
        match self {
            InsertResult::Existing(x) => x,
            InsertResult::New(x) => x,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, InsertResult::New(_))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

impl Display for User {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.username)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Tag {
    pub name: TagName,
    pub created_at: DateTime<Utc>,
}

/// Polymorphic pointer to a bookmarked object: the registered model name of its type plus
/// its identifier rendered as a string, so integer and UUID keys share one column.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityRef {
    pub content_type: String,
    pub object_id: String,
}

impl EntityRef {
    pub fn new(content_type: &str, object_id: impl Into<String>) -> Self {
        Self { content_type: content_type.to_string(), object_id: object_id.into() }
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.content_type, self.object_id)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub bookmarker: UserId,
    pub target: EntityRef,
    pub tags: Vec<TagName>,
    pub created_at: DateTime<Utc>,
    /// Last time a tag was attached or detached.
    pub modified_at: DateTime<Utc>,
}

impl Bookmark {
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.iter().any(|x| x == name)
    }
}

/// Bookmark count of one content type for a tag.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TypeCount {
    pub content_type_id: ContentTypeId,
    pub model: &'static str,
    pub label: &'static str,
    pub count: usize,
}

/// A tag applied by one user, annotated with per content type bookmark counts.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct TagSummary {
    pub tag: Tag,
    pub counts: Vec<TypeCount>,
}

impl TagSummary {
    pub fn count_for(&self, model: &str) -> usize {
        self.counts.iter()
            .find(|x| x.model == model)
            .map(|x| x.count)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|x| x.count).sum()
    }
}
