//! Explicit registry of bookmarkable types.
//!
//! Every type that can be bookmarked implements [`Bookmarkable`] and is registered once at
//! startup. The registry hands out stable numeric ids in registration order and keeps a resolver
//! per type, so a stored [`EntityRef`] can be turned back into something displayable without
//! knowing its concrete type.

use std::fmt::{Debug, Formatter};
use crate::client::TagmarkClient;
use crate::entities::EntityRef;
use crate::error::TagmarkError;

pub type ContentTypeId = u32;

/// Capability every bookmarkable type provides.
pub trait Bookmarkable: Clone + Send + Sync + 'static {
    /// Lowercase name used in routes, route names and stored references.
    const MODEL_NAME: &'static str;
    const VERBOSE_NAME: &'static str;
    const VERBOSE_NAME_PLURAL: &'static str;

    fn object_id(&self) -> String;

    /// Looks an instance up by its identifier as found in a URL. Identifiers that do not parse
    /// into the type's native key resolve to `None`.
    fn find(client: &TagmarkClient, pk: &str) -> Option<Self>;

    fn describe(&self, client: &TagmarkClient) -> String;

    fn detail_url(&self) -> Option<String> {
        None
    }

    /// HTML shown at the top of the bookmark panel.
    fn panel_content(&self, client: &TagmarkClient) -> Result<String, TagmarkError>;

    fn entity_ref(&self) -> EntityRef {
        EntityRef::new(Self::MODEL_NAME, self.object_id())
    }
}

type Resolver = fn(&TagmarkClient, &str) -> Option<ResolvedEntity>;

#[derive(Clone, Copy)]
pub struct ContentType {
    pub id: ContentTypeId,
    pub model: &'static str,
    pub verbose_name: &'static str,
    pub verbose_name_plural: &'static str,
    resolver: Resolver,
}

impl ContentType {
    pub fn is<T: Bookmarkable>(&self) -> bool {
        self.model == T::MODEL_NAME
    }
}

impl PartialEq for ContentType {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.model == other.model
    }
}

impl Eq for ContentType {}

impl Debug for ContentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentType")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("verbose_name", &self.verbose_name)
            .finish()
    }
}

/// A stored reference resolved back to a live object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedEntity {
    pub content_type_id: ContentTypeId,
    pub model: &'static str,
    pub verbose_name: &'static str,
    pub object_id: String,
    pub label: String,
    pub url: Option<String>,
}

fn resolve_entity<T: Bookmarkable>(client: &TagmarkClient, pk: &str) -> Option<ResolvedEntity> {
    let object = T::find(client, pk)?;
    let content_type = client.content_types().get_for::<T>()?;
    Some(ResolvedEntity {
        content_type_id: content_type.id,
        model: T::MODEL_NAME,
        verbose_name: T::VERBOSE_NAME,
        object_id: object.object_id(),
        label: object.describe(client),
        url: object.detail_url(),
    })
}

#[derive(Clone, Debug, Default)]
pub struct ContentTypeRegistry {
    types: Vec<ContentType>,
}

impl ContentTypeRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers `T`. Registering the same model twice keeps the first entry.
    pub fn register<T: Bookmarkable>(mut self) -> Self {
        if self.get_for::<T>().is_some() {
            return self;
        }
        let id = self.types.len() as ContentTypeId + 1;
        self.types.push(ContentType {
            id,
            model: T::MODEL_NAME,
            verbose_name: T::VERBOSE_NAME,
            verbose_name_plural: T::VERBOSE_NAME_PLURAL,
            resolver: resolve_entity::<T>,
        });
        self
    }

    pub fn all(&self) -> &[ContentType] {
        &self.types
    }

    pub fn get_by_id(&self, id: ContentTypeId) -> Option<&ContentType> {
        self.types.iter().find(|x| x.id == id)
    }

    pub fn get_for_model(&self, model: &str) -> Option<&ContentType> {
        self.types.iter().find(|x| x.model == model)
    }

    pub fn get_for<T: Bookmarkable>(&self) -> Option<&ContentType> {
        self.types.iter().find(|x| x.is::<T>())
    }

    pub fn resolve(&self, target: &EntityRef, client: &TagmarkClient) -> Option<ResolvedEntity> {
        let content_type = self.get_for_model(&target.content_type)?;
        (content_type.resolver)(client, &target.object_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone)]
    struct Film;

    impl Bookmarkable for Film {
        const MODEL_NAME: &'static str = "film";
        const VERBOSE_NAME: &'static str = "Film";
        const VERBOSE_NAME_PLURAL: &'static str = "Films";

        fn object_id(&self) -> String { "1".to_string() }
        fn find(_: &TagmarkClient, _: &str) -> Option<Self> { None }
        fn describe(&self, _: &TagmarkClient) -> String { "film".to_string() }
        fn panel_content(&self, _: &TagmarkClient) -> Result<String, TagmarkError> { Ok(String::new()) }
    }

    #[derive(Clone)]
    struct Song;

    impl Bookmarkable for Song {
        const MODEL_NAME: &'static str = "song";
        const VERBOSE_NAME: &'static str = "Song";
        const VERBOSE_NAME_PLURAL: &'static str = "Songs";

        fn object_id(&self) -> String { "a".to_string() }
        fn find(_: &TagmarkClient, _: &str) -> Option<Self> { None }
        fn describe(&self, _: &TagmarkClient) -> String { "song".to_string() }
        fn panel_content(&self, _: &TagmarkClient) -> Result<String, TagmarkError> { Ok(String::new()) }
    }

    #[test]
    fn ids_follow_registration_order() {
        let registry = ContentTypeRegistry::new().register::<Film>().register::<Song>();
        assert_eq!(registry.get_for::<Film>().unwrap().id, 1);
        assert_eq!(registry.get_for::<Song>().unwrap().id, 2);
        assert_eq!(registry.get_by_id(2).unwrap().model, "song");
        assert_eq!(registry.get_by_id(2).unwrap().verbose_name_plural, "Songs");
        assert!(registry.get_by_id(3).is_none());
        assert!(registry.get_for_model("book").is_none());
    }

    #[test]
    fn registering_twice_keeps_first_entry() {
        let registry = ContentTypeRegistry::new()
            .register::<Film>()
            .register::<Film>()
            .register::<Song>();
        assert_eq!(registry.all().len(), 2);
        assert!(registry.get_by_id(1).unwrap().is::<Film>());
        assert!(registry.get_by_id(2).unwrap().is::<Song>());
    }

    #[test]
    fn entity_ref_uses_model_name() {
        assert_eq!(Song.entity_ref(), EntityRef::new("song", "a"));
        assert_eq!(Song.entity_ref().to_string(), "song:a");
    }
}
