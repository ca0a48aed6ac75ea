use chrono::{DateTime, Utc};
use dashmap::DashMap;
use itertools::Itertools;
use log::{debug, info};
use crate::content_types::{Bookmarkable, ContentTypeRegistry, ResolvedEntity};
use crate::entities::*;
use crate::error::TagmarkError;
use crate::library::{Book, BookId, Quote, QuoteId};
use crate::storage::{DbOperation, Storage};
use crate::utils::hash_utils::PasswordHasher;
use crate::utils::str_utils::StringExtensions;

/// In-memory store of users, sample objects, bookmarks and tags. Every mutation is appended to
/// the operation log before it returns; [`TagmarkClient::init`] replays the log on startup.
pub struct TagmarkClient {
    storage: Box<dyn Storage>,
    content_types: ContentTypeRegistry,
    users: DashMap<UserId, User>,
    usernames: DashMap<String, UserId>,
    books: DashMap<BookId, Book>,
    quotes: DashMap<QuoteId, Quote>,
    tags: DashMap<TagName, Tag>,
    bookmarks: DashMap<BookmarkId, Bookmark>,
    // unique (bookmarker, object) index
    bookmark_index: DashMap<(UserId, EntityRef), BookmarkId>,
    next_user_id: UserId,
    next_book_id: BookId,
    next_bookmark_id: BookmarkId,
}

impl TagmarkClient {
    pub fn new(storage: impl Storage + 'static, content_types: ContentTypeRegistry) -> Self {
        Self {
            storage: Box::new(storage),
            content_types,
            users: DashMap::new(),
            usernames: DashMap::new(),
            books: DashMap::new(),
            quotes: DashMap::new(),
            tags: DashMap::new(),
            bookmarks: DashMap::new(),
            bookmark_index: DashMap::new(),
            next_user_id: 1,
            next_book_id: 1,
            next_bookmark_id: 1,
        }
    }

    pub async fn init(&mut self) -> Result<(), TagmarkError> {
        info!("Starting DB import from WAL...");
        let operations = self.storage.read_all().await?;
        let operations_count = operations.len();
        for operation in operations {
            self.apply_no_wal(operation);
        }
        info!("DB imported: {} operations, {} users, {} bookmarks, {} tags",
            operations_count, self.users.len(), self.bookmarks.len(), self.tags.len());
        Ok(())
    }

    pub fn content_types(&self) -> &ContentTypeRegistry {
        &self.content_types
    }

    pub fn resolve(&self, target: &EntityRef) -> Option<ResolvedEntity> {
        self.content_types.resolve(target, self)
    }

    async fn write_wal(&mut self, operation: DbOperation) -> Result<(), TagmarkError> {
        debug!("Writing to WAL: {:?}", operation);
        self.storage.write(operation).await
    }

    fn apply_no_wal(&mut self, operation: DbOperation) {
        match operation {
            DbOperation::CreateUser { user } => { self.create_user_no_wal(user); }
            DbOperation::DeleteUser { user_id } => { self.delete_user_no_wal(user_id); }
            DbOperation::CreateBook { book } => { self.create_book_no_wal(book); }
            DbOperation::DeleteBook { book_id } => { self.delete_book_no_wal(book_id); }
            DbOperation::CreateQuote { quote } => { self.create_quote_no_wal(quote); }
            DbOperation::DeleteQuote { quote_id } => { self.delete_quote_no_wal(&quote_id); }
            DbOperation::CreateTag { tag } => { self.create_tag_no_wal(tag); }
            DbOperation::CreateBookmark { bookmark } => { self.create_bookmark_no_wal(bookmark); }
            DbOperation::DeleteBookmark { bookmark_id } => { self.delete_bookmark_no_wal(bookmark_id); }
            DbOperation::DeleteEntityBookmarks { target } => { self.delete_entity_bookmarks_no_wal(&target); }
            DbOperation::AttachTag { bookmark_id, tag, at } => { self.attach_tag_no_wal(bookmark_id, &tag, at); }
            DbOperation::DetachTag { bookmark_id, tag, at } => { self.detach_tag_no_wal(bookmark_id, &tag, at); }
        }
    }

    // users

    pub fn get_user_by_id(&self, user_id: UserId) -> Option<User> {
        self.users.get(&user_id).map(|x| x.value().clone())
    }

    pub fn get_user_by_username(&self, username: &str) -> Option<User> {
        let user_id = *self.usernames.get(username)?.value();
        self.get_user_by_id(user_id)
    }

    pub fn get_all_users(&self) -> Vec<User> {
        self.users.iter()
            .map(|x| x.value().clone())
            .sorted_by_key(|x| x.id)
            .collect()
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Option<User> {
        let user = self.get_user_by_username(username)?;
        if PasswordHasher::verify(password, &user.password_hash) {
            Some(user)
        } else {
            None
        }
    }

    pub async fn create_user(&mut self, username: &str, password: &str, first_name: &str, last_name: &str) -> Result<User, TagmarkError> {
        let username = username.trim();
        if username.is_empty() || username.contains(|c: char| c == '/' || c.is_whitespace()) {
            return Err(TagmarkError::InvalidInput(format!("invalid username: {:?}", username)));
        }
        if self.usernames.contains_key(username) {
            return Err(TagmarkError::UserAlreadyExists(username.to_string()));
        }
        let user = User {
            id: self.next_user_id,
            username: username.to_string(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            password_hash: PasswordHasher::hash(password)?,
            created_at: Utc::now(),
        };
        self.create_user_no_wal(user.clone());
        self.write_wal(DbOperation::CreateUser { user: user.clone() }).await?;
        Ok(user)
    }

    /// Users that still own bookmarks or authored books are protected from deletion.
    pub async fn delete_user(&mut self, username: &str) -> Result<User, TagmarkError> {
        let user = self.get_user_by_username(username).ok_or(TagmarkError::NotFound("User"))?;
        let owns_bookmarks = self.bookmarks.iter().any(|x| x.value().bookmarker == user.id);
        let owns_books = self.books.iter().any(|x| x.value().author == user.id);
        if owns_bookmarks || owns_books {
            return Err(TagmarkError::ProtectedUser(user.username));
        }
        self.delete_user_no_wal(user.id);
        self.write_wal(DbOperation::DeleteUser { user_id: user.id }).await?;
        Ok(user)
    }

    fn create_user_no_wal(&mut self, user: User) -> InsertResult<User> {
        if let Some(existing) = self.get_user_by_username(&user.username) {
            return InsertResult::Existing(existing);
        }
        self.next_user_id = self.next_user_id.max(user.id + 1);
        self.usernames.insert(user.username.clone(), user.id);
        self.users.insert(user.id, user.clone());
        InsertResult::New(user)
    }

    fn delete_user_no_wal(&mut self, user_id: UserId) -> Option<User> {
        let (_, user) = self.users.remove(&user_id)?;
        self.usernames.remove(&user.username);
        Some(user)
    }

    // books & quotes

    pub fn get_book(&self, book_id: BookId) -> Option<Book> {
        self.books.get(&book_id).map(|x| x.value().clone())
    }

    pub fn get_all_books(&self) -> Vec<Book> {
        self.books.iter()
            .map(|x| x.value().clone())
            .sorted_by_key(|x| x.id)
            .collect()
    }

    pub fn get_quote(&self, quote_id: &QuoteId) -> Option<Quote> {
        self.quotes.get(quote_id).map(|x| x.value().clone())
    }

    pub fn get_all_quotes(&self) -> Vec<Quote> {
        self.quotes.iter()
            .map(|x| x.value().clone())
            .sorted_by_key(|x| (x.created_at, x.id))
            .collect()
    }

    pub fn get_quotes_of_book(&self, book_id: BookId) -> Vec<Quote> {
        self.get_all_quotes().into_iter()
            .filter(|x| x.book == book_id)
            .collect()
    }

    pub async fn create_book(&mut self, author: UserId, title: &str, excerpt: Option<&str>) -> Result<Book, TagmarkError> {
        if !self.users.contains_key(&author) {
            return Err(TagmarkError::NotFound("User"));
        }
        let title = title.trim();
        if title.is_empty() {
            return Err(TagmarkError::InvalidInput("book title is empty".to_string()));
        }
        let book = Book {
            id: self.next_book_id,
            title: title.to_string(),
            excerpt: excerpt.map(|x| x.to_string()),
            author,
            created_at: Utc::now(),
        };
        self.create_book_no_wal(book.clone());
        self.write_wal(DbOperation::CreateBook { book: book.clone() }).await?;
        Ok(book)
    }

    pub async fn create_quote(&mut self, book_id: BookId, text: &str) -> Result<Quote, TagmarkError> {
        if !self.books.contains_key(&book_id) {
            return Err(TagmarkError::NotFound("Book"));
        }
        let quote = Quote {
            id: QuoteId::new_v4(),
            book: book_id,
            quote: text.trim().to_string(),
            created_at: Utc::now(),
        };
        self.create_quote_no_wal(quote.clone());
        self.write_wal(DbOperation::CreateQuote { quote: quote.clone() }).await?;
        Ok(quote)
    }

    /// Deletes the book, its quotes and every bookmark pointing at any of them.
    pub async fn delete_book(&mut self, book_id: BookId) -> Result<Option<Book>, TagmarkError> {
        let maybe_book = self.delete_book_no_wal(book_id);
        if maybe_book.is_some() {
            self.write_wal(DbOperation::DeleteBook { book_id }).await?;
        }
        Ok(maybe_book)
    }

    pub async fn delete_quote(&mut self, quote_id: &QuoteId) -> Result<Option<Quote>, TagmarkError> {
        let maybe_quote = self.delete_quote_no_wal(quote_id);
        if maybe_quote.is_some() {
            self.write_wal(DbOperation::DeleteQuote { quote_id: *quote_id }).await?;
        }
        Ok(maybe_quote)
    }

    fn create_book_no_wal(&mut self, book: Book) -> InsertResult<Book> {
        if let Some(existing) = self.get_book(book.id) {
            return InsertResult::Existing(existing);
        }
        self.next_book_id = self.next_book_id.max(book.id + 1);
        self.books.insert(book.id, book.clone());
        InsertResult::New(book)
    }

    fn create_quote_no_wal(&mut self, quote: Quote) -> InsertResult<Quote> {
        if let Some(existing) = self.get_quote(&quote.id) {
            return InsertResult::Existing(existing);
        }
        self.quotes.insert(quote.id, quote.clone());
        InsertResult::New(quote)
    }

    fn delete_book_no_wal(&mut self, book_id: BookId) -> Option<Book> {
        let (_, book) = self.books.remove(&book_id)?;
        let quote_ids = self.quotes.iter()
            .filter(|x| x.value().book == book_id)
            .map(|x| *x.key())
            .collect::<Vec<QuoteId>>();
        for quote_id in quote_ids {
            self.delete_quote_no_wal(&quote_id);
        }
        self.delete_entity_bookmarks_no_wal(&book.entity_ref());
        Some(book)
    }

    fn delete_quote_no_wal(&mut self, quote_id: &QuoteId) -> Option<Quote> {
        let (_, quote) = self.quotes.remove(quote_id)?;
        self.delete_entity_bookmarks_no_wal(&quote.entity_ref());
        Some(quote)
    }

    // tags

    pub fn get_tag(&self, name: &str) -> Option<Tag> {
        self.tags.get(name).map(|x| x.value().clone())
    }

    /// All tags, newest first.
    pub fn get_all_tags(&self) -> Vec<Tag> {
        let tags = self.tags.iter().map(|x| x.value().clone()).collect::<Vec<Tag>>();
        sort_tags(tags)
    }

    async fn get_or_create_tag(&mut self, slug: &str) -> Result<InsertResult<Tag>, TagmarkError> {
        let tag = Tag { name: slug.to_string(), created_at: Utc::now() };
        let result = self.create_tag_no_wal(tag);
        if let InsertResult::New(tag) = &result {
            self.write_wal(DbOperation::CreateTag { tag: tag.clone() }).await?;
        }
        Ok(result)
    }

    fn create_tag_no_wal(&mut self, tag: Tag) -> InsertResult<Tag> {
        if let Some(existing) = self.get_tag(&tag.name) {
            return InsertResult::Existing(existing);
        }
        self.tags.insert(tag.name.clone(), tag.clone());
        InsertResult::New(tag)
    }

    // bookmarks

    pub fn get_bookmark(&self, user: UserId, target: &EntityRef) -> Option<Bookmark> {
        let bookmark_id = *self.bookmark_index.get(&(user, target.clone()))?.value();
        self.bookmarks.get(&bookmark_id).map(|x| x.value().clone())
    }

    pub fn is_bookmarked(&self, user: UserId, target: &EntityRef) -> bool {
        self.bookmark_index.contains_key(&(user, target.clone()))
    }

    /// Tags `user` put on `target`, newest tag first. Empty when not bookmarked.
    pub fn get_user_tags(&self, user: UserId, target: &EntityRef) -> Vec<Tag> {
        let Some(bookmark) = self.get_bookmark(user, target) else {
            return vec![];
        };
        let tags = bookmark.tags.iter()
            .filter_map(|x| self.get_tag(x))
            .collect::<Vec<Tag>>();
        sort_tags(tags)
    }

    /// Bookmarks of `user`, newest first.
    pub fn get_bookmarks_by_user(&self, user: UserId) -> Vec<Bookmark> {
        self.bookmarks.iter()
            .filter(|x| x.value().bookmarker == user)
            .map(|x| x.value().clone())
            .sorted_by_key(|x| std::cmp::Reverse(x.id))
            .collect()
    }

    /// Identifiers of the `model` objects bookmarked by `user`.
    pub fn get_bookmarked_object_ids(&self, user: UserId, model: &str) -> Vec<String> {
        self.get_bookmarks_by_user(user).into_iter()
            .filter(|x| x.target.content_type == model)
            .map(|x| x.target.object_id)
            .collect()
    }

    fn ensure_can_bookmark(&self, user: UserId, target: &EntityRef) -> Result<(), TagmarkError> {
        if !self.users.contains_key(&user) {
            return Err(TagmarkError::NotFound("User"));
        }
        if self.resolve(target).is_none() {
            return Err(TagmarkError::NotFound("Object"));
        }
        Ok(())
    }

    /// Creates the bookmark of `user` on `target` unless it already exists.
    pub async fn bookmark(&mut self, user: UserId, target: &EntityRef) -> Result<InsertResult<Bookmark>, TagmarkError> {
        self.ensure_can_bookmark(user, target)?;
        let now = Utc::now();
        let bookmark = Bookmark {
            id: self.next_bookmark_id,
            bookmarker: user,
            target: target.clone(),
            tags: vec![],
            created_at: now,
            modified_at: now,
        };
        let result = self.create_bookmark_no_wal(bookmark);
        if let InsertResult::New(bookmark) = &result {
            self.write_wal(DbOperation::CreateBookmark { bookmark: bookmark.clone() }).await?;
        }
        Ok(result)
    }

    /// Removes the bookmark of `user` on `target` together with its tag attachments.
    /// The tags themselves stay. Returns whether a bookmark was removed.
    pub async fn unbookmark(&mut self, user: UserId, target: &EntityRef) -> Result<bool, TagmarkError> {
        let Some(bookmark) = self.get_bookmark(user, target) else {
            return Ok(false);
        };
        self.delete_bookmark_no_wal(bookmark.id);
        self.write_wal(DbOperation::DeleteBookmark { bookmark_id: bookmark.id }).await?;
        Ok(true)
    }

    /// Flips the bookmark state of `target` for `user` and returns the state afterwards.
    pub async fn toggle_bookmark(&mut self, user: UserId, target: &EntityRef) -> Result<bool, TagmarkError> {
        if self.is_bookmarked(user, target) {
            self.unbookmark(user, target).await?;
        } else {
            self.bookmark(user, target).await?;
        }
        Ok(self.is_bookmarked(user, target))
    }

    /// Bookmarks `target` if needed and attaches every slugified name the bookmark does not
    /// carry yet. Returns the newly attached tags.
    pub async fn add_tags<S: AsRef<str>>(&mut self, user: UserId, target: &EntityRef, names: &[S]) -> Result<Vec<Tag>, TagmarkError> {
        let mut bookmark = self.bookmark(user, target).await?.safe_unwrap();
        let mut added = vec![];
        for name in names {
            let slug = name.as_ref().slugify();
            if slug.is_empty() || bookmark.has_tag(&slug) {
                continue;
            }
            let tag = self.get_or_create_tag(&slug).await?.safe_unwrap();
            let at = Utc::now();
            self.attach_tag_no_wal(bookmark.id, &tag.name, at);
            self.write_wal(DbOperation::AttachTag { bookmark_id: bookmark.id, tag: tag.name.clone(), at }).await?;
            bookmark.tags.push(tag.name.clone());
            added.push(tag);
        }
        if !added.is_empty() {
            info!("user {} tagged {} with {}", user, target, added.iter().map(|x| &x.name).join(", "));
        }
        Ok(added)
    }

    /// Detaches the tag called `name` from the bookmark of `user` on `target`. Fails with
    /// `NotFound` when no such tag exists at all; never creates a bookmark.
    pub async fn remove_tag(&mut self, user: UserId, target: &EntityRef, name: &str) -> Result<bool, TagmarkError> {
        let slug = name.slugify();
        let tag = self.get_tag(&slug).ok_or(TagmarkError::NotFound("Tag"))?;
        let Some(bookmark) = self.get_bookmark(user, target) else {
            return Ok(false);
        };
        if !bookmark.has_tag(&tag.name) {
            return Ok(false);
        }
        let at = Utc::now();
        self.detach_tag_no_wal(bookmark.id, &tag.name, at);
        self.write_wal(DbOperation::DetachTag { bookmark_id: bookmark.id, tag: tag.name, at }).await?;
        Ok(true)
    }

    /// Drops every bookmark on `target`, used when the object itself goes away.
    pub async fn delete_entity_bookmarks(&mut self, target: &EntityRef) -> Result<usize, TagmarkError> {
        let removed = self.delete_entity_bookmarks_no_wal(target);
        if removed > 0 {
            self.write_wal(DbOperation::DeleteEntityBookmarks { target: target.clone() }).await?;
        }
        Ok(removed)
    }

    fn create_bookmark_no_wal(&mut self, bookmark: Bookmark) -> InsertResult<Bookmark> {
        let key = (bookmark.bookmarker, bookmark.target.clone());
        if let Some(existing_id) = self.bookmark_index.get(&key).map(|x| *x.value()) {
            if let Some(existing) = self.bookmarks.get(&existing_id).map(|x| x.value().clone()) {
                return InsertResult::Existing(existing);
            }
        }
        self.next_bookmark_id = self.next_bookmark_id.max(bookmark.id + 1);
        self.bookmark_index.insert(key, bookmark.id);
        self.bookmarks.insert(bookmark.id, bookmark.clone());
        InsertResult::New(bookmark)
    }

    fn delete_bookmark_no_wal(&mut self, bookmark_id: BookmarkId) -> Option<Bookmark> {
        let (_, bookmark) = self.bookmarks.remove(&bookmark_id)?;
        self.bookmark_index.remove(&(bookmark.bookmarker, bookmark.target.clone()));
        Some(bookmark)
    }

    fn delete_entity_bookmarks_no_wal(&mut self, target: &EntityRef) -> usize {
        let bookmark_ids = self.bookmarks.iter()
            .filter(|x| &x.value().target == target)
            .map(|x| *x.key())
            .collect::<Vec<BookmarkId>>();
        for bookmark_id in &bookmark_ids {
            self.delete_bookmark_no_wal(*bookmark_id);
        }
        bookmark_ids.len()
    }

    fn attach_tag_no_wal(&mut self, bookmark_id: BookmarkId, tag: &str, at: DateTime<Utc>) -> bool {
        if !self.tags.contains_key(tag) {
            return false;
        }
        if let Some(mut kvp) = self.bookmarks.get_mut(&bookmark_id) {
            let bookmark = kvp.value_mut();
            if !bookmark.has_tag(tag) {
                bookmark.tags.push(tag.to_string());
                bookmark.modified_at = at;
                return true;
            }
        }
        false
    }

    fn detach_tag_no_wal(&mut self, bookmark_id: BookmarkId, tag: &str, at: DateTime<Utc>) -> bool {
        if let Some(mut kvp) = self.bookmarks.get_mut(&bookmark_id) {
            let bookmark = kvp.value_mut();
            if bookmark.has_tag(tag) {
                bookmark.tags.retain(|x| x != tag);
                bookmark.modified_at = at;
                return true;
            }
        }
        false
    }
}

/// Newest first, ties broken by name so listings are stable.
pub(crate) fn sort_tags(tags: Vec<Tag>) -> Vec<Tag> {
    tags.into_iter()
        .sorted_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.name.cmp(&b.name)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use crate::library::default_registry;
    use crate::storage::InMemoryStorage;
    use super::*;

    async fn client_with_book() -> (TagmarkClient, UserId, Book) {
        let mut client = TagmarkClient::new(InMemoryStorage::default(), default_registry());
        let author = client.create_user("juan", "bar", "Juan", "Cruz").await.unwrap();
        let reader = client.create_user("maria", "bar", "Maria", "Clara").await.unwrap();
        let book = client.create_book(author.id, "sample", Some("an excerpt")).await.unwrap();
        (client, reader.id, book)
    }

    fn tag_names(tags: &[Tag]) -> HashSet<String> {
        tags.iter().map(|x| x.name.clone()).collect()
    }

    #[tokio::test]
    async fn toggle_twice_is_identity() {
        let (mut client, maria, book) = client_with_book().await;
        let target = book.entity_ref();
        assert!(!client.is_bookmarked(maria, &target));
        assert!(client.toggle_bookmark(maria, &target).await.unwrap());
        assert!(client.is_bookmarked(maria, &target));
        assert!(!client.toggle_bookmark(maria, &target).await.unwrap());
        assert!(!client.is_bookmarked(maria, &target));
    }

    #[tokio::test]
    async fn bookmark_is_unique_per_user_and_object() {
        let (mut client, maria, book) = client_with_book().await;
        let target = book.entity_ref();
        let first = client.bookmark(maria, &target).await.unwrap();
        let second = client.bookmark(maria, &target).await.unwrap();
        assert!(first.is_new());
        assert!(!second.is_new());
        assert_eq!(first.safe_unwrap().id, second.safe_unwrap().id);
        assert_eq!(client.get_bookmarks_by_user(maria).len(), 1);
    }

    #[tokio::test]
    async fn add_tags_collapses_case_and_duplicates() {
        let (mut client, maria, book) = client_with_book().await;
        let target = book.entity_ref();
        let added = client.add_tags(maria, &target, &["Alpha", "alpha", "Beta"]).await.unwrap();
        assert_eq!(added.len(), 2);
        assert!(client.is_bookmarked(maria, &target));
        let tags = client.get_user_tags(maria, &target);
        assert_eq!(tag_names(&tags), HashSet::from(["alpha".to_string(), "beta".to_string()]));

        let added_again = client.add_tags(maria, &target, &["BETA", " ", "gamma"]).await.unwrap();
        assert_eq!(tag_names(&added_again), HashSet::from(["gamma".to_string()]));
        assert_eq!(client.get_user_tags(maria, &target).len(), 3);
    }

    #[tokio::test]
    async fn remove_tag_detaches_but_keeps_tag() {
        let (mut client, maria, book) = client_with_book().await;
        let target = book.entity_ref();
        client.add_tags(maria, &target, &["Alpha", "alpha", "Beta"]).await.unwrap();
        assert!(client.remove_tag(maria, &target, "ALPHA").await.unwrap());
        let tags = client.get_user_tags(maria, &target);
        assert_eq!(tag_names(&tags), HashSet::from(["beta".to_string()]));
        assert!(client.get_tag("alpha").is_some());
        assert!(!client.remove_tag(maria, &target, "alpha").await.unwrap());
    }

    #[tokio::test]
    async fn remove_unknown_tag_is_not_found() {
        let (mut client, maria, book) = client_with_book().await;
        let result = client.remove_tag(maria, &book.entity_ref(), "nope").await;
        assert!(matches!(result, Err(TagmarkError::NotFound("Tag"))));
    }

    #[tokio::test]
    async fn remove_tag_never_bookmarks() {
        let (mut client, maria, book) = client_with_book().await;
        let juan = client.get_user_by_username("juan").unwrap().id;
        client.add_tags(juan, &book.entity_ref(), &["omega"]).await.unwrap();
        assert!(!client.remove_tag(maria, &book.entity_ref(), "omega").await.unwrap());
        assert!(!client.is_bookmarked(maria, &book.entity_ref()));
        assert_eq!(client.get_user_tags(juan, &book.entity_ref()).len(), 1);
    }

    #[tokio::test]
    async fn unbookmark_drops_user_tags() {
        let (mut client, maria, book) = client_with_book().await;
        let target = book.entity_ref();
        client.add_tags(maria, &target, &["omega", "delta"]).await.unwrap();
        assert!(!client.toggle_bookmark(maria, &target).await.unwrap());
        assert!(client.get_user_tags(maria, &target).is_empty());
        assert!(client.toggle_bookmark(maria, &target).await.unwrap());
        assert!(client.get_user_tags(maria, &target).is_empty());
        assert!(client.get_tag("omega").is_some());
    }

    #[tokio::test]
    async fn sci_fi_scenario() {
        let (mut client, maria, book) = client_with_book().await;
        let target = book.entity_ref();
        client.add_tags(maria, &target, &["sci-fi", "classic"]).await.unwrap();
        assert!(client.is_bookmarked(maria, &target));
        assert_eq!(tag_names(&client.get_user_tags(maria, &target)),
            HashSet::from(["sci-fi".to_string(), "classic".to_string()]));
        client.remove_tag(maria, &target, "sci-fi").await.unwrap();
        assert_eq!(tag_names(&client.get_user_tags(maria, &target)), HashSet::from(["classic".to_string()]));
        assert!(!client.toggle_bookmark(maria, &target).await.unwrap());
        assert!(client.get_user_tags(maria, &target).is_empty());
    }

    #[tokio::test]
    async fn bookmarking_requires_existing_object_and_user() {
        let (mut client, maria, _) = client_with_book().await;
        let missing_book = EntityRef::new("book", "404");
        let not_an_int = EntityRef::new("book", "abc");
        let unknown_type = EntityRef::new("film", "1");
        assert!(matches!(client.toggle_bookmark(maria, &missing_book).await, Err(TagmarkError::NotFound("Object"))));
        assert!(matches!(client.add_tags(maria, &not_an_int, &["x"]).await, Err(TagmarkError::NotFound("Object"))));
        assert!(matches!(client.bookmark(maria, &unknown_type).await, Err(TagmarkError::NotFound("Object"))));
        let book = client.get_all_books().remove(0);
        assert!(matches!(client.bookmark(999, &book.entity_ref()).await, Err(TagmarkError::NotFound("User"))));
    }

    #[tokio::test]
    async fn deleting_book_cascades_to_quotes_and_bookmarks() {
        let (mut client, maria, book) = client_with_book().await;
        let quote = client.create_quote(book.id, "a line").await.unwrap();
        client.add_tags(maria, &book.entity_ref(), &["x"]).await.unwrap();
        client.add_tags(maria, &quote.entity_ref(), &["x"]).await.unwrap();
        assert_eq!(client.get_bookmarks_by_user(maria).len(), 2);

        assert!(client.delete_book(book.id).await.unwrap().is_some());
        assert!(client.get_quote(&quote.id).is_none());
        assert!(client.get_bookmarks_by_user(maria).is_empty());
        assert!(client.get_tag("x").is_some());
        assert!(client.delete_book(book.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_entity_bookmarks_removes_every_users_bookmark() {
        let (mut client, maria, book) = client_with_book().await;
        let juan = client.get_user_by_username("juan").unwrap().id;
        client.toggle_bookmark(maria, &book.entity_ref()).await.unwrap();
        client.toggle_bookmark(juan, &book.entity_ref()).await.unwrap();
        assert_eq!(client.delete_entity_bookmarks(&book.entity_ref()).await.unwrap(), 2);
        assert!(!client.is_bookmarked(maria, &book.entity_ref()));
        assert!(!client.is_bookmarked(juan, &book.entity_ref()));
    }

    #[tokio::test]
    async fn users_with_bookmarks_or_books_are_protected() {
        let (mut client, maria, book) = client_with_book().await;
        client.toggle_bookmark(maria, &book.entity_ref()).await.unwrap();
        assert!(matches!(client.delete_user("maria").await, Err(TagmarkError::ProtectedUser(_))));
        assert!(matches!(client.delete_user("juan").await, Err(TagmarkError::ProtectedUser(_))));
        client.toggle_bookmark(maria, &book.entity_ref()).await.unwrap();
        assert_eq!(client.delete_user("maria").await.unwrap().id, maria);
        assert!(client.get_user_by_username("maria").is_none());
        assert!(matches!(client.delete_user("maria").await, Err(TagmarkError::NotFound("User"))));
    }

    #[tokio::test]
    async fn create_user_validates_username() {
        let (mut client, _, _) = client_with_book().await;
        assert!(matches!(client.create_user("maria", "x", "", "").await, Err(TagmarkError::UserAlreadyExists(_))));
        assert!(matches!(client.create_user("a b", "x", "", "").await, Err(TagmarkError::InvalidInput(_))));
        assert!(matches!(client.create_user("", "x", "", "").await, Err(TagmarkError::InvalidInput(_))));
        assert!(client.authenticate("maria", "bar").is_some());
        assert!(client.authenticate("maria", "baz").is_none());
        assert!(client.authenticate("nobody", "bar").is_none());
    }

    #[tokio::test]
    async fn replaying_the_log_restores_state() {
        let (mut client, maria, book) = client_with_book().await;
        let quote = client.create_quote(book.id, "a line").await.unwrap();
        client.add_tags(maria, &book.entity_ref(), &["omega", "delta"]).await.unwrap();
        client.add_tags(maria, &quote.entity_ref(), &["omega"]).await.unwrap();
        client.remove_tag(maria, &book.entity_ref(), "delta").await.unwrap();
        client.toggle_bookmark(maria, &quote.entity_ref()).await.unwrap();

        let operations = client.storage.read_all().await.unwrap();
        let mut replayed = TagmarkClient::new(InMemoryStorage::with_operations(operations), default_registry());
        replayed.init().await.unwrap();

        assert_eq!(replayed.get_all_users(), client.get_all_users());
        assert_eq!(replayed.get_bookmarks_by_user(maria), client.get_bookmarks_by_user(maria));
        assert_eq!(replayed.get_all_tags(), client.get_all_tags());
        assert_eq!(tag_names(&replayed.get_user_tags(maria, &book.entity_ref())), HashSet::from(["omega".to_string()]));
        assert!(!replayed.is_bookmarked(maria, &quote.entity_ref()));

        let next = replayed.create_book(book.author, "another", None).await.unwrap();
        assert_eq!(next.id, book.id + 1);
    }

    #[tokio::test]
    async fn bookmarked_object_ids_by_model() {
        let (mut client, maria, book) = client_with_book().await;
        let quote = client.create_quote(book.id, "a line").await.unwrap();
        client.toggle_bookmark(maria, &book.entity_ref()).await.unwrap();
        client.toggle_bookmark(maria, &quote.entity_ref()).await.unwrap();
        assert_eq!(client.get_bookmarked_object_ids(maria, "book"), vec![book.id.to_string()]);
        assert_eq!(client.get_bookmarked_object_ids(maria, "quote"), vec![quote.id.to_string()]);
    }

    #[tokio::test]
    async fn tag_changes_touch_modified_at() {
        let (mut client, maria, book) = client_with_book().await;
        let target = book.entity_ref();
        let created = client.bookmark(maria, &target).await.unwrap().safe_unwrap();
        assert_eq!(created.created_at, created.modified_at);

        client.add_tags(maria, &target, &["omega"]).await.unwrap();
        let tagged = client.get_bookmark(maria, &target).unwrap();
        assert!(tagged.modified_at >= created.modified_at);
        assert_eq!(tagged.created_at, created.created_at);

        client.remove_tag(maria, &target, "omega").await.unwrap();
        let untagged = client.get_bookmark(maria, &target).unwrap();
        assert!(untagged.modified_at >= tagged.modified_at);

        assert!(!client.remove_tag(maria, &target, "omega").await.unwrap());
        assert_eq!(client.get_bookmark(maria, &target).unwrap().modified_at, untagged.modified_at);
    }

    #[tokio::test]
    async fn deleting_quote_drops_its_bookmarks_only() {
        let (mut client, maria, book) = client_with_book().await;
        let quote = client.create_quote(book.id, "a line").await.unwrap();
        client.add_tags(maria, &book.entity_ref(), &["x"]).await.unwrap();
        client.add_tags(maria, &quote.entity_ref(), &["x"]).await.unwrap();

        assert_eq!(client.delete_quote(&quote.id).await.unwrap().map(|x| x.id), Some(quote.id));
        assert!(client.get_quote(&quote.id).is_none());
        assert!(!client.is_bookmarked(maria, &quote.entity_ref()));
        assert!(client.is_bookmarked(maria, &book.entity_ref()));
        assert!(client.get_book(book.id).is_some());
        assert!(client.delete_quote(&quote.id).await.unwrap().is_none());

        let operations = client.storage.read_all().await.unwrap();
        let mut replayed = TagmarkClient::new(InMemoryStorage::with_operations(operations), default_registry());
        replayed.init().await.unwrap();
        assert!(replayed.get_quote(&quote.id).is_none());
        assert_eq!(replayed.get_bookmarks_by_user(maria), client.get_bookmarks_by_user(maria));
    }

    #[tokio::test]
    async fn resolve_describes_objects() {
        let (mut client, _, book) = client_with_book().await;
        let quote = client.create_quote(book.id, "a line").await.unwrap();
        let resolved = client.resolve(&book.entity_ref()).unwrap();
        assert_eq!(resolved.label, "sample by Juan Cruz");
        assert_eq!(resolved.url.as_deref(), Some(format!("/book/detail/{}", book.id).as_str()));
        assert_eq!(resolved.content_type_id, 1);
        let resolved = client.resolve(&quote.entity_ref()).unwrap();
        assert_eq!(resolved.label, "a line");
        assert_eq!(resolved.verbose_name, "Quote");
        assert!(client.resolve(&EntityRef::new("quote", "not-a-uuid")).is_none());
    }
}
