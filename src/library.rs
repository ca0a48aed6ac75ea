//! Sample bookmarkable types: books and the quotes taken from them.
//!
//! Books are keyed by integers and quotes by UUIDs, which exercises both identifier kinds
//! through the same bookmark table.

use askama::Template;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::client::TagmarkClient;
use crate::content_types::{Bookmarkable, ContentTypeRegistry};
use crate::entities::UserId;
use crate::error::TagmarkError;

pub type BookId = i64;
pub type QuoteId = Uuid;

const QUOTE_LABEL_LENGTH: usize = 50;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Book {
    pub id: BookId,
    pub title: String,
    pub excerpt: Option<String>,
    pub author: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Quote {
    pub id: QuoteId,
    pub book: BookId,
    pub quote: String,
    pub created_at: DateTime<Utc>,
}

/// All bookmarkable types of the app, in their fixed registration order.
pub fn default_registry() -> ContentTypeRegistry {
    ContentTypeRegistry::new()
        .register::<Book>()
        .register::<Quote>()
}

fn author_name(client: &TagmarkClient, author: UserId) -> String {
    client.get_user_by_id(author)
        .map(|x| x.full_name())
        .unwrap_or_default()
}

#[derive(Template)]
#[template(path = "library/book_panel.html")]
struct BookPanelTemplate<'a> {
    title: &'a str,
    author: String,
    excerpt: &'a str,
}

#[derive(Template)]
#[template(path = "library/quote_panel.html")]
struct QuotePanelTemplate<'a> {
    quote: &'a str,
    author: String,
    book_title: String,
}

impl Bookmarkable for Book {
    const MODEL_NAME: &'static str = "book";
    const VERBOSE_NAME: &'static str = "Book";
    const VERBOSE_NAME_PLURAL: &'static str = "Books";

    fn object_id(&self) -> String {
        self.id.to_string()
    }

    fn find(client: &TagmarkClient, pk: &str) -> Option<Self> {
        let id = pk.parse::<BookId>().ok()?;
        client.get_book(id)
    }

    fn describe(&self, client: &TagmarkClient) -> String {
        format!("{} by {}", self.title, author_name(client, self.author))
    }

    fn detail_url(&self) -> Option<String> {
        Some(format!("/book/detail/{}", self.id))
    }

    fn panel_content(&self, client: &TagmarkClient) -> Result<String, TagmarkError> {
        let html = BookPanelTemplate {
            title: &self.title,
            author: author_name(client, self.author),
            excerpt: self.excerpt.as_deref().unwrap_or_default(),
        }.render()?;
        Ok(html)
    }
}

impl Bookmarkable for Quote {
    const MODEL_NAME: &'static str = "quote";
    const VERBOSE_NAME: &'static str = "Quote";
    const VERBOSE_NAME_PLURAL: &'static str = "Quotes";

    fn object_id(&self) -> String {
        self.id.to_string()
    }

    fn find(client: &TagmarkClient, pk: &str) -> Option<Self> {
        let id = Uuid::parse_str(pk).ok()?;
        client.get_quote(&id)
    }

    fn describe(&self, _client: &TagmarkClient) -> String {
        self.quote.chars().take(QUOTE_LABEL_LENGTH).collect()
    }

    fn panel_content(&self, client: &TagmarkClient) -> Result<String, TagmarkError> {
        let book = client.get_book(self.book);
        let html = QuotePanelTemplate {
            quote: &self.quote,
            author: book.as_ref().map(|x| author_name(client, x.author)).unwrap_or_default(),
            book_title: book.map(|x| x.title).unwrap_or_default(),
        }.render()?;
        Ok(html)
    }
}
