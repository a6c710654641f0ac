//! Content types and the tables that back them
//!
//! Every likeable/bookmarkable entity is addressed by a [`ContentRef`]. The
//! tables and counter columns for a type come from [`ContentTypeInfo::resolve`],
//! which is total over the closed [`ContentType`] enum. Parsing an unknown tag
//! is an error, never a silent fallback.

use crate::error::{Result, SdkError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported content types
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Quote,
    Forum,
    Media,
    Knowledge,
    Wiki,
    Research,
    Ai,
}

impl ContentType {
    pub const ALL: [ContentType; 7] = [
        ContentType::Quote,
        ContentType::Forum,
        ContentType::Media,
        ContentType::Knowledge,
        ContentType::Wiki,
        ContentType::Research,
        ContentType::Ai,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Forum => "forum",
            Self::Media => "media",
            Self::Knowledge => "knowledge",
            Self::Wiki => "wiki",
            Self::Research => "research",
            Self::Ai => "ai",
        }
    }

    /// Backing tables for this type
    pub fn info(&self) -> &'static ContentTypeInfo {
        ContentTypeInfo::resolve(*self)
    }
}

impl FromStr for ContentType {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "quote" | "quotes" => Ok(Self::Quote),
            "forum" => Ok(Self::Forum),
            "media" => Ok(Self::Media),
            "knowledge" => Ok(Self::Knowledge),
            "wiki" => Ok(Self::Wiki),
            "research" => Ok(Self::Research),
            "ai" => Ok(Self::Ai),
            _ => Err(SdkError::UnknownContentType(s.to_string())),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The two per-viewer interactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Like,
    Bookmark,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Bookmark => "bookmark",
        }
    }
}

impl fmt::Display for InteractionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to one content item
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentRef {
    pub content_type: ContentType,
    pub content_id: String,
}

impl ContentRef {
    pub fn new(content_type: ContentType, content_id: impl Into<String>) -> Self {
        Self {
            content_type,
            content_id: content_id.into(),
        }
    }

    /// Composite key `"<type>:<id>"`
    pub fn key(&self) -> String {
        format!("{}:{}", self.content_type, self.content_id)
    }

    pub fn info(&self) -> &'static ContentTypeInfo {
        self.content_type.info()
    }
}

impl FromStr for ContentRef {
    type Err = SdkError;

    /// Parse a `"<type>:<id>"` key
    fn from_str(s: &str) -> Result<Self> {
        let (tag, id) = s
            .split_once(':')
            .ok_or_else(|| SdkError::Validation(format!("expected <type>:<id>, got {}", s)))?;
        if id.is_empty() {
            return Err(SdkError::Validation(format!("empty content id in {}", s)));
        }
        Ok(Self::new(tag.parse()?, id))
    }
}

impl fmt::Display for ContentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.content_type, self.content_id)
    }
}

/// Static descriptor of the tables behind a content type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentTypeInfo {
    /// Table holding the content rows (and their denormalized counters)
    pub content_table: &'static str,
    pub likes_table: &'static str,
    pub bookmarks_table: &'static str,
    /// Column in the likes/bookmarks tables that references the content row
    pub content_id_field: &'static str,
    /// Denormalized like counter on the content row
    pub likes_column: &'static str,
    /// Denormalized bookmark counter on the content row
    pub bookmarks_column: &'static str,
}

const fn shared(content_table: &'static str) -> ContentTypeInfo {
    ContentTypeInfo {
        content_table,
        likes_table: "content_likes",
        bookmarks_table: "content_bookmarks",
        content_id_field: "content_id",
        likes_column: "likes",
        bookmarks_column: "bookmarks",
    }
}

static QUOTE: ContentTypeInfo = ContentTypeInfo {
    content_table: "quotes",
    likes_table: "quote_likes",
    bookmarks_table: "quote_bookmarks",
    content_id_field: "quote_id",
    likes_column: "likes",
    bookmarks_column: "bookmarks",
};

static MEDIA: ContentTypeInfo = ContentTypeInfo {
    content_table: "media_posts",
    likes_table: "media_likes",
    bookmarks_table: "content_bookmarks",
    content_id_field: "content_id",
    likes_column: "likes",
    bookmarks_column: "bookmarks",
};

static FORUM: ContentTypeInfo = shared("forum_posts");
static KNOWLEDGE: ContentTypeInfo = shared("knowledge_entries");
static WIKI: ContentTypeInfo = shared("wiki_articles");
static RESEARCH: ContentTypeInfo = shared("research_papers");
static AI: ContentTypeInfo = shared("ai_content");

impl ContentTypeInfo {
    /// Descriptor for a content type
    pub fn resolve(content_type: ContentType) -> &'static ContentTypeInfo {
        match content_type {
            ContentType::Quote => &QUOTE,
            ContentType::Forum => &FORUM,
            ContentType::Media => &MEDIA,
            ContentType::Knowledge => &KNOWLEDGE,
            ContentType::Wiki => &WIKI,
            ContentType::Research => &RESEARCH,
            ContentType::Ai => &AI,
        }
    }

    /// Parse a tag and resolve it; unknown tags are an error
    pub fn resolve_tag(tag: &str) -> Result<&'static ContentTypeInfo> {
        Ok(Self::resolve(tag.parse()?))
    }

    /// Interaction table for a kind
    pub fn table(&self, kind: InteractionKind) -> &'static str {
        match kind {
            InteractionKind::Like => self.likes_table,
            InteractionKind::Bookmark => self.bookmarks_table,
        }
    }

    /// Counter column on the content row for a kind
    pub fn counter_column(&self, kind: InteractionKind) -> &'static str {
        match kind {
            InteractionKind::Like => self.likes_column,
            InteractionKind::Bookmark => self.bookmarks_column,
        }
    }
}
