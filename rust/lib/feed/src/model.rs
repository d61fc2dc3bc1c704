//! Feed entities and their wire representations.
//!
//! Wire records mirror the server's JSON. Every optional field defaults,
//! so a sparse payload still hydrates. Entities are what the store holds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reaction::ReactionAggregate;
use crate::tree::CommentTree;

// ── Identifiers ─────────────────────────────────────────────────────

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }
    };
}

id_type!(
    /// Server-assigned post identifier.
    PostId
);
id_type!(
    /// Server-assigned comment identifier, unique across all posts.
    CommentId
);
id_type!(UserId);

/// What a reaction is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Post(PostId),
    Comment(CommentId),
}

impl Target {
    /// Wire value of `target_type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Target::Post(_) => "post",
            Target::Comment(_) => "comment",
        }
    }

    /// Wire value of `target_id`.
    pub fn raw_id(&self) -> u64 {
        match self {
            Target::Post(id) => id.0,
            Target::Comment(id) => id.0,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind(), self.raw_id())
    }
}

// ── Author ──────────────────────────────────────────────────────────

pub const ANONYMOUS_NAME: &str = "Anonymous Student";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrollment_number: Option<String>,
}

impl Author {
    /// Full name, else the local part of the email, else the anonymous label.
    pub fn display_name(&self) -> String {
        if let Some(name) = self.full_name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        if let Some(local) = self
            .email
            .as_deref()
            .and_then(|e| e.split('@').next())
            .filter(|l| !l.is_empty())
        {
            return local.to_string();
        }
        ANONYMOUS_NAME.to_string()
    }
}

// ── Post ────────────────────────────────────────────────────────────

pub const DEFAULT_DEPARTMENT: &str = "GENERAL";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostKind {
    #[default]
    Discussion,
    Question,
    Announcement,
}

/// A post in the feed together with its reactions and comment forest.
#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub id: PostId,
    pub author_id: Option<UserId>,
    pub author: Option<Author>,
    pub title: String,
    pub content: String,
    pub department: String,
    /// Comma-separated, as stored by the server. See [`Post::tag_list`].
    pub tags: String,
    pub kind: PostKind,
    pub created_at: String,
    pub reactions: ReactionAggregate,
    pub comments: CommentTree,
    pub comment_count: usize,
}

impl Post {
    pub fn from_record(r: PostRecord) -> Self {
        let comments = CommentTree::from_records(r.id, r.comments.unwrap_or_default());
        // An embedded tree is authoritative; otherwise trust the server count.
        let comment_count = if comments.is_empty() {
            r.comments_count.unwrap_or(0)
        } else {
            comments.len()
        };
        let department = if r.department.trim().is_empty() {
            DEFAULT_DEPARTMENT.to_string()
        } else {
            r.department
        };
        Self {
            id: r.id,
            author_id: r.author_id.or(r.author.as_ref().map(|a| a.id)),
            author: r.author,
            title: r.title,
            content: r.content,
            department,
            tags: r.tags.unwrap_or_default(),
            kind: r.kind,
            created_at: r.created_at,
            reactions: ReactionAggregate::from_records(&r.reactions),
            comments,
            comment_count,
        }
    }

    /// Tags split on `,`, trimmed, empty fragments dropped.
    pub fn tag_list(&self) -> Vec<&str> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect()
    }

    pub fn author_name(&self) -> String {
        self.author
            .as_ref()
            .map(Author::display_name)
            .unwrap_or_else(|| ANONYMOUS_NAME.to_string())
    }

    pub fn is_authored_by(&self, user: UserId) -> bool {
        self.author_id == Some(user)
    }
}

// ── Wire records ────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionRecord {
    pub emoji: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub user_reacted: bool,
}

/// A comment as returned by the server, possibly with nested replies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    pub id: CommentId,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub author_id: Option<UserId>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub post_id: Option<PostId>,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
    #[serde(default)]
    pub reactions: Vec<ReactionRecord>,
    #[serde(default)]
    pub replies: Vec<CommentRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostRecord {
    pub id: PostId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: PostKind,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub author_id: Option<UserId>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub reactions: Vec<ReactionRecord>,
    #[serde(default, alias = "replies")]
    pub comments: Option<Vec<CommentRecord>>,
    #[serde(default)]
    pub comments_count: Option<usize>,
}

/// Body of `POST /posts/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
    pub department: String,
    #[serde(rename = "type")]
    pub kind: PostKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<String>,
}

/// Body of `POST /reactions/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionRequest {
    pub emoji: String,
    pub target_type: &'static str,
    pub target_id: u64,
}

impl ReactionRequest {
    pub fn new(target: Target, emoji: &str) -> Self {
        Self {
            emoji: emoji.to_string(),
            target_type: target.kind(),
            target_id: target.raw_id(),
        }
    }
}

/// Response of `GET /auth/me`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub enrollment_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_wire_values() {
        assert_eq!(Target::Post(PostId(3)).kind(), "post");
        assert_eq!(Target::Comment(CommentId(9)).kind(), "comment");
        assert_eq!(Target::Comment(CommentId(9)).raw_id(), 9);
        assert_eq!(Target::Post(PostId(3)).to_string(), "post/3");
    }

    #[test]
    fn reaction_request_json() {
        let req = ReactionRequest::new(Target::Comment(CommentId(12)), "👍");
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"emoji": "👍", "target_type": "comment", "target_id": 12})
        );
    }

    #[test]
    fn display_name_fallbacks() {
        let mut a = Author {
            id: UserId(1),
            full_name: Some("Ada Lovelace".into()),
            email: Some("ada@campus.edu".into()),
            ..Default::default()
        };
        assert_eq!(a.display_name(), "Ada Lovelace");

        a.full_name = None;
        assert_eq!(a.display_name(), "ada");

        a.email = None;
        assert_eq!(a.display_name(), ANONYMOUS_NAME);
    }

    #[test]
    fn sparse_post_record_hydrates() {
        let r: PostRecord = serde_json::from_value(serde_json::json!({
            "id": 7,
            "title": "Lab hours",
            "content": "Moved to Friday",
            "department": "",
            "tags": "cs, labs,,  ",
            "created_at": "2024-03-01T10:00:00"
        }))
        .unwrap();
        let post = Post::from_record(r);

        assert_eq!(post.id, PostId(7));
        assert_eq!(post.department, DEFAULT_DEPARTMENT);
        assert_eq!(post.kind, PostKind::Discussion);
        assert_eq!(post.tag_list(), vec!["cs", "labs"]);
        assert!(post.reactions.is_empty());
        assert!(post.comments.is_empty());
        assert_eq!(post.comment_count, 0);
        assert_eq!(post.author_name(), ANONYMOUS_NAME);
    }

    #[test]
    fn post_record_with_embedded_comments() {
        let r: PostRecord = serde_json::from_value(serde_json::json!({
            "id": 1,
            "type": "question",
            "author": {"id": 4, "email": "kim@campus.edu"},
            "comments_count": 99,
            "comments": [
                {"id": 10, "content": "a", "replies": [{"id": 11, "content": "b"}]},
                {"id": 12, "content": "c"}
            ]
        }))
        .unwrap();
        let post = Post::from_record(r);

        assert_eq!(post.kind, PostKind::Question);
        assert_eq!(post.author_id, Some(UserId(4)));
        assert!(post.is_authored_by(UserId(4)));
        assert_eq!(post.comment_count, 3);
    }

    #[test]
    fn post_draft_serializes_type_field() {
        let draft = PostDraft {
            title: "t".into(),
            content: "c".into(),
            department: "CSE".into(),
            kind: PostKind::Announcement,
            tags: None,
        };
        let json = serde_json::to_value(&draft).unwrap();
        assert_eq!(json["type"], "announcement");
        assert!(json.get("tags").is_none());
    }
}
