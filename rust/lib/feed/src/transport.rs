//! REST contract consumed by the engine.
//!
//! | operation         | request                                      |
//! |-------------------|----------------------------------------------|
//! | `list_posts`      | `GET /posts/`                                |
//! | `list_comments`   | `GET /posts/{id}/comments/?user_id=..`       |
//! | `create_post`     | `POST /posts/`                               |
//! | `delete_post`     | `DELETE /posts/{id}`                         |
//! | `create_comment`  | `POST /posts/{id}/comments/?author_id=..`    |
//! | `toggle_reaction` | `POST /reactions/`                           |
//! | `current_user`    | `GET /auth/me`                               |

use async_trait::async_trait;

use crate::error::TransportError;
use crate::model::{
    CommentId, CommentRecord, CurrentUser, PostDraft, PostId, PostRecord, ReactionRequest, UserId,
};

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Posts in server order (oldest first).
    async fn list_posts(&self) -> Result<Vec<PostRecord>, TransportError>;

    /// Nested comment forest for one post. With a `viewer` the server marks
    /// the reactions that user has made.
    async fn list_comments(
        &self,
        post_id: PostId,
        viewer: Option<UserId>,
    ) -> Result<Vec<CommentRecord>, TransportError>;

    async fn create_post(&self, draft: &PostDraft) -> Result<PostRecord, TransportError>;

    async fn delete_post(&self, post_id: PostId) -> Result<(), TransportError>;

    /// Create a comment; `parent` is `None` for a top-level comment. The
    /// server records `author` as the writer.
    async fn create_comment(
        &self,
        post_id: PostId,
        parent: Option<CommentId>,
        content: &str,
        author: Option<UserId>,
    ) -> Result<CommentRecord, TransportError>;

    /// Add or remove the caller's reaction. The server infers the user from
    /// the bearer token.
    async fn toggle_reaction(&self, req: &ReactionRequest) -> Result<(), TransportError>;

    async fn current_user(&self) -> Result<CurrentUser, TransportError>;
}
