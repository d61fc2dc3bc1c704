//! Predict locally, send, then confirm or roll back.
//!
//! All transport failures stop here: they become a rollback (when a local
//! prediction was applied) plus exactly one notice, and surface to the
//! caller as an [`Outcome`], never as a panic or an `Err`.
//!
//! Local state is touched only before the first `.await` or after the
//! last one, each time in a single synchronous [`FeedState`] call.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{FeedError, TransportError};
use crate::model::{
    CommentId, CurrentUser, Post, PostDraft, PostId, ReactionRequest, Target, UserId,
};
use crate::mutation::{InFlight, Mutation, MutationKey, MutationKind};
use crate::notify::{NoticeKind, Notifier};
use crate::session::Session;
use crate::state::FeedState;
use crate::transport::Transport;
use crate::tree::{CommentNode, CommentTree};

pub const DEFAULT_MAX_CONTENT_LEN: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedOptions {
    /// Panic on a stale reply parent instead of degrading to a notice.
    pub strict: bool,
    /// Upper bound, in characters, for reply and post bodies.
    pub max_content_len: usize,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            strict: cfg!(debug_assertions),
            max_content_len: DEFAULT_MAX_CONTENT_LEN,
        }
    }
}

/// Result of a feed entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    /// The server accepted the operation.
    Confirmed(T),
    /// A local prediction was applied and then reverted.
    RolledBack(FeedError),
    /// Nothing was changed locally.
    Failed(FeedError),
}

impl<T> Outcome<T> {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Outcome::Confirmed(_))
    }

    pub fn error(&self) -> Option<&FeedError> {
        match self {
            Outcome::Confirmed(_) => None,
            Outcome::RolledBack(e) | Outcome::Failed(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<T, FeedError> {
        match self {
            Outcome::Confirmed(v) => Ok(v),
            Outcome::RolledBack(e) | Outcome::Failed(e) => Err(e),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Confirmed(v) => Outcome::Confirmed(f(v)),
            Outcome::RolledBack(e) => Outcome::RolledBack(e),
            Outcome::Failed(e) => Outcome::Failed(e),
        }
    }
}

pub struct OptimisticController {
    state: Arc<FeedState>,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    in_flight: InFlight,
    options: FeedOptions,
}

impl OptimisticController {
    pub fn new(
        state: Arc<FeedState>,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        options: FeedOptions,
    ) -> Self {
        Self {
            state,
            transport,
            notifier,
            in_flight: InFlight::new(),
            options,
        }
    }

    pub fn options(&self) -> &FeedOptions {
        &self.options
    }

    pub fn is_pending(&self, key: &MutationKey) -> bool {
        self.in_flight.is_pending(key)
    }

    // ── Reactions ───────────────────────────────────────────────────

    pub async fn apply_reaction_toggle(&self, target: Target, emoji: &str) -> Outcome<()> {
        if emoji.trim().is_empty() {
            return self.reject(FeedError::ValidationFailure("Pick an emoji to react with".into()));
        }
        let key = MutationKey::new(target, MutationKind::Reaction);
        let mut mutation = Mutation::new(key);
        let snapshot = match self.state.toggle_reaction(target, emoji) {
            Ok(snapshot) => snapshot,
            Err(e) => return self.stale(e),
        };
        if let Err(e) = mutation.apply(snapshot) {
            warn!(error = %e, "reaction apply out of order");
        }
        debug!(target = %target, emoji, "reaction applied");

        let _guard = self.in_flight.begin(key);
        let request = ReactionRequest::new(target, emoji);
        match self.transport.toggle_reaction(&request).await {
            Ok(()) => {
                if let Err(e) = mutation.confirm() {
                    warn!(error = %e, "reaction confirm out of order");
                }
                debug!(target = %target, emoji, "reaction confirmed");
                Outcome::Confirmed(())
            }
            Err(e) => {
                let err = FeedError::from(e);
                match mutation.roll_back(err.clone()) {
                    Ok(snapshot) => {
                        if !self.state.restore_reaction(target, &snapshot) {
                            debug!(target = %target, "target left the feed, nothing to restore");
                        }
                    }
                    Err(invalid) => warn!(error = %invalid, "reaction rollback out of order"),
                }
                warn!(target = %target, emoji, error = %err, "reaction rolled back");
                self.notifier
                    .notify(&format!("Could not update reaction: {}", err), NoticeKind::Error);
                Outcome::RolledBack(err)
            }
        }
    }

    // ── Deletion ────────────────────────────────────────────────────

    pub async fn apply_post_deletion(&self, post_id: PostId) -> Outcome<()> {
        let key = MutationKey::new(Target::Post(post_id), MutationKind::Deletion);
        let mut mutation: Mutation<(usize, Post)> = Mutation::new(key);
        let removed = match self.state.remove_post(post_id) {
            Ok(removed) => removed,
            Err(e) => return self.stale(e),
        };
        debug!(post_id = %post_id, index = removed.0, "post removed locally");
        if let Err(e) = mutation.apply(removed) {
            warn!(error = %e, "deletion apply out of order");
        }

        let _guard = self.in_flight.begin(key);
        match self.transport.delete_post(post_id).await {
            Ok(()) => {
                if let Err(e) = mutation.confirm() {
                    warn!(error = %e, "deletion confirm out of order");
                }
                info!(post_id = %post_id, "post deleted");
                self.notifier.notify("Post deleted", NoticeKind::Success);
                Outcome::Confirmed(())
            }
            Err(TransportError::Server { status: 404, .. }) => {
                if let Err(e) = mutation.confirm() {
                    warn!(error = %e, "deletion confirm out of order");
                }
                info!(post_id = %post_id, "post was already gone on the server");
                self.notifier
                    .notify("That post had already been deleted", NoticeKind::Info);
                Outcome::Confirmed(())
            }
            Err(e) => {
                let err = FeedError::from(e);
                match mutation.roll_back(err.clone()) {
                    Ok((index, post)) => {
                        let at = self.state.reinsert_post(index, post);
                        warn!(post_id = %post_id, index = at, error = %err, "deletion rolled back");
                    }
                    Err(invalid) => warn!(error = %invalid, "deletion rollback out of order"),
                }
                self.notifier
                    .notify(&format!("Could not delete post: {}", err), NoticeKind::Error);
                Outcome::RolledBack(err)
            }
        }
    }

    // ── Replies ─────────────────────────────────────────────────────

    /// Send, await the server-assigned id, then insert. Nothing is shown
    /// locally until the server answers; the reply key stays pending
    /// meanwhile. `author` is sent along when the session knows the user.
    pub async fn submit_reply(
        &self,
        post_id: PostId,
        parent: Option<CommentId>,
        content: &str,
        author: Option<UserId>,
    ) -> Outcome<CommentNode> {
        let content = match self.validate_content(content, "Reply") {
            Ok(c) => c,
            Err(e) => return self.reject(e),
        };
        let Some(tree) = self.state.comment_tree(post_id) else {
            return self.stale(FeedError::PostNotFound(post_id));
        };
        if let Some(parent_id) = parent {
            if !tree.contains(parent_id) {
                return self.stale_parent(FeedError::NodeNotFound {
                    post_id: Some(post_id),
                    comment_id: parent_id,
                });
            }
        }

        let target = parent.map_or(Target::Post(post_id), Target::Comment);
        let _guard = self.in_flight.begin(MutationKey::new(target, MutationKind::Reply));
        debug!(post_id = %post_id, parent = ?parent, "sending reply");

        let sent = self.transport.create_comment(post_id, parent, content, author);
        let record = match sent.await {
            Ok(record) => record,
            Err(e) => {
                let err = FeedError::from(e);
                warn!(post_id = %post_id, error = %err, "reply failed");
                self.notifier
                    .notify(&format!("Could not post reply: {}", err), NoticeKind::Error);
                return Outcome::Failed(err);
            }
        };

        let node = CommentNode::from_record(post_id, parent, record);
        match self.state.insert_comment(post_id, parent, node.clone()) {
            Ok(_) => {
                info!(post_id = %post_id, comment_id = %node.id, "reply added");
                Outcome::Confirmed(node)
            }
            Err(e) => self.stale_parent(e),
        }
    }

    // ── Posts and loading ───────────────────────────────────────────

    /// Posts are never inserted before the server assigns an id.
    pub async fn create_post(&self, draft: PostDraft) -> Outcome<PostId> {
        let draft = match self.validate_draft(draft) {
            Ok(d) => d,
            Err(e) => return self.reject(e),
        };
        match self.transport.create_post(&draft).await {
            Ok(record) => {
                let post = Post::from_record(record);
                let id = post.id;
                self.state.prepend_post(post);
                info!(post_id = %id, "post created");
                self.notifier.notify("Post created", NoticeKind::Success);
                Outcome::Confirmed(id)
            }
            Err(e) => self.failed("Could not create post", e),
        }
    }

    /// Fetch the full list and replace the feed with it, newest first.
    pub async fn refresh(&self) -> Outcome<usize> {
        match self.transport.list_posts().await {
            Ok(records) => {
                // The server lists oldest first; the feed shows newest first.
                let posts: Vec<Post> = records.into_iter().rev().map(Post::from_record).collect();
                let count = posts.len();
                self.state.load(posts);
                debug!(count, "feed refreshed");
                Outcome::Confirmed(count)
            }
            Err(e) => self.failed("Could not load posts", e),
        }
    }

    /// Replace one post's comment forest with the server's. `viewer`, when
    /// known, lets the server mark that user's reactions.
    pub async fn load_comments(&self, post_id: PostId, viewer: Option<UserId>) -> Outcome<usize> {
        if !self.state.contains_post(post_id) {
            return self.stale(FeedError::PostNotFound(post_id));
        }
        match self.transport.list_comments(post_id, viewer).await {
            Ok(records) => {
                let tree = CommentTree::from_records(post_id, records);
                match self.state.replace_comments(post_id, tree) {
                    Ok(count) => Outcome::Confirmed(count),
                    Err(e) => self.stale(e),
                }
            }
            Err(e) => self.failed("Could not load comments", e),
        }
    }

    pub async fn load_identity(&self, session: &Session) -> Outcome<CurrentUser> {
        match self.transport.current_user().await {
            Ok(user) => {
                debug!(user_id = %user.id, "identity loaded");
                session.set(user.clone());
                Outcome::Confirmed(user)
            }
            Err(e) => {
                let err = FeedError::from(e);
                if matches!(err, FeedError::AuthorizationFailure(_)) {
                    session.clear();
                }
                self.notifier
                    .notify(&format!("Could not load your profile: {}", err), NoticeKind::Error);
                Outcome::Failed(err)
            }
        }
    }

    // ── Validation ──────────────────────────────────────────────────

    fn validate_content<'a>(&self, content: &'a str, what: &str) -> Result<&'a str, FeedError> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(FeedError::ValidationFailure(format!("{} cannot be empty", what)));
        }
        if trimmed.chars().count() > self.options.max_content_len {
            return Err(FeedError::ValidationFailure(format!(
                "{} is longer than {} characters",
                what, self.options.max_content_len
            )));
        }
        Ok(trimmed)
    }

    fn validate_draft(&self, mut draft: PostDraft) -> Result<PostDraft, FeedError> {
        draft.title = draft.title.trim().to_string();
        if draft.title.is_empty() {
            return Err(FeedError::ValidationFailure("Title cannot be empty".into()));
        }
        draft.content = self.validate_content(&draft.content, "Post")?.to_string();
        draft.department = draft.department.trim().to_string();
        if draft.department.is_empty() {
            return Err(FeedError::ValidationFailure("Department cannot be empty".into()));
        }
        draft.tags = draft
            .tags
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        Ok(draft)
    }

    // ── Failure reporting ───────────────────────────────────────────

    fn reject<T>(&self, err: FeedError) -> Outcome<T> {
        debug!(error = %err, "rejected before sending");
        self.notifier.notify(&err.to_string(), NoticeKind::Error);
        Outcome::Failed(err)
    }

    fn failed<T>(&self, what: &str, e: TransportError) -> Outcome<T> {
        let err = FeedError::from(e);
        warn!(error = %err, "{}", what);
        self.notifier
            .notify(&format!("{}: {}", what, err), NoticeKind::Error);
        Outcome::Failed(err)
    }

    /// A reply aimed at a parent that is not in the tree is a caller bug;
    /// strict mode makes it loud.
    fn stale_parent<T>(&self, err: FeedError) -> Outcome<T> {
        if self.options.strict {
            if let FeedError::NodeNotFound { .. } = err {
                panic!("reply parent missing: {}", err);
            }
        }
        self.stale(err)
    }

    /// A stale local reference: no-op plus a soft notice.
    fn stale<T>(&self, err: FeedError) -> Outcome<T> {
        debug!(error = %err, "stale reference");
        self.notifier.notify(&err.to_string(), err.notice_kind());
        Outcome::Failed(err)
    }
}
