//! The single mutable resource: the ordered post list.
//!
//! Every local mutation is synchronous and completes under one write lock,
//! so no half-applied state is ever observable. Subscribers are notified
//! after the lock is released.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard};

use tracing::debug;

use crate::error::FeedError;
use crate::model::{CommentId, Post, PostId, Target};
use crate::reaction::{ReactionAggregate, ReactionSnapshot};
use crate::tree::{CommentNode, CommentTree};

/// Callback type for feed change notifications.
pub type ChangeHandler = Arc<dyn Fn(&FeedChange) + Send + Sync>;

/// Unique identifier for a change subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// What changed, delivered to subscribers after each applied mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedChange {
    PostsLoaded { count: usize },
    PostCreated(PostId),
    PostRemoved { post_id: PostId, index: usize },
    PostRestored { post_id: PostId, index: usize },
    ReactionsChanged(Target),
    CommentInserted {
        post_id: PostId,
        parent: Option<CommentId>,
        comment_id: CommentId,
    },
    CommentsLoaded { post_id: PostId, count: usize },
}

#[derive(Clone)]
struct HandlerEntry {
    id: SubscriptionId,
    handler: ChangeHandler,
}

pub struct FeedState {
    /// Newest first.
    posts: RwLock<Vec<Post>>,
    handlers: RwLock<Vec<HandlerEntry>>,
    next_id: AtomicU64,
}

impl FeedState {
    pub fn new() -> Self {
        Self {
            posts: RwLock::new(Vec::new()),
            handlers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    // ── Read model ──────────────────────────────────────────────────

    pub fn posts(&self) -> Vec<Post> {
        self.read().clone()
    }

    pub fn post(&self, id: PostId) -> Option<Post> {
        self.read().iter().find(|p| p.id == id).cloned()
    }

    pub fn index_of(&self, id: PostId) -> Option<usize> {
        self.read().iter().position(|p| p.id == id)
    }

    pub fn contains_post(&self, id: PostId) -> bool {
        self.index_of(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn reactions(&self, target: Target) -> Option<ReactionAggregate> {
        let posts = self.read();
        match target {
            Target::Post(id) => posts.iter().find(|p| p.id == id).map(|p| p.reactions.clone()),
            Target::Comment(id) => posts
                .iter()
                .find_map(|p| p.comments.find_node(id))
                .map(|n| n.reactions.clone()),
        }
    }

    pub fn comment_tree(&self, post_id: PostId) -> Option<CommentTree> {
        self.read()
            .iter()
            .find(|p| p.id == post_id)
            .map(|p| p.comments.clone())
    }

    /// The post whose tree holds `comment_id`.
    pub fn owner_of(&self, comment_id: CommentId) -> Option<PostId> {
        self.read()
            .iter()
            .find(|p| p.comments.contains(comment_id))
            .map(|p| p.id)
    }

    // ── Local mutations ─────────────────────────────────────────────

    /// Replace the whole collection.
    pub fn load(&self, posts: Vec<Post>) {
        let count = posts.len();
        self.mutate(|all| {
            *all = posts;
            ((), Some(FeedChange::PostsLoaded { count }))
        })
    }

    /// Toggle `emoji` in place on the target's aggregate.
    pub fn toggle_reaction(&self, target: Target, emoji: &str) -> Result<ReactionSnapshot, FeedError> {
        self.mutate(|posts| match aggregate_mut(posts, target) {
            Some(aggregate) => {
                let snapshot = aggregate.toggle(emoji);
                (Ok(snapshot), Some(FeedChange::ReactionsChanged(target)))
            }
            None => (Err(missing(target)), None),
        })
    }

    /// Put one emoji back the way it was. Returns `false` when the target
    /// has left the feed in the meantime; nothing is touched then.
    pub fn restore_reaction(&self, target: Target, snapshot: &ReactionSnapshot) -> bool {
        self.mutate(|posts| match aggregate_mut(posts, target) {
            Some(aggregate) => {
                aggregate.restore(snapshot);
                (true, Some(FeedChange::ReactionsChanged(target)))
            }
            None => (false, None),
        })
    }

    /// Remove a post, returning where it was and its full value.
    pub fn remove_post(&self, id: PostId) -> Result<(usize, Post), FeedError> {
        self.mutate(|posts| match posts.iter().position(|p| p.id == id) {
            Some(index) => {
                let post = posts.remove(index);
                (
                    Ok((index, post)),
                    Some(FeedChange::PostRemoved { post_id: id, index }),
                )
            }
            None => (Err(FeedError::PostNotFound(id)), None),
        })
    }

    /// Put a removed post back at `index`, clamped to the current length.
    /// If the post already reappeared (e.g. via a reload) it is left alone.
    pub fn reinsert_post(&self, index: usize, post: Post) -> usize {
        self.mutate(|posts| {
            if let Some(existing) = posts.iter().position(|p| p.id == post.id) {
                debug!(post_id = %post.id, "post already present, skipping reinsert");
                return (existing, None);
            }
            let index = index.min(posts.len());
            let post_id = post.id;
            posts.insert(index, post);
            (index, Some(FeedChange::PostRestored { post_id, index }))
        })
    }

    /// Insert a server-confirmed post at the front.
    pub fn prepend_post(&self, post: Post) {
        self.mutate(|posts| {
            let post_id = post.id;
            posts.retain(|p| p.id != post_id);
            posts.insert(0, post);
            ((), Some(FeedChange::PostCreated(post_id)))
        })
    }

    /// Attach a server-confirmed comment. Returns `false` if the comment
    /// was already in the tree.
    pub fn insert_comment(
        &self,
        post_id: PostId,
        parent: Option<CommentId>,
        node: CommentNode,
    ) -> Result<bool, FeedError> {
        self.mutate(|posts| {
            let Some(post) = posts.iter_mut().find(|p| p.id == post_id) else {
                return (Err(FeedError::PostNotFound(post_id)), None);
            };
            let comment_id = node.id;
            if post.comments.contains(comment_id) {
                return (Ok(false), None);
            }
            if let Err(e) = post.comments.insert_reply(parent, node) {
                return (Err(e), None);
            }
            post.comment_count += 1;
            (
                Ok(true),
                Some(FeedChange::CommentInserted {
                    post_id,
                    parent,
                    comment_id,
                }),
            )
        })
    }

    /// Swap in a freshly fetched comment forest.
    pub fn replace_comments(&self, post_id: PostId, tree: CommentTree) -> Result<usize, FeedError> {
        self.mutate(|posts| {
            let Some(post) = posts.iter_mut().find(|p| p.id == post_id) else {
                return (Err(FeedError::PostNotFound(post_id)), None);
            };
            let count = tree.len();
            post.comments = tree;
            post.comment_count = count;
            (Ok(count), Some(FeedChange::CommentsLoaded { post_id, count }))
        })
    }

    // ── Subscriptions ───────────────────────────────────────────────

    /// The handler runs synchronously on the mutating call site, after the
    /// state lock is released. It may read the state but must not mutate it.
    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&FeedChange) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.push(HandlerEntry {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.retain(|entry| entry.id != id);
    }

    // ── Internals ───────────────────────────────────────────────────

    fn read(&self) -> RwLockReadGuard<'_, Vec<Post>> {
        self.posts.read().unwrap_or_else(|e| e.into_inner())
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Post>) -> (R, Option<FeedChange>)) -> R {
        let (result, change) = {
            let mut posts = self.posts.write().unwrap_or_else(|e| e.into_inner());
            f(&mut posts)
        };
        if let Some(change) = change {
            debug!(change = ?change, "feed changed");
            self.emit(&change);
        }
        result
    }

    fn emit(&self, change: &FeedChange) {
        let entries: Vec<HandlerEntry> = self
            .handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for entry in entries {
            (entry.handler)(change);
        }
    }
}

impl Default for FeedState {
    fn default() -> Self {
        Self::new()
    }
}

fn aggregate_mut(posts: &mut [Post], target: Target) -> Option<&mut ReactionAggregate> {
    match target {
        Target::Post(id) => posts.iter_mut().find(|p| p.id == id).map(|p| &mut p.reactions),
        Target::Comment(id) => posts
            .iter_mut()
            .find_map(|p| p.comments.find_node_mut(id))
            .map(|n| &mut n.reactions),
    }
}

fn missing(target: Target) -> FeedError {
    match target {
        Target::Post(id) => FeedError::PostNotFound(id),
        Target::Comment(comment_id) => FeedError::NodeNotFound {
            post_id: None,
            comment_id,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CommentRecord, PostRecord};
    use std::sync::Mutex;

    fn post(id: u64) -> Post {
        Post::from_record(PostRecord {
            id: PostId(id),
            title: format!("post {}", id),
            comments: Some(vec![CommentRecord {
                id: CommentId(id * 100),
                content: "root".into(),
                ..Default::default()
            }]),
            ..Default::default()
        })
    }

    fn node(id: u64) -> CommentNode {
        CommentNode::from_record(
            PostId(0),
            None,
            CommentRecord {
                id: CommentId(id),
                content: "reply".into(),
                ..Default::default()
            },
        )
    }

    fn ids(state: &FeedState) -> Vec<u64> {
        state.posts().iter().map(|p| p.id.0).collect()
    }

    // ========================================================================
    // Posts
    // ========================================================================

    #[test]
    fn remove_and_reinsert_at_index() {
        let state = FeedState::new();
        state.load(vec![post(3), post(2), post(1)]);

        let (index, removed) = state.remove_post(PostId(2)).unwrap();
        assert_eq!(index, 1);
        assert_eq!(ids(&state), vec![3, 1]);

        assert_eq!(state.reinsert_post(index, removed), 1);
        assert_eq!(ids(&state), vec![3, 2, 1]);
    }

    #[test]
    fn reinsert_clamps_and_skips_duplicates() {
        let state = FeedState::new();
        state.load(vec![post(3), post(2), post(1)]);
        let (_, removed) = state.remove_post(PostId(1)).unwrap();
        state.remove_post(PostId(2)).unwrap();

        assert_eq!(state.reinsert_post(2, removed.clone()), 1);
        assert_eq!(ids(&state), vec![3, 1]);

        assert_eq!(state.reinsert_post(0, removed), 1);
        assert_eq!(ids(&state), vec![3, 1]);
    }

    #[test]
    fn remove_missing_post() {
        let state = FeedState::new();
        assert_eq!(
            state.remove_post(PostId(9)).unwrap_err(),
            FeedError::PostNotFound(PostId(9))
        );
    }

    #[test]
    fn prepend_puts_newest_first() {
        let state = FeedState::new();
        state.load(vec![post(1)]);
        state.prepend_post(post(2));
        assert_eq!(ids(&state), vec![2, 1]);
    }

    // ========================================================================
    // Reactions
    // ========================================================================

    #[test]
    fn toggle_on_comment_mutates_in_place() {
        let state = FeedState::new();
        state.load(vec![post(1)]);
        let target = Target::Comment(CommentId(100));

        let snapshot = state.toggle_reaction(target, "🔥").unwrap();
        assert_eq!(state.reactions(target).unwrap().get("🔥").unwrap().count, 1);

        assert!(state.restore_reaction(target, &snapshot));
        assert!(state.reactions(target).unwrap().is_empty());
    }

    #[test]
    fn toggle_on_missing_target() {
        let state = FeedState::new();
        assert!(matches!(
            state.toggle_reaction(Target::Post(PostId(1)), "👍"),
            Err(FeedError::PostNotFound(_))
        ));
        assert!(matches!(
            state.toggle_reaction(Target::Comment(CommentId(1)), "👍"),
            Err(FeedError::NodeNotFound { post_id: None, .. })
        ));
    }

    #[test]
    fn restore_after_removal_is_noop() {
        let state = FeedState::new();
        state.load(vec![post(1)]);
        let target = Target::Post(PostId(1));
        let snapshot = state.toggle_reaction(target, "👍").unwrap();
        state.remove_post(PostId(1)).unwrap();

        assert!(!state.restore_reaction(target, &snapshot));
        assert!(state.is_empty());
    }

    // ========================================================================
    // Comments
    // ========================================================================

    #[test]
    fn insert_comment_bumps_count_once() {
        let state = FeedState::new();
        state.load(vec![post(1)]);

        assert!(state.insert_comment(PostId(1), Some(CommentId(100)), node(5)).unwrap());
        assert!(!state.insert_comment(PostId(1), Some(CommentId(100)), node(5)).unwrap());

        let p = state.post(PostId(1)).unwrap();
        assert_eq!(p.comment_count, 2);
        assert_eq!(p.comments.depth_of(CommentId(5)), Some(1));
        assert_eq!(state.owner_of(CommentId(5)), Some(PostId(1)));
    }

    #[test]
    fn insert_comment_under_missing_parent() {
        let state = FeedState::new();
        state.load(vec![post(1)]);
        let err = state
            .insert_comment(PostId(1), Some(CommentId(77)), node(5))
            .unwrap_err();
        assert_eq!(err.error_code(), "NODE_NOT_FOUND");
        assert_eq!(state.post(PostId(1)).unwrap().comment_count, 1);
    }

    #[test]
    fn replace_comments_resets_count() {
        let state = FeedState::new();
        state.load(vec![post(1)]);
        let count = state
            .replace_comments(PostId(1), CommentTree::new(PostId(1)))
            .unwrap();
        assert_eq!(count, 0);
        assert_eq!(state.post(PostId(1)).unwrap().comment_count, 0);
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    #[test]
    fn subscribers_see_changes_until_unsubscribed() {
        let state = FeedState::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        let id = state.subscribe(move |change| seen2.lock().unwrap().push(change.clone()));

        state.load(vec![post(1)]);
        state.remove_post(PostId(1)).unwrap();
        state.unsubscribe(id);
        state.prepend_post(post(2));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                FeedChange::PostsLoaded { count: 1 },
                FeedChange::PostRemoved {
                    post_id: PostId(1),
                    index: 0
                },
            ]
        );
    }

    #[test]
    fn handler_can_read_state() {
        let state = Arc::new(FeedState::new());
        let observed = Arc::new(Mutex::new(0));
        let (s, o) = (state.clone(), observed.clone());
        state.subscribe(move |_| *o.lock().unwrap() = s.len());

        state.load(vec![post(1), post(2)]);
        assert_eq!(*observed.lock().unwrap(), 2);
    }

    #[test]
    fn failed_mutations_do_not_notify() {
        let state = FeedState::new();
        let hits = Arc::new(AtomicU64::new(0));
        let h = hits.clone();
        state.subscribe(move |_| {
            h.fetch_add(1, Ordering::Relaxed);
        });

        let _ = state.remove_post(PostId(1));
        let _ = state.toggle_reaction(Target::Post(PostId(1)), "👍");
        assert_eq!(hits.load(Ordering::Relaxed), 0);
    }
}
