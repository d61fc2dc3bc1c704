use std::sync::Arc;

use crate::controller::{FeedOptions, OptimisticController, Outcome};
use crate::model::{CommentId, CurrentUser, Post, PostDraft, PostId, PostRecord, Target};
use crate::mutation::MutationKey;
use crate::notify::Notifier;
use crate::reaction::ReactionAggregate;
use crate::session::Session;
use crate::state::{FeedChange, FeedState, SubscriptionId};
use crate::transport::Transport;
use crate::tree::{CommentNode, CommentTree};

/// The feed as the view sees it.
///
/// Reads return owned copies of the current state. Mutations dispatch to
/// the [`OptimisticController`] and report through an [`Outcome`].
///
/// # Examples
///
/// ```ignore
/// let feed = FeedStateStore::new(Arc::new(http), Arc::new(TracingNotifier));
/// feed.refresh().await;
///
/// feed.subscribe(|change| println!("{:?}", change));
///
/// let outcome = feed.react(Target::Comment(CommentId(123)), "👍").await;
/// let tree = feed.comment_tree(PostId(1)).unwrap();
/// for (depth, node) in tree.walk() {
///     println!("{}{}", "  ".repeat(depth), node.content);
/// }
/// ```
pub struct FeedStateStore {
    state: Arc<FeedState>,
    controller: OptimisticController,
    session: Arc<Session>,
}

impl FeedStateStore {
    pub fn new(transport: Arc<dyn Transport>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_options(transport, notifier, FeedOptions::default())
    }

    pub fn with_options(
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        options: FeedOptions,
    ) -> Self {
        let state = Arc::new(FeedState::new());
        Self {
            controller: OptimisticController::new(state.clone(), transport, notifier, options),
            state,
            session: Arc::new(Session::new()),
        }
    }

    /// Share an identity accessor owned elsewhere.
    pub fn with_session(mut self, session: Arc<Session>) -> Self {
        self.session = session;
        self
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn options(&self) -> &FeedOptions {
        self.controller.options()
    }

    // ====================================================================
    // Mutations
    // ====================================================================

    /// Replace the whole feed with a server listing, in the order given.
    pub fn load_posts(&self, records: Vec<PostRecord>) {
        self.state
            .load(records.into_iter().map(Post::from_record).collect());
    }

    pub async fn react(&self, target: Target, emoji: &str) -> Outcome<()> {
        self.controller.apply_reaction_toggle(target, emoji).await
    }

    pub async fn delete_post(&self, post_id: PostId) -> Outcome<()> {
        self.controller.apply_post_deletion(post_id).await
    }

    /// `parent == None` adds a top-level comment. The signed-in user, if
    /// any, is sent as the author.
    pub async fn insert_reply(
        &self,
        post_id: PostId,
        parent: Option<CommentId>,
        content: &str,
    ) -> Outcome<CommentNode> {
        self.controller
            .submit_reply(post_id, parent, content, self.session.user_id())
            .await
    }

    pub async fn create_post(&self, draft: PostDraft) -> Outcome<PostId> {
        self.controller.create_post(draft).await
    }

    pub async fn load_comments(&self, post_id: PostId) -> Outcome<usize> {
        self.controller
            .load_comments(post_id, self.session.user_id())
            .await
    }

    pub async fn refresh(&self) -> Outcome<usize> {
        self.controller.refresh().await
    }

    pub async fn load_identity(&self) -> Outcome<CurrentUser> {
        self.controller.load_identity(&self.session).await
    }

    // ====================================================================
    // Read model
    // ====================================================================

    /// Newest first.
    pub fn posts(&self) -> Vec<Post> {
        self.state.posts()
    }

    pub fn post(&self, post_id: PostId) -> Option<Post> {
        self.state.post(post_id)
    }

    pub fn reactions(&self, target: Target) -> Option<ReactionAggregate> {
        self.state.reactions(target)
    }

    pub fn comment_tree(&self, post_id: PostId) -> Option<CommentTree> {
        self.state.comment_tree(post_id)
    }

    /// Only the author may delete a post.
    pub fn can_delete(&self, post_id: PostId) -> bool {
        match (self.session.user_id(), self.state.post(post_id)) {
            (Some(me), Some(post)) => post.is_authored_by(me),
            _ => false,
        }
    }

    /// Whether an operation on `key` is waiting for the server.
    pub fn is_pending(&self, key: &MutationKey) -> bool {
        self.controller.is_pending(key)
    }

    // ====================================================================
    // Subscriptions
    // ====================================================================

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&FeedChange) + Send + Sync + 'static,
    {
        self.state.subscribe(handler)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.state.unsubscribe(id)
    }
}
