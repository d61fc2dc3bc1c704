//! Loop.in feed engine.
//!
//! Threaded comments and emoji reactions for a campus feed, with
//! optimistic updates that survive network failure.
//!
//! # Layers
//!
//! - [`ReactionAggregate`]: emoji → `{count, user_reacted}` per target,
//!   toggled in place and restored per emoji.
//! - [`CommentTree`]: the reply forest of one post; iterative traversal.
//! - [`OptimisticController`]: predict, send, confirm or roll back.
//! - [`FeedStateStore`]: the post list, the read model and the entry
//!   points the view calls.
//!
//! The REST API sits behind the [`Transport`] trait ([`HttpTransport`]
//! talks to the real server) and user-visible notices go through a
//! [`Notifier`].
//!
//! # Example
//!
//! ```ignore
//! use loopin_feed::{FeedStateStore, HttpTransport, NoAuth, Target, TracingNotifier};
//!
//! let http = HttpTransport::new("http://127.0.0.1:8000", Arc::new(NoAuth));
//! let feed = FeedStateStore::new(Arc::new(http), Arc::new(TracingNotifier));
//!
//! feed.refresh().await;
//! if let Some(post) = feed.posts().first() {
//!     feed.react(Target::Post(post.id), "👍").await;
//! }
//! ```

pub mod client;
pub mod controller;
pub mod error;
pub mod feed;
pub mod model;
pub mod mutation;
pub mod notify;
pub mod reaction;
pub mod session;
pub mod state;
pub mod transport;
pub mod tree;

// Re-export primary types at crate root.
pub use client::{HttpTransport, NoAuth, StaticToken, TokenSource, DEFAULT_BASE_URL};
pub use controller::{FeedOptions, OptimisticController, Outcome};
pub use error::{FeedError, TransportError};
pub use feed::FeedStateStore;
pub use model::{
    Author, CommentId, CommentRecord, CurrentUser, Post, PostDraft, PostId, PostKind, PostRecord,
    ReactionRecord, Target, UserId,
};
pub use mutation::{MutationKey, MutationKind, MutationState};
pub use notify::{NoticeKind, Notifier, TracingNotifier};
pub use reaction::{ReactionAggregate, ReactionCount, ReactionSnapshot};
pub use session::Session;
pub use state::{FeedChange, FeedState, SubscriptionId};
pub use transport::Transport;
pub use tree::{CommentNode, CommentTree};
