//! In-process transport whose responses are released by the test.
//!
//! Every transport call is parked on a `oneshot` channel and surfaces as a
//! [`Pending`] from [`Script::next`]. The test decides when, and in which
//! order, each call is answered.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use loopin_feed::{
    CommentId, CommentRecord, CurrentUser, FeedOptions, FeedStateStore, NoticeKind, Notifier,
    PostDraft, PostId, PostRecord, Transport, TransportError, UserId,
};
use loopin_feed::model::ReactionRequest;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListPosts,
    ListComments {
        post_id: PostId,
        viewer: Option<UserId>,
    },
    CreatePost(PostDraft),
    DeletePost(PostId),
    CreateComment {
        post_id: PostId,
        parent: Option<CommentId>,
        content: String,
        author: Option<UserId>,
    },
    ToggleReaction(ReactionRequest),
    CurrentUser,
}

pub enum Reply {
    Ok,
    Posts(Vec<PostRecord>),
    Comments(Vec<CommentRecord>),
    Post(PostRecord),
    Comment(CommentRecord),
    User(CurrentUser),
    Err(TransportError),
}

pub struct Pending {
    pub call: Call,
    reply: oneshot::Sender<Reply>,
}

impl Pending {
    pub fn respond(self, reply: Reply) {
        // The caller may have been dropped; nothing to do then.
        let _ = self.reply.send(reply);
    }

    pub fn ok(self) {
        self.respond(Reply::Ok)
    }

    pub fn fail(self, status: u16) {
        self.respond(Reply::Err(server_error(status)))
    }
}

pub struct Script {
    rx: mpsc::UnboundedReceiver<Pending>,
}

impl Script {
    pub async fn next(&mut self) -> Pending {
        self.rx.recv().await.expect("transport dropped")
    }

    /// No call has been made that the test has not picked up.
    pub fn is_idle(&mut self) -> bool {
        self.rx.try_recv().is_err()
    }
}

pub struct ScriptedTransport {
    tx: mpsc::UnboundedSender<Pending>,
}

pub fn scripted() -> (ScriptedTransport, Script) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ScriptedTransport { tx }, Script { rx })
}

impl ScriptedTransport {
    async fn call(&self, call: Call) -> Result<Reply, TransportError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Pending { call, reply })
            .map_err(|_| TransportError::Network("script closed".into()))?;
        match rx.await {
            Ok(Reply::Err(e)) => Err(e),
            Ok(reply) => Ok(reply),
            Err(_) => Err(TransportError::Network("no reply scripted".into())),
        }
    }
}

fn unexpected() -> TransportError {
    TransportError::Decode("unexpected scripted reply".into())
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn list_posts(&self) -> Result<Vec<PostRecord>, TransportError> {
        match self.call(Call::ListPosts).await? {
            Reply::Posts(p) => Ok(p),
            _ => Err(unexpected()),
        }
    }

    async fn list_comments(
        &self,
        post_id: PostId,
        viewer: Option<UserId>,
    ) -> Result<Vec<CommentRecord>, TransportError> {
        match self.call(Call::ListComments { post_id, viewer }).await? {
            Reply::Comments(c) => Ok(c),
            _ => Err(unexpected()),
        }
    }

    async fn create_post(&self, draft: &PostDraft) -> Result<PostRecord, TransportError> {
        match self.call(Call::CreatePost(draft.clone())).await? {
            Reply::Post(p) => Ok(p),
            _ => Err(unexpected()),
        }
    }

    async fn delete_post(&self, post_id: PostId) -> Result<(), TransportError> {
        match self.call(Call::DeletePost(post_id)).await? {
            Reply::Ok => Ok(()),
            _ => Err(unexpected()),
        }
    }

    async fn create_comment(
        &self,
        post_id: PostId,
        parent: Option<CommentId>,
        content: &str,
        author: Option<UserId>,
    ) -> Result<CommentRecord, TransportError> {
        let call = Call::CreateComment {
            post_id,
            parent,
            content: content.to_string(),
            author,
        };
        match self.call(call).await? {
            Reply::Comment(c) => Ok(c),
            _ => Err(unexpected()),
        }
    }

    async fn toggle_reaction(&self, req: &ReactionRequest) -> Result<(), TransportError> {
        match self.call(Call::ToggleReaction(req.clone())).await? {
            Reply::Ok => Ok(()),
            _ => Err(unexpected()),
        }
    }

    async fn current_user(&self) -> Result<CurrentUser, TransportError> {
        match self.call(Call::CurrentUser).await? {
            Reply::User(u) => Ok(u),
            _ => Err(unexpected()),
        }
    }
}

// ── Notices ─────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(String, NoticeKind)>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<(String, NoticeKind)> {
        self.notices.lock().unwrap().clone()
    }

    pub fn count(&self, kind: NoticeKind) -> usize {
        self.notices().iter().filter(|(_, k)| *k == kind).count()
    }

    pub fn total(&self) -> usize {
        self.notices().len()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        self.notices.lock().unwrap().push((message.to_string(), kind));
    }
}

// ── Fixtures ────────────────────────────────────────────────────────

/// Let every other branch of a `tokio::join!` observe what was just sent.
/// One round may poll this branch first, so yield twice.
pub async fn settle() {
    for _ in 0..2 {
        tokio::task::yield_now().await;
    }
}

pub fn server_error(status: u16) -> TransportError {
    TransportError::Server {
        status,
        message: format!("status {}", status),
    }
}

pub fn lenient() -> FeedOptions {
    FeedOptions {
        strict: false,
        ..FeedOptions::default()
    }
}

pub fn store() -> (FeedStateStore, Script, Arc<RecordingNotifier>) {
    store_with(lenient())
}

pub fn store_with(options: FeedOptions) -> (FeedStateStore, Script, Arc<RecordingNotifier>) {
    let (transport, script) = scripted();
    let notifier = Arc::new(RecordingNotifier::default());
    let feed = FeedStateStore::with_options(Arc::new(transport), notifier.clone(), options);
    (feed, script, notifier)
}

pub fn comment(id: u64, replies: Vec<CommentRecord>) -> CommentRecord {
    CommentRecord {
        id: CommentId(id),
        content: format!("comment {}", id),
        created_at: "2024-03-01T10:00:00".into(),
        replies,
        ..Default::default()
    }
}

pub fn post(id: u64, comments: Vec<CommentRecord>) -> PostRecord {
    PostRecord {
        id: PostId(id),
        title: format!("post {}", id),
        content: "body".into(),
        department: "CSE".into(),
        author_id: Some(UserId(1)),
        comments: Some(comments),
        ..Default::default()
    }
}
