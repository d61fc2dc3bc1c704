use thiserror::Error;

use crate::model::{CommentId, PostId};
use crate::notify::NoticeKind;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. The view matches on these,
// never on the human-readable message string.

pub mod error_code {
    pub const TRANSIENT_NETWORK: &str = "TRANSIENT_NETWORK";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const REJECTED: &str = "REJECTED";
    pub const NODE_NOT_FOUND: &str = "NODE_NOT_FOUND";
    pub const POST_NOT_FOUND: &str = "POST_NOT_FOUND";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const DECODE_FAILED: &str = "DECODE_FAILED";
}

// ── TransportError ──────────────────────────────────────────────────

/// Failure reported by a [`Transport`](crate::transport::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Server { status: u16, message: String },

    /// The request never produced a response (connect, timeout, reset).
    #[error("network: {0}")]
    Network(String),

    #[error("decode: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Server { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Server {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

// ── FeedError ───────────────────────────────────────────────────────

/// Everything that can go wrong behind a feed entry point.
///
/// Transport failures are classified into the first three variants; the
/// rest are local and detected before or after the network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Connectivity problem or server-side 5xx. Worth retrying.
    #[error("network problem, please try again ({0})")]
    TransientNetworkFailure(String),

    /// 401 or 403. Retrying will not help.
    #[error("you are not authorized to do that ({0})")]
    AuthorizationFailure(String),

    /// Any other 4xx.
    #[error("request rejected by server (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// A comment that is not (or no longer) in the feed. `post_id` is the
    /// post that was searched, when known.
    #[error("comment {comment_id} is no longer in the feed")]
    NodeNotFound {
        post_id: Option<PostId>,
        comment_id: CommentId,
    },

    /// Post not in the feed, e.g. deleted by another request.
    #[error("post {0} is no longer in the feed")]
    PostNotFound(PostId),

    /// Input rejected before anything was sent.
    #[error("{0}")]
    ValidationFailure(String),

    #[error("unexpected server response: {0}")]
    Decode(String),
}

impl FeedError {
    pub fn error_code(&self) -> &'static str {
        match self {
            FeedError::TransientNetworkFailure(_) => error_code::TRANSIENT_NETWORK,
            FeedError::AuthorizationFailure(_) => error_code::UNAUTHORIZED,
            FeedError::Rejected { .. } => error_code::REJECTED,
            FeedError::NodeNotFound { .. } => error_code::NODE_NOT_FOUND,
            FeedError::PostNotFound(_) => error_code::POST_NOT_FOUND,
            FeedError::ValidationFailure(_) => error_code::VALIDATION_FAILED,
            FeedError::Decode(_) => error_code::DECODE_FAILED,
        }
    }

    /// Whether the view may offer a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FeedError::TransientNetworkFailure(_))
    }

    /// Stale local references are reported softly; everything else is an
    /// error notice.
    pub fn notice_kind(&self) -> NoticeKind {
        match self {
            FeedError::NodeNotFound { .. } | FeedError::PostNotFound(_) => NoticeKind::Info,
            _ => NoticeKind::Error,
        }
    }
}

impl From<TransportError> for FeedError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Server { status, message } => match status {
                401 | 403 => FeedError::AuthorizationFailure(message),
                500..=599 => FeedError::TransientNetworkFailure(format!("HTTP {}: {}", status, message)),
                _ => FeedError::Rejected { status, message },
            },
            TransportError::Network(msg) => FeedError::TransientNetworkFailure(msg),
            TransportError::Decode(msg) => FeedError::Decode(msg),
        }
    }
}
