pub mod account;
pub mod comments;
pub mod posts;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use loopin_feed::{
    FeedOptions, FeedStateStore, HttpTransport, NoAuth, NoticeKind, Notifier, Outcome, StaticToken,
    TokenSource,
};
use tracing::debug;

use crate::config::ClientConfig;

/// Prints success and info notices. Failures come back through the
/// command's `Result` and are printed once by `main`.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, message: &str, kind: NoticeKind) {
        match kind {
            NoticeKind::Success => println!("{}", message),
            NoticeKind::Info => eprintln!("note: {}", message),
            NoticeKind::Error => debug!(message, "error notice"),
        }
    }
}

/// A stale reply parent typed on the command line is a user error, not a
/// bug, so the CLI never runs the feed in strict mode.
pub fn cli_options() -> FeedOptions {
    FeedOptions {
        strict: false,
        ..FeedOptions::default()
    }
}

/// Build a feed bound to the configured server.
pub fn connect(config_path: &Path, server: Option<&str>) -> Result<FeedStateStore> {
    let config = ClientConfig::load(config_path)?;
    let resolved = config.resolve(server);
    debug!(server = %resolved.server, authed = resolved.token.is_some(), "connecting");

    let tokens: Arc<dyn TokenSource> = match resolved.token {
        Some(token) => Arc::new(StaticToken::new(token)),
        None => Arc::new(NoAuth),
    };
    let transport = HttpTransport::new(resolved.server, tokens);
    Ok(FeedStateStore::with_options(
        Arc::new(transport),
        Arc::new(ConsoleNotifier),
        cli_options(),
    ))
}

/// Turn an outcome into a command result.
pub fn finish<T>(outcome: Outcome<T>) -> Result<T> {
    outcome
        .into_result()
        .map_err(|e| anyhow::anyhow!("{} [{}]", e, e.error_code()))
}
