//! Replies and reactions.

use std::path::Path;

use anyhow::Result;
use loopin_feed::{CommentId, PostId, Target};
use tracing::debug;

use super::posts::{load_post, reactions_suffix};
use super::{connect, finish};

pub async fn reply(
    config_path: &Path,
    server: Option<&str>,
    post_id: u64,
    parent: Option<u64>,
    content: &str,
) -> Result<()> {
    let feed = connect(config_path, server)?;
    if let Some(err) = feed.load_identity().await.error() {
        debug!(error = %err, "replying without a known author");
    }
    let post_id = PostId(post_id);
    load_post(&feed, post_id).await?;
    if parent.is_some() {
        // Parents are only known once the post's comments are loaded.
        finish(feed.load_comments(post_id).await)?;
    }
    let node = finish(
        feed.insert_reply(post_id, parent.map(CommentId), content)
            .await,
    )?;
    println!("Replied as #{}.", node.id);
    Ok(())
}

/// Which kind of target `id` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Post,
    Comment,
}

pub async fn react(
    config_path: &Path,
    server: Option<&str>,
    kind: TargetKind,
    id: u64,
    post_id: Option<u64>,
    emoji: &str,
) -> Result<()> {
    let feed = connect(config_path, server)?;
    finish(feed.refresh().await)?;

    let target = match kind {
        TargetKind::Post => Target::Post(PostId(id)),
        TargetKind::Comment => {
            let post_id = post_id
                .ok_or_else(|| anyhow::anyhow!("Reacting to a comment needs --post <id>."))?;
            finish(feed.load_comments(PostId(post_id)).await)?;
            Target::Comment(CommentId(id))
        }
    };

    finish(feed.react(target, emoji).await)?;
    let now = feed.reactions(target).unwrap_or_default();
    println!("Reactions on {}:{}", target, reactions_suffix(&now));
    Ok(())
}
