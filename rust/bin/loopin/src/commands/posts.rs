//! Feed listing, post detail, creation and deletion.

use std::path::Path;

use anyhow::Result;
use loopin_feed::{FeedStateStore, Post, PostDraft, PostId, PostKind, ReactionAggregate};

use super::{connect, finish};

pub async fn list(config_path: &Path, server: Option<&str>, limit: Option<usize>) -> Result<()> {
    let feed = connect(config_path, server)?;
    finish(feed.refresh().await)?;

    let posts = feed.posts();
    if posts.is_empty() {
        println!("No posts yet.");
        return Ok(());
    }
    for post in posts.iter().take(limit.unwrap_or(usize::MAX)) {
        print_summary(post);
    }
    Ok(())
}

pub async fn show(config_path: &Path, server: Option<&str>, post_id: u64) -> Result<()> {
    let feed = connect(config_path, server)?;
    let post_id = PostId(post_id);
    let post = load_post(&feed, post_id).await?;
    finish(feed.load_comments(post_id).await)?;

    print_summary(&post);
    println!();
    println!("{}", post.content);

    let Some(tree) = feed.comment_tree(post_id) else {
        return Ok(());
    };
    if tree.is_empty() {
        return Ok(());
    }
    println!();
    for (depth, node) in tree.walk() {
        let author = node
            .author
            .as_ref()
            .map(|a| a.display_name())
            .unwrap_or_else(|| loopin_feed::model::ANONYMOUS_NAME.to_string());
        println!(
            "{}└ #{} {}: {}{}",
            "  ".repeat(depth),
            node.id,
            author,
            node.content,
            reactions_suffix(&node.reactions)
        );
    }
    Ok(())
}

pub struct NewPost {
    pub title: String,
    pub content: String,
    pub department: String,
    pub kind: PostKind,
    pub tags: Option<String>,
}

pub async fn create(config_path: &Path, server: Option<&str>, new: NewPost) -> Result<()> {
    let feed = connect(config_path, server)?;
    let draft = PostDraft {
        title: new.title,
        content: new.content,
        department: new.department,
        kind: new.kind,
        tags: new.tags,
    };
    let id = finish(feed.create_post(draft).await)?;
    println!("Created post #{}.", id);
    Ok(())
}

pub async fn delete(config_path: &Path, server: Option<&str>, post_id: u64) -> Result<()> {
    let feed = connect(config_path, server)?;
    let post_id = PostId(post_id);
    load_post(&feed, post_id).await?;
    finish(feed.delete_post(post_id).await)
}

/// Refresh the feed and make sure `post_id` is in it.
pub(super) async fn load_post(feed: &FeedStateStore, post_id: PostId) -> Result<Post> {
    finish(feed.refresh().await)?;
    feed.post(post_id)
        .ok_or_else(|| anyhow::anyhow!("Post #{} not found.", post_id))
}

fn print_summary(post: &Post) {
    let tags = post.tag_list();
    let tags = if tags.is_empty() {
        String::new()
    } else {
        format!(" #{}", tags.join(" #"))
    };
    println!(
        "#{} [{}] {} · {} · {} comment(s){}{}",
        post.id,
        post.department,
        post.title,
        post.author_name(),
        post.comment_count,
        tags,
        reactions_suffix(&post.reactions)
    );
}

pub(super) fn reactions_suffix(reactions: &ReactionAggregate) -> String {
    if reactions.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = reactions
        .iter()
        .map(|(emoji, c)| {
            if c.user_reacted {
                format!("{}{}*", emoji, c.count)
            } else {
                format!("{}{}", emoji, c.count)
            }
        })
        .collect();
    format!("  [{}]", parts.join(" "))
}
