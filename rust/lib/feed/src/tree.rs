//! Nested comment forest for a single post.
//!
//! Traversals, copies and teardown are iterative so arbitrarily deep reply
//! chains cannot overflow the stack. Children keep insertion order, which is
//! chronological (earliest first).

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::FeedError;
use crate::model::{Author, CommentId, CommentRecord, PostId, UserId};
use crate::reaction::ReactionAggregate;

/// One comment and its replies.
///
/// `Clone`, `PartialEq` and `Drop` are written out by hand so none of them
/// recurse; a reply chain can be as deep as the server sends it.
#[derive(Debug)]
pub struct CommentNode {
    pub id: CommentId,
    pub post_id: PostId,
    /// `None` for a top-level comment.
    pub parent_id: Option<CommentId>,
    pub author_id: Option<UserId>,
    pub author: Option<Author>,
    pub content: String,
    pub created_at: String,
    pub reactions: ReactionAggregate,
    pub replies: Vec<CommentNode>,
}

impl CommentNode {
    /// Convert a server record and its nested replies.
    ///
    /// `post_id` and `parent_id` come from where the record sits, not from
    /// the record's own fields, so the result is always consistent with
    /// its position in the tree.
    pub fn from_record(post_id: PostId, parent_id: Option<CommentId>, mut r: CommentRecord) -> Self {
        let mut seen = HashSet::new();
        seen.insert(r.id);
        let children = std::mem::take(&mut r.replies);
        let replies = hydrate(post_id, Some(r.id), children, &mut seen);
        Self::from_parts(post_id, parent_id, r, replies)
    }

    fn from_parts(
        post_id: PostId,
        parent_id: Option<CommentId>,
        r: CommentRecord,
        replies: Vec<CommentNode>,
    ) -> Self {
        Self {
            id: r.id,
            post_id,
            parent_id,
            author_id: r.author_id.or(r.author.as_ref().map(|a| a.id)),
            reactions: ReactionAggregate::from_records(&r.reactions),
            author: r.author,
            content: r.content,
            created_at: r.created_at,
            replies,
        }
    }

    /// Copy of this node carrying `replies` instead of its own.
    fn with_replies(&self, replies: Vec<CommentNode>) -> Self {
        Self {
            id: self.id,
            post_id: self.post_id,
            parent_id: self.parent_id,
            author_id: self.author_id,
            author: self.author.clone(),
            content: self.content.clone(),
            created_at: self.created_at.clone(),
            reactions: self.reactions.clone(),
            replies,
        }
    }

    fn same_fields(&self, other: &Self) -> bool {
        self.id == other.id
            && self.post_id == other.post_id
            && self.parent_id == other.parent_id
            && self.author_id == other.author_id
            && self.author == other.author
            && self.content == other.content
            && self.created_at == other.created_at
            && self.reactions == other.reactions
            && self.replies.len() == other.replies.len()
    }
}

impl Clone for CommentNode {
    fn clone(&self) -> Self {
        self.with_replies(clone_forest(&self.replies))
    }
}

impl PartialEq for CommentNode {
    fn eq(&self, other: &Self) -> bool {
        let mut stack = vec![(self, other)];
        while let Some((a, b)) = stack.pop() {
            if !a.same_fields(b) {
                return false;
            }
            stack.extend(a.replies.iter().zip(b.replies.iter()));
        }
        true
    }
}

impl Drop for CommentNode {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.replies);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.replies);
        }
    }
}

/// Deep copy of a list of siblings, built bottom-up from an explicit stack.
fn clone_forest(nodes: &[CommentNode]) -> Vec<CommentNode> {
    let mut out = Vec::with_capacity(nodes.len());
    // Each open frame is a source node, the index of its next child and the
    // copies of the children finished so far.
    let mut frames: Vec<(&CommentNode, usize, Vec<CommentNode>)> = Vec::new();
    for root in nodes {
        frames.push((root, 0, Vec::with_capacity(root.replies.len())));
        while let Some(frame) = frames.last_mut() {
            let source = frame.0;
            if let Some(child) = source.replies.get(frame.1) {
                frame.1 += 1;
                frames.push((child, 0, Vec::with_capacity(child.replies.len())));
                continue;
            }
            let Some((source, _, replies)) = frames.pop() else {
                break;
            };
            let copy = source.with_replies(replies);
            match frames.last_mut() {
                Some(parent) => parent.2.push(copy),
                None => out.push(copy),
            }
        }
    }
    out
}

/// Convert sibling records under `parent_id`, depth first without
/// recursion. An id already in `seen` is dropped with a warning.
fn hydrate(
    post_id: PostId,
    parent_id: Option<CommentId>,
    records: Vec<CommentRecord>,
    seen: &mut HashSet<CommentId>,
) -> Vec<CommentNode> {
    struct Frame {
        record: CommentRecord,
        parent_id: Option<CommentId>,
        pending: std::vec::IntoIter<CommentRecord>,
        replies: Vec<CommentNode>,
    }

    let mut out = Vec::with_capacity(records.len());
    let mut frames: Vec<Frame> = Vec::new();
    let mut roots = records.into_iter();
    loop {
        let next = match frames.last_mut() {
            Some(top) => {
                let id = top.record.id;
                top.pending.next().map(|r| (r, Some(id)))
            }
            None => match roots.next() {
                Some(r) => Some((r, parent_id)),
                None => break,
            },
        };
        match next {
            Some((mut record, parent)) => {
                if !seen.insert(record.id) {
                    warn!(post_id = %post_id, comment_id = %record.id, "dropping duplicate comment in server payload");
                    discard(record);
                    continue;
                }
                let children = std::mem::take(&mut record.replies);
                frames.push(Frame {
                    record,
                    parent_id: parent,
                    replies: Vec::with_capacity(children.len()),
                    pending: children.into_iter(),
                });
            }
            None => {
                let Some(frame) = frames.pop() else {
                    continue;
                };
                let node =
                    CommentNode::from_parts(post_id, frame.parent_id, frame.record, frame.replies);
                match frames.last_mut() {
                    Some(parent) => parent.replies.push(node),
                    None => out.push(node),
                }
            }
        }
    }
    out
}

/// Drop a record subtree one level at a time.
fn discard(record: CommentRecord) {
    let mut pending = vec![record];
    while let Some(mut r) = pending.pop() {
        pending.append(&mut r.replies);
    }
}

/// The comment forest rooted at a post.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommentTree {
    post_id: PostId,
    roots: Vec<CommentNode>,
}

impl CommentTree {
    pub fn new(post_id: PostId) -> Self {
        Self {
            post_id,
            roots: Vec::new(),
        }
    }

    /// Hydrate from the server's nested representation. A comment id that
    /// appears more than once keeps only its first occurrence.
    pub fn from_records(post_id: PostId, records: Vec<CommentRecord>) -> Self {
        let roots = hydrate(post_id, None, records, &mut HashSet::new());
        Self { post_id, roots }
    }

    pub fn post_id(&self) -> PostId {
        self.post_id
    }

    /// Top-level comments, earliest first.
    pub fn roots(&self) -> &[CommentNode] {
        &self.roots
    }

    /// Depth-first search across the forest.
    pub fn find_node(&self, id: CommentId) -> Option<&CommentNode> {
        self.walk().map(|(_, node)| node).find(|node| node.id == id)
    }

    pub fn find_node_mut(&mut self, id: CommentId) -> Option<&mut CommentNode> {
        let mut stack: Vec<&mut CommentNode> = self.roots.iter_mut().rev().collect();
        while let Some(node) = stack.pop() {
            if node.id == id {
                return Some(node);
            }
            stack.extend(node.replies.iter_mut().rev());
        }
        None
    }

    pub fn contains(&self, id: CommentId) -> bool {
        self.find_node(id).is_some()
    }

    /// Append `node` under `parent`, or at the top level when `parent` is
    /// `None`. The node's `post_id` and `parent_id` are overwritten to match
    /// where it lands.
    ///
    /// Inserting an id that is already present is a no-op, so a reply that
    /// also arrives through a reload is never attached twice.
    pub fn insert_reply(
        &mut self,
        parent: Option<CommentId>,
        mut node: CommentNode,
    ) -> Result<(), FeedError> {
        if self.contains(node.id) {
            debug!(post_id = %self.post_id, comment_id = %node.id, "comment already present, skipping insert");
            return Ok(());
        }
        node.post_id = self.post_id;
        node.parent_id = parent;
        match parent {
            None => self.roots.push(node),
            Some(parent_id) => {
                let post_id = Some(self.post_id);
                let parent_node = self.find_node_mut(parent_id).ok_or(FeedError::NodeNotFound {
                    post_id,
                    comment_id: parent_id,
                })?;
                parent_node.replies.push(node);
            }
        }
        Ok(())
    }

    /// Number of comment ancestors above `id`. Top-level comments are at
    /// depth 0.
    pub fn depth_of(&self, id: CommentId) -> Option<usize> {
        self.walk().find(|(_, node)| node.id == id).map(|(depth, _)| depth)
    }

    /// Ids from the top-level ancestor down to the direct parent of `id`.
    /// Empty for a top-level comment, `None` if `id` is absent.
    pub fn ancestors(&self, id: CommentId) -> Option<Vec<CommentId>> {
        let mut trail: Vec<CommentId> = Vec::new();
        for (depth, node) in self.walk() {
            trail.truncate(depth);
            if node.id == id {
                return Some(trail);
            }
            trail.push(node.id);
        }
        None
    }

    /// Pre-order traversal yielding `(depth, node)`.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: self.roots.iter().rev().map(|n| (0, n)).collect(),
        }
    }

    /// Every comment id in pre-order.
    pub fn ids(&self) -> Vec<CommentId> {
        self.walk().map(|(_, node)| node.id).collect()
    }

    /// Total number of comments at every depth.
    pub fn len(&self) -> usize {
        self.walk().count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Iterator returned by [`CommentTree::walk`].
pub struct Walk<'a> {
    stack: Vec<(usize, &'a CommentNode)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a CommentNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack
            .extend(node.replies.iter().rev().map(|child| (depth + 1, child)));
        Some((depth, node))
    }
}
