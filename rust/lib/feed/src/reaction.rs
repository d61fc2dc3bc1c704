use std::collections::BTreeMap;

use crate::model::ReactionRecord;

/// Count and membership for one emoji on one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactionCount {
    pub count: u32,
    /// Whether the current user is one of the `count` reactors.
    pub user_reacted: bool,
}

/// Emoji reactions on a single post or comment.
///
/// Keyed by emoji symbol. An entry is present only while its count is at
/// least 1, so a key never maps to a zero count, and `user_reacted` never
/// outlives the last reaction.
///
/// The aggregate lives inside its owning `Post` or `CommentNode` and is
/// always mutated in place; the owner is never replaced to change it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionAggregate {
    entries: BTreeMap<String, ReactionCount>,
}

/// State of one emoji captured immediately before a toggle.
///
/// Restoring it touches only that emoji, so a rollback never undoes a
/// toggle on a different emoji that landed while the request was in
/// flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionSnapshot {
    emoji: String,
    prior: Option<ReactionCount>,
}

impl ReactionSnapshot {
    pub fn emoji(&self) -> &str {
        &self.emoji
    }

    /// The entry as it was before the toggle, `None` if the key was absent.
    pub fn prior(&self) -> Option<ReactionCount> {
        self.prior
    }
}

impl ReactionAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the server's reaction list. Entries with a zero count are
    /// dropped; duplicate emoji keys keep the last record.
    pub fn from_records(records: &[ReactionRecord]) -> Self {
        let mut entries = BTreeMap::new();
        for r in records {
            if r.count == 0 || r.emoji.is_empty() {
                continue;
            }
            entries.insert(
                r.emoji.clone(),
                ReactionCount {
                    count: r.count,
                    user_reacted: r.user_reacted,
                },
            );
        }
        Self { entries }
    }

    /// Flip the current user's reaction with `emoji`.
    ///
    /// - absent: insert `{count: 1, user_reacted: true}`
    /// - present, reacted: decrement, clear `user_reacted`, prune at zero
    /// - present, not reacted: increment, set `user_reacted`
    ///
    /// Returns the pre-toggle snapshot for [`restore`](Self::restore).
    pub fn toggle(&mut self, emoji: &str) -> ReactionSnapshot {
        let prior = self.entries.get(emoji).copied();
        match prior {
            None => {
                self.entries.insert(
                    emoji.to_string(),
                    ReactionCount {
                        count: 1,
                        user_reacted: true,
                    },
                );
            }
            Some(entry) if entry.user_reacted => {
                let count = entry.count.saturating_sub(1);
                if count == 0 {
                    self.entries.remove(emoji);
                } else {
                    self.entries.insert(
                        emoji.to_string(),
                        ReactionCount {
                            count,
                            user_reacted: false,
                        },
                    );
                }
            }
            Some(entry) => {
                self.entries.insert(
                    emoji.to_string(),
                    ReactionCount {
                        count: entry.count + 1,
                        user_reacted: true,
                    },
                );
            }
        }
        ReactionSnapshot {
            emoji: emoji.to_string(),
            prior,
        }
    }

    /// Put the snapshot's emoji back exactly as it was captured.
    ///
    /// Idempotent: restoring the same snapshot twice is the same as once.
    pub fn restore(&mut self, snapshot: &ReactionSnapshot) {
        match snapshot.prior {
            Some(entry) => {
                self.entries.insert(snapshot.emoji.clone(), entry);
            }
            None => {
                self.entries.remove(&snapshot.emoji);
            }
        }
    }

    pub fn get(&self, emoji: &str) -> Option<ReactionCount> {
        self.entries.get(emoji).copied()
    }

    /// Entries ordered by emoji.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ReactionCount)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.entries.values().map(|e| e.count as u64).sum()
    }

    /// Emojis the current user has reacted with.
    pub fn mine(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.user_reacted)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn to_records(&self) -> Vec<ReactionRecord> {
        self.entries
            .iter()
            .map(|(emoji, e)| ReactionRecord {
                emoji: emoji.clone(),
                count: e.count,
                user_reacted: e.user_reacted,
            })
            .collect()
    }
}
