//! The session map shared by the in-memory and file stores.

use chrono::{DateTime, Utc};
use ronnyx_core::message::Message;
use ronnyx_core::session::{SessionId, SessionSummary};
use std::collections::HashMap;

struct SessionEntry {
    messages: Vec<Message>,
    updated_at: DateTime<Utc>,
    /// Logical clock value of the last append; orders eviction.
    touched: u64,
}

/// Sessions keyed by id, with an optional cap that evicts the least
/// recently updated session.
pub(crate) struct SessionTable {
    sessions: HashMap<SessionId, SessionEntry>,
    clock: u64,
    max_sessions: usize,
}

impl SessionTable {
    pub(crate) fn new(max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            clock: 0,
            max_sessions,
        }
    }

    pub(crate) fn get(&self, id: &SessionId) -> Option<&[Message]> {
        self.sessions.get(id).map(|s| s.messages.as_slice())
    }

    /// Append a batch, creating the session if needed. Returns the sessions
    /// evicted to respect the cap.
    pub(crate) fn append(&mut self, id: &SessionId, messages: Vec<Message>) -> Vec<SessionId> {
        if messages.is_empty() {
            return Vec::new();
        }
        self.clock += 1;
        let touched = self.clock;

        let entry = self
            .sessions
            .entry(id.clone())
            .or_insert_with(|| SessionEntry {
                messages: Vec::new(),
                updated_at: Utc::now(),
                touched,
            });
        entry.messages.extend(messages);
        entry.updated_at = Utc::now();
        entry.touched = touched;

        self.evict_over_cap(id)
    }

    fn evict_over_cap(&mut self, keep: &SessionId) -> Vec<SessionId> {
        let mut evicted = Vec::new();
        if self.max_sessions == 0 {
            return evicted;
        }
        while self.sessions.len() > self.max_sessions {
            let oldest = self
                .sessions
                .iter()
                .filter(|(id, _)| *id != keep)
                .min_by_key(|(_, s)| s.touched)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    self.sessions.remove(&id);
                    evicted.push(id);
                }
                None => break,
            }
        }
        evicted
    }

    pub(crate) fn remove(&mut self, id: &SessionId) -> bool {
        self.sessions.remove(id).is_some()
    }

    /// Summaries, most recently updated first.
    pub(crate) fn summaries(&self) -> Vec<SessionSummary> {
        let mut entries: Vec<_> = self.sessions.iter().collect();
        entries.sort_by(|a, b| b.1.touched.cmp(&a.1.touched));
        entries
            .into_iter()
            .map(|(id, s)| SessionSummary {
                id: id.clone(),
                message_count: s.messages.len(),
                updated_at: s.updated_at,
            })
            .collect()
    }

    /// Sessions with their messages, least recently updated first.
    pub(crate) fn iter_oldest_first(&self) -> impl Iterator<Item = (&SessionId, &[Message])> {
        let mut entries: Vec<_> = self.sessions.iter().collect();
        entries.sort_by_key(|(_, s)| s.touched);
        entries
            .into_iter()
            .map(|(id, s)| (id, s.messages.as_slice()))
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sid(s: &str) -> SessionId {
        SessionId::parse(s).unwrap()
    }

    #[test]
    fn cap_evicts_least_recently_updated() {
        let mut table = SessionTable::new(2);
        table.append(&sid("a"), vec![Message::user("1")]);
        table.append(&sid("b"), vec![Message::user("2")]);
        // Touch "a" again so "b" becomes the oldest.
        table.append(&sid("a"), vec![Message::assistant("3")]);

        let evicted = table.append(&sid("c"), vec![Message::user("4")]);
        assert_eq!(evicted, vec![sid("b")]);
        assert_eq!(table.len(), 2);
        assert!(table.get(&sid("a")).is_some());
        assert!(table.get(&sid("c")).is_some());
    }

    #[test]
    fn empty_batch_creates_nothing() {
        let mut table = SessionTable::new(0);
        table.append(&sid("a"), vec![]);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn summaries_most_recent_first() {
        let mut table = SessionTable::new(0);
        table.append(&sid("old"), vec![Message::user("x")]);
        table.append(&sid("new"), vec![Message::user("y"), Message::assistant("z")]);
        let summaries = table.summaries();
        assert_eq!(summaries[0].id, sid("new"));
        assert_eq!(summaries[0].message_count, 2);
        assert_eq!(summaries[1].id, sid("old"));
    }
}
