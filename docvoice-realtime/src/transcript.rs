//! The running call transcript.

use docvoice_core::{Message, Role};
use std::sync::Arc;

/// Ordered conversation with at most one open (streaming) entry per role.
///
/// All mutation goes through these methods; readers get snapshots.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    fn open_index(&self, role: Role) -> Option<usize> {
        self.messages.iter().rposition(|m| m.role == role && m.is_streaming)
    }

    /// Append a message. An open entry of the same role is finalized first
    /// if the new one is itself open.
    pub fn append(&mut self, message: Message) -> String {
        if message.is_streaming {
            self.finalize_role(message.role);
        }
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Extend the open entry for `role`, or open a new one.
    pub fn append_delta(&mut self, role: Role, text: &str) {
        match self.open_index(role) {
            Some(index) => self.messages[index].text.push_str(text),
            None => self.messages.push(Message::streaming(role, text)),
        }
    }

    /// Close the open entry for `role`. Returns whether one was open.
    pub fn finalize_role(&mut self, role: Role) -> bool {
        match self.open_index(role) {
            Some(index) => {
                self.messages[index].is_streaming = false;
                true
            }
            None => false,
        }
    }

    pub fn finalize_all(&mut self) {
        for message in self.messages.iter_mut().filter(|m| m.is_streaming) {
            message.is_streaming = false;
        }
    }

    /// Replace the open entry's text for `role` and close it, or append a
    /// closed entry when none is open.
    pub fn finish_with(&mut self, role: Role, text: impl Into<String>) {
        let text = text.into();
        match self.open_index(role) {
            Some(index) => {
                let message = &mut self.messages[index];
                message.text = text;
                message.is_streaming = false;
            }
            None => self.messages.push(Message::new(role, text)),
        }
    }

    #[cfg(test)]
    fn open_text(&self, role: Role) -> Option<&str> {
        self.open_index(role).map(|i| self.messages[i].text.as_str())
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Finalized entries only, for seeding a model request.
    pub fn history(&self) -> Vec<Message> {
        self.messages.iter().filter(|m| !m.is_streaming).cloned().collect()
    }

    pub fn snapshot(&self) -> Arc<Vec<Message>> {
        Arc::new(self.messages.clone())
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_deltas_merge_per_role() {
        let mut t = Transcript::new();
        t.append_delta(Role::User, "I need ");
        t.append_delta(Role::Model, "Sure");
        t.append_delta(Role::User, "a dentist");
        assert_eq!(t.len(), 2);
        assert_eq!(t.open_text(Role::User), Some("I need a dentist"));
        assert_eq!(t.open_text(Role::Model), Some("Sure"));
    }

    #[test]
    fn test_finalize_role_leaves_other_role_open() {
        let mut t = Transcript::new();
        t.append_delta(Role::User, "hello");
        t.append_delta(Role::Model, "hi");
        assert!(t.finalize_role(Role::Model));
        assert!(!t.finalize_role(Role::Model));
        assert_eq!(t.open_text(Role::User), Some("hello"));

        t.append_delta(Role::Model, "again");
        assert_eq!(t.len(), 3);
    }

    #[test]
    fn test_append_open_finalizes_previous_of_same_role() {
        let mut t = Transcript::new();
        t.append(Message::streaming(Role::Model, "first"));
        t.append(Message::streaming(Role::Model, ""));
        let open: Vec<_> = t.messages().iter().filter(|m| m.is_streaming).collect();
        assert_eq!(open.len(), 1);
        assert!(open[0].text.is_empty());
    }

    #[test]
    fn test_finish_with_replaces_open_text() {
        let mut t = Transcript::new();
        t.append(Message::streaming(Role::Model, "Dr. Ra"));
        t.finish_with(Role::Model, "Sorry, I encountered an error.");
        assert_eq!(t.messages()[0].text, "Sorry, I encountered an error.");
        assert!(!t.messages()[0].is_streaming);

        t.finish_with(Role::Model, "standalone");
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn test_history_skips_open_entries() {
        let mut t = Transcript::new();
        t.append(Message::user("cardiologist in Pune"));
        t.append(Message::streaming(Role::Model, ""));
        assert_eq!(t.history().len(), 1);
    }

    proptest! {
        #[test]
        fn prop_deltas_concatenate_in_order(parts in proptest::collection::vec(".{0,12}", 1..30)) {
            let mut t = Transcript::new();
            for part in &parts {
                t.append_delta(Role::Model, part);
                prop_assert!(t.messages().last().unwrap().is_streaming);
            }
            t.finalize_role(Role::Model);
            prop_assert_eq!(t.len(), 1);
            prop_assert_eq!(&t.messages()[0].text, &parts.concat());
            prop_assert!(!t.messages()[0].is_streaming);
        }
    }
}
