//! Application state for the conversation list and the messages on
//! screen. Every function here is a pure in-memory update;
//! persistence is layered on top by [`crate::chat::Session`].
use chrono::Utc;

use super::models::{ActiveConversation, Conversation, Message, WELCOME_ID};

#[derive(Clone, Debug)]
pub struct ChatState {
    // Most recent first
    conversations: Vec<Conversation>,
    active: ActiveConversation,
    // The message list as displayed. Mirrored into the active
    // conversation by `sync`.
    live: Vec<Message>,
}

impl ChatState {
    pub fn new() -> Self {
        Self::load(Vec::new(), None)
    }

    /// Restores state from storage. The stored active id wins if it
    /// still exists, then the most recent conversation, then a new
    /// draft.
    pub fn load(conversations: Vec<Conversation>, active_id: Option<&str>) -> Self {
        let active = match active_id {
            Some(id) if conversations.iter().any(|c| c.id == id) => {
                ActiveConversation::Saved(id.to_string())
            }
            _ => match conversations.first() {
                Some(c) => ActiveConversation::Saved(c.id.clone()),
                None => ActiveConversation::Draft(Conversation::new()),
            },
        };
        let mut state = Self {
            conversations,
            active,
            live: Vec::new(),
        };
        state.live = state.active_conversation().messages.clone();
        state
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn live(&self) -> &[Message] {
        &self.live
    }

    pub fn is_draft(&self) -> bool {
        matches!(self.active, ActiveConversation::Draft(_))
    }

    pub fn active_id(&self) -> &str {
        match &self.active {
            ActiveConversation::Draft(c) => &c.id,
            ActiveConversation::Saved(id) => id,
        }
    }

    pub fn active_conversation(&self) -> &Conversation {
        match &self.active {
            ActiveConversation::Draft(c) => c,
            ActiveConversation::Saved(id) => self
                .conversations
                .iter()
                .find(|c| &c.id == id)
                .expect("Active conversation missing from the saved set"),
        }
    }

    /// Looks up a conversation by id, including the draft.
    pub fn find(&self, id: &str) -> Option<&Conversation> {
        match &self.active {
            ActiveConversation::Draft(c) if c.id == id => Some(c),
            _ => self.conversations.iter().find(|c| c.id == id),
        }
    }

    fn target_mut(&mut self) -> &mut Conversation {
        match &mut self.active {
            ActiveConversation::Draft(c) => c,
            ActiveConversation::Saved(id) => self
                .conversations
                .iter_mut()
                .find(|c| c.id == *id)
                .expect("Active conversation missing from the saved set"),
        }
    }

    fn activate(&mut self, id: String) {
        self.active = ActiveConversation::Saved(id);
        self.live = self.active_conversation().messages.clone();
    }

    /// Adds a message to the screen and to whichever conversation is
    /// active.
    pub fn append(&mut self, message: Message) {
        self.live.push(message);
        self.sync();
    }

    /// Replaces the content of a message in place. Id, role and
    /// position never change. Returns false if no such message is on
    /// screen.
    pub fn update_content(&mut self, id: &str, content: &str) -> bool {
        let Some(message) = self.live.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        if message.content != content {
            message.content = content.to_string();
        }
        self.sync();
        true
    }

    /// Adds a message to a specific conversation. The screen follows
    /// only while that conversation is the active one. Returns false if
    /// the conversation is gone.
    pub fn append_to(&mut self, conversation_id: &str, message: Message) -> bool {
        if self.active_id() == conversation_id {
            self.append(message);
            return true;
        }
        match self.conversations.iter_mut().find(|c| c.id == conversation_id) {
            Some(conversation) => {
                conversation.messages.push(message);
                conversation.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Replaces the content of a message in a specific conversation,
    /// whether or not it is on screen.
    pub fn update_content_in(&mut self, conversation_id: &str, id: &str, content: &str) -> bool {
        if self.active_id() == conversation_id {
            return self.update_content(id, content);
        }
        let Some(conversation) = self.conversations.iter_mut().find(|c| c.id == conversation_id)
        else {
            return false;
        };
        let Some(message) = conversation.messages.iter_mut().find(|m| m.id == id) else {
            return false;
        };
        if message.content != content {
            message.content = content.to_string();
            conversation.updated_at = Utc::now();
        }
        true
    }

    /// Copies the live list over the active conversation when the
    /// lengths or the last message's content differ.
    ///
    /// Only the tail is compared. Messages are only ever appended or
    /// updated at the tail so this is enough to detect every change
    /// made through this type.
    pub fn sync(&mut self) -> bool {
        let changed = {
            let target = self.active_conversation();
            target.messages.len() != self.live.len()
                || target.messages.last().map(|m| &m.content)
                    != self.live.last().map(|m| &m.content)
        };
        if changed {
            let live = self.live.clone();
            let target = self.target_mut();
            target.messages = live;
            target.updated_at = Utc::now();
        }
        changed
    }

    /// Moves the draft into the saved set, most recent first, under a
    /// provisional title. Returns the promoted id, or `None` when the
    /// active conversation is already saved.
    pub fn promote(&mut self, title: &str) -> Option<String> {
        let ActiveConversation::Draft(draft) = &self.active else {
            return None;
        };
        let mut conversation = draft.clone();
        conversation.title = title.to_string();
        conversation.updated_at = Utc::now();

        let id = conversation.id.clone();
        self.conversations.retain(|c| c.id != id);
        self.conversations.insert(0, conversation);
        self.active = ActiveConversation::Saved(id.clone());
        Some(id)
    }

    /// Starts a new draft, replacing any existing one.
    pub fn new_chat(&mut self) -> String {
        let draft = Conversation::new();
        let id = draft.id.clone();
        self.live = draft.messages.clone();
        self.active = ActiveConversation::Draft(draft);
        id
    }

    /// Switches to a saved conversation, discarding any draft.
    pub fn select(&mut self, id: &str) -> bool {
        if !self.conversations.iter().any(|c| c.id == id) {
            return false;
        }
        self.activate(id.to_string());
        true
    }

    /// Removes a conversation. The saved set is never left empty: when
    /// the last one goes, the current draft (or a fresh conversation)
    /// takes its place and becomes active.
    ///
    /// The replacement goes straight into the saved set instead of the
    /// pending slot, so after a delete the active conversation is
    /// always a saved one.
    pub fn delete(&mut self, id: &str) -> bool {
        let deleting_draft = matches!(&self.active, ActiveConversation::Draft(d) if d.id == id);
        let before = self.conversations.len();
        self.conversations.retain(|c| c.id != id);
        if !deleting_draft && self.conversations.len() == before {
            return false;
        }

        if self.conversations.is_empty() {
            let replacement = match &self.active {
                ActiveConversation::Draft(draft) if !deleting_draft => draft.clone(),
                _ => Conversation::new(),
            };
            let replacement_id = replacement.id.clone();
            self.conversations.push(replacement);
            self.activate(replacement_id);
        } else if deleting_draft || self.active_id() == id {
            let first = self.conversations[0].id.clone();
            self.activate(first);
        }
        true
    }

    pub fn set_title(&mut self, id: &str, title: &str) -> bool {
        if let ActiveConversation::Draft(draft) = &mut self.active {
            if draft.id == id {
                draft.title = title.to_string();
                return true;
            }
        }
        match self.conversations.iter_mut().find(|c| c.id == id) {
            Some(conversation) => {
                conversation.title = title.to_string();
                true
            }
            None => false,
        }
    }

    /// The most recent `limit` messages on screen, leaving out the
    /// welcome greeting.
    pub fn history(&self, limit: usize) -> Vec<&Message> {
        let messages: Vec<&Message> = self.live.iter().filter(|m| m.id != WELCOME_ID).collect();
        let start = messages.len().saturating_sub(limit);
        messages[start..].to_vec()
    }
}

impl Default for ChatState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::models::{DEFAULT_TITLE, Role, WELCOME_MESSAGE};

    fn saved(title: &str) -> Conversation {
        let mut c = Conversation::new();
        c.title = title.to_string();
        c
    }

    #[test]
    fn test_load_empty_starts_draft() {
        let state = ChatState::new();
        assert!(state.is_draft());
        assert!(state.conversations().is_empty());
        assert_eq!(state.live().len(), 1);
        assert_eq!(state.live()[0].content, WELCOME_MESSAGE);
    }

    #[test]
    fn test_load_restores_active_id() {
        let a = saved("a");
        let b = saved("b");
        let b_id = b.id.clone();
        let state = ChatState::load(vec![a, b], Some(&b_id));
        assert!(!state.is_draft());
        assert_eq!(state.active_id(), b_id);
    }

    #[test]
    fn test_load_unknown_active_id_falls_back_to_first() {
        let a = saved("a");
        let a_id = a.id.clone();
        let state = ChatState::load(vec![a, saved("b")], Some("gone"));
        assert_eq!(state.active_id(), a_id);
    }

    #[test]
    fn test_append_to_draft_leaves_set_alone() {
        let mut state = ChatState::new();
        state.append(Message::new(Role::Assistant, "extra"));
        assert!(state.conversations().is_empty());
        assert_eq!(state.active_conversation().messages.len(), 2);
        assert_eq!(state.live().len(), 2);
    }

    #[test]
    fn test_append_to_saved_mirrors_into_set() {
        let a = saved("a");
        let mut state = ChatState::load(vec![a], None);
        let before = state.active_conversation().updated_at;
        state.append(Message::new(Role::User, "hi"));

        let conversation = &state.conversations()[0];
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[1].content, "hi");
        assert!(conversation.updated_at >= before);
    }

    #[test]
    fn test_promote_moves_draft_to_front() {
        let older = saved("older");
        let mut state = ChatState::load(vec![older], None);
        let draft_id = state.new_chat();
        state.append(Message::new(Role::User, "Plan a trip"));

        let promoted = state.promote("Plan a trip");
        assert_eq!(promoted.as_deref(), Some(draft_id.as_str()));
        assert!(!state.is_draft());
        assert_eq!(state.conversations().len(), 2);
        assert_eq!(state.conversations()[0].id, draft_id);
        assert_eq!(state.conversations()[0].title, "Plan a trip");
        assert_eq!(
            state
                .conversations()
                .iter()
                .filter(|c| c.id == draft_id)
                .count(),
            1
        );
        assert_eq!(state.conversations()[0].messages.len(), 2);
    }

    #[test]
    fn test_promote_saved_is_noop() {
        let mut state = ChatState::load(vec![saved("a")], None);
        assert_eq!(state.promote("x"), None);
        assert_eq!(state.conversations().len(), 1);
    }

    #[test]
    fn test_update_content_is_idempotent() {
        let mut state = ChatState::load(vec![saved("a")], None);
        let reply = Message::new(Role::Assistant, "");
        let id = reply.id.clone();
        state.append(reply);

        assert!(state.update_content(&id, "Hello"));
        assert!(state.update_content(&id, "Hello"));

        let last = state.live().last().unwrap();
        assert_eq!(last.content, "Hello");
        assert_eq!(last.id, id);
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(
            state.conversations()[0].messages.last().unwrap().content,
            "Hello"
        );
    }

    #[test]
    fn test_update_unknown_message() {
        let mut state = ChatState::new();
        assert!(!state.update_content("missing", "x"));
    }

    #[test]
    fn test_sync_only_compares_tail() {
        let mut state = ChatState::load(vec![saved("a")], None);
        state.append(Message::new(Role::User, "tail"));
        let first_id = state.live()[0].id.clone();

        // A non-tail edit is not picked up, callers only touch the tail
        state.update_content(&first_id, "rewritten");
        assert_eq!(state.live()[0].content, "rewritten");
        assert_eq!(
            state.conversations()[0].messages[0].content,
            WELCOME_MESSAGE
        );
        assert!(!state.sync());
    }

    #[test]
    fn test_new_chat_replaces_existing_draft() {
        let mut state = ChatState::new();
        let first = state.active_id().to_string();
        let second = state.new_chat();
        assert_ne!(first, second);
        assert!(state.is_draft());
        assert!(state.find(&first).is_none());
    }

    #[test]
    fn test_select() {
        let a = saved("a");
        let b = saved("b");
        let b_id = b.id.clone();
        let mut state = ChatState::load(vec![a, b], None);
        state.new_chat();

        assert!(!state.select("nope"));
        assert!(state.is_draft());
        assert!(state.select(&b_id));
        assert!(!state.is_draft());
        assert_eq!(state.active_id(), b_id);
    }

    #[test]
    fn test_delete_only_conversation_never_leaves_set_empty() {
        let only = saved("only");
        let only_id = only.id.clone();
        let mut state = ChatState::load(vec![only], None);

        assert!(state.delete(&only_id));
        assert_eq!(state.conversations().len(), 1);
        assert_ne!(state.active_id(), only_id);

        let active = state.active_conversation();
        assert_eq!(active.title, DEFAULT_TITLE);
        assert_eq!(active.messages.len(), 1);
        assert_eq!(active.messages[0].content, WELCOME_MESSAGE);
        assert_eq!(state.live().len(), 1);
    }

    #[test]
    fn test_delete_last_saved_while_drafting_keeps_draft() {
        let only = saved("only");
        let only_id = only.id.clone();
        let mut state = ChatState::load(vec![only], None);
        let draft_id = state.new_chat();

        assert!(state.delete(&only_id));
        assert_eq!(state.conversations().len(), 1);
        assert_eq!(state.active_id(), draft_id);
    }

    #[test]
    fn test_delete_active_selects_most_recent() {
        let a = saved("a");
        let b = saved("b");
        let a_id = a.id.clone();
        let b_id = b.id.clone();
        let mut state = ChatState::load(vec![a, b], Some(&b_id));

        assert!(state.delete(&b_id));
        assert_eq!(state.active_id(), a_id);
        assert_eq!(state.conversations().len(), 1);
    }

    #[test]
    fn test_delete_inactive_keeps_active() {
        let a = saved("a");
        let b = saved("b");
        let a_id = a.id.clone();
        let b_id = b.id.clone();
        let mut state = ChatState::load(vec![a, b], Some(&a_id));

        assert!(state.delete(&b_id));
        assert_eq!(state.active_id(), a_id);
        assert!(!state.delete(&b_id));
    }

    #[test]
    fn test_set_title() {
        let mut state = ChatState::load(vec![saved("a")], None);
        let id = state.active_id().to_string();
        assert!(state.set_title(&id, "Renamed"));
        assert_eq!(state.conversations()[0].title, "Renamed");

        let draft = state.new_chat();
        assert!(state.set_title(&draft, "Draft title"));
        assert_eq!(state.active_conversation().title, "Draft title");
        assert!(!state.set_title("missing", "x"));
    }

    #[test]
    fn test_history_limit() {
        let mut state = ChatState::new();
        for i in 0..30 {
            state.append(Message::new(Role::User, &i.to_string()));
        }
        let history = state.history(18);
        assert_eq!(history.len(), 18);
        assert_eq!(history.last().unwrap().content, "29");
        assert_eq!(history[0].content, "12");
        assert_eq!(state.history(100).len(), 30);
        assert!(state.history(100).iter().all(|m| m.id != WELCOME_ID));
    }

    #[test]
    fn test_updates_follow_conversation_off_screen() {
        let mut state = ChatState::new();
        state.append(Message::new(Role::User, "Hello"));
        let a = state.promote("Hello").unwrap();
        let reply = Message::new(Role::Assistant, "Par");
        let reply_id = reply.id.clone();
        assert!(state.append_to(&a, reply));

        state.new_chat();
        assert!(state.update_content_in(&a, &reply_id, "Partial"));
        assert!(state.append_to(&a, Message::new(Role::Assistant, "more")));

        // The draft on screen is untouched
        assert_eq!(state.live().len(), 1);
        assert_eq!(state.active_conversation().messages.len(), 1);

        let saved = state.find(&a).unwrap();
        assert_eq!(saved.messages.len(), 4);
        assert_eq!(saved.messages[2].content, "Partial");
        assert_eq!(saved.messages[3].content, "more");

        // Switching back shows what arrived while away
        assert!(state.select(&a));
        assert_eq!(state.live()[2].content, "Partial");
        assert!(state.update_content_in(&a, &reply_id, "Partial reply"));
        assert_eq!(state.live()[2].content, "Partial reply");
        assert_eq!(state.find(&a).unwrap().messages[2].content, "Partial reply");
    }

    #[test]
    fn test_updates_to_deleted_conversation_are_dropped() {
        let mut state = ChatState::new();
        state.append(Message::new(Role::User, "Hello"));
        let a = state.promote("Hello").unwrap();
        state.new_chat();
        state.append(Message::new(Role::User, "Other"));
        state.promote("Other");
        assert!(state.delete(&a));

        assert!(!state.append_to(&a, Message::new(Role::Assistant, "late")));
        assert!(!state.update_content_in(&a, "nope", "late"));
        assert!(state.live().iter().all(|m| m.content != "late"));
    }
}
