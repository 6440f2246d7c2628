#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Role {
    #[strum(to_string = "You")]
    User,
    #[strum(to_string = "System")]
    System,
    #[strum(to_string = "AI Analyst")]
    Ai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Success,
    Error,
    Image,
}

/// One entry in the session log
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub role: Role,
    pub kind: MessageKind,
    pub body: String,
    /// `data:` URI of an attached image
    pub image: Option<String>,
}

impl Message {
    pub fn new(role: Role, kind: MessageKind, body: impl Into<String>) -> Self {
        Self {
            role,
            kind,
            body: body.into(),
            image: None,
        }
    }

    pub fn user(body: impl Into<String>) -> Self {
        Self::new(Role::User, MessageKind::Text, body)
    }

    pub fn system(body: impl Into<String>) -> Self {
        Self::new(Role::System, MessageKind::Text, body)
    }

    pub fn success(body: impl Into<String>) -> Self {
        Self::new(Role::System, MessageKind::Success, body)
    }

    pub fn error(body: impl Into<String>) -> Self {
        Self::new(Role::System, MessageKind::Error, body)
    }

    pub fn ai(body: impl Into<String>) -> Self {
        Self::new(Role::Ai, MessageKind::Text, body)
    }

    pub fn image(body: impl Into<String>, image: String) -> Self {
        Self {
            image: Some(image),
            ..Self::new(Role::System, MessageKind::Image, body)
        }
    }
}

/// Append-only, ordered message sequence
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    entries: Vec<Message>,
}

impl MessageLog {
    pub fn push(&mut self, message: Message) {
        self.entries.push(message);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.entries.last()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_display() {
        assert_eq!(Role::User.to_string(), "You");
        assert_eq!(Role::System.to_string(), "System");
        assert_eq!(Role::Ai.to_string(), "AI Analyst");
    }

    #[test]
    fn test_constructors_set_role_and_kind() {
        let m = Message::success("ok");
        assert_eq!(m.role, Role::System);
        assert_eq!(m.kind, MessageKind::Success);
        assert!(m.image.is_none());

        let m = Message::ai("hello");
        assert_eq!(m.role, Role::Ai);
        assert_eq!(m.kind, MessageKind::Text);

        let m = Message::image("hint", "data:image/png;base64,AA==".into());
        assert_eq!(m.kind, MessageKind::Image);
        assert_eq!(m.image.as_deref(), Some("data:image/png;base64,AA=="));
    }

    #[test]
    fn test_log_preserves_order() {
        let mut log = MessageLog::default();
        assert!(log.is_empty());
        log.push(Message::user("a"));
        log.push(Message::system("b"));
        log.push(Message::error("c"));

        let bodies: Vec<&str> = log.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["a", "b", "c"]);
        assert_eq!(log.len(), 3);
        assert_eq!(log.last().unwrap().kind, MessageKind::Error);
    }
}
