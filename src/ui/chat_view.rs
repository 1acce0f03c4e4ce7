use std::fmt;

use crate::api::models::Message;
use crate::sync::MessageView;

/// One rendered message, keyed by the message id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    pub id: String,
    pub sender: String,
    pub text: Option<String>,
    /// Inline `data:` URI for the attached image, if any.
    pub image_uri: Option<String>,
    pub mine: bool,
}

impl Bubble {
    pub fn from_message(message: &Message, me: &str) -> Self {
        Self {
            id: message.id.clone(),
            sender: message.user.clone(),
            text: message.text.clone().filter(|t| !t.is_empty()),
            image_uri: message
                .image_base64
                .as_deref()
                .filter(|b| !b.is_empty())
                .map(|b| format!("data:image/jpeg;base64,{b}")),
            mine: message.is_from(me),
        }
    }
}

impl fmt::Display for Bubble {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = if self.mine { '>' } else { '<' };
        write!(f, "{marker} {}:", self.sender)?;
        if let Some(uri) = &self.image_uri {
            write!(f, " [image, {} chars]", uri.len())?;
        }
        if let Some(text) = &self.text {
            write!(f, " {text}")?;
        }
        Ok(())
    }
}

/// Renders the list top to bottom in the order it was published.
pub fn render(messages: &[Message], me: &str) -> Vec<Bubble> {
    messages.iter().map(|m| Bubble::from_message(m, me)).collect()
}

pub struct ChatView;

impl ChatView {
    /// Plain-text rendering of a whole view, one bubble per line.
    pub fn to_lines(view: &MessageView, me: &str) -> Vec<String> {
        let mut lines: Vec<String> = render(&view.messages, me)
            .iter()
            .map(ToString::to_string)
            .collect();
        if view.offline {
            lines.push("(offline: showing last known messages)".to_string());
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Timestamp;
    use crate::sync::ViewSource;

    fn message(id: &str, user: &str, text: Option<&str>, image: Option<&str>) -> Message {
        Message {
            id: id.into(),
            text: text.map(Into::into),
            user: user.into(),
            created_at: Some(Timestamp::new(1, 0)),
            image_base64: image.map(Into::into),
        }
    }

    #[test]
    fn own_messages_are_marked_mine() {
        let bubbles = render(
            &[
                message("m1", "a@x.com", Some("hello"), None),
                message("m2", "b@x.com", Some("hey"), None),
            ],
            "a@x.com",
        );

        assert!(bubbles[0].mine);
        assert!(!bubbles[1].mine);
        assert_eq!(bubbles[1].sender, "b@x.com");
    }

    #[test]
    fn image_becomes_data_uri() {
        let bubble = Bubble::from_message(&message("m1", "a@x.com", None, Some("QUJD")), "z@x.com");

        assert_eq!(bubble.image_uri.as_deref(), Some("data:image/jpeg;base64,QUJD"));
        assert_eq!(bubble.text, None);
    }

    #[test]
    fn empty_text_is_not_rendered() {
        let msg = message("m1", "a@x.com", Some(""), Some("QUJD"));
        let bubble = Bubble::from_message(&msg, "a@x.com");
        assert_eq!(bubble.text, None);
        assert_eq!(bubble.to_string(), "> a@x.com: [image, 27 chars]");
    }

    #[test]
    fn offline_view_gets_a_footer() {
        let view = MessageView {
            messages: vec![message("m1", "b@x.com", Some("hi"), None)],
            source: ViewSource::Cache,
            offline: true,
        };

        let lines = ChatView::to_lines(&view, "a@x.com");

        assert_eq!(lines[0], "< b@x.com: hi");
        assert_eq!(lines.len(), 2);
    }
}
