//! Prompt assembly for the persona generator.
//!
//! Layout:
//!
//! ```text
//! <persona prompt>
//!
//! Контекст розмови:
//! <speaker>: <content>        (one line per recent message)
//!
//! <user> щойно написала: "<text>"
//!
//! <user> також надіслала медіафайл: <url>      (only with media)
//!
//! Відповідь як <persona> (...):
//! ```

use marianna_types::chat::{MediaRef, Message, Sender};
use marianna_types::persona::PersonaPolicy;

/// Stand-in for a message that carries media.
pub const MEDIA_PLACEHOLDER: &str = "[медіа]";

/// Builds the single text prompt sent to the generator.
pub struct PromptBuilder<'a> {
    policy: &'a PersonaPolicy,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(policy: &'a PersonaPolicy) -> Self {
        Self { policy }
    }

    /// Assemble the prompt.
    ///
    /// `history` is the conversation before the triggering message; only the
    /// last `context_window` entries are rendered.
    pub fn build(&self, history: &[Message], user_text: &str, media: Option<&MediaRef>) -> String {
        let policy = self.policy;
        let mut prompt = String::with_capacity(policy.prompt.len() + 512);

        prompt.push_str(&policy.prompt);
        prompt.push_str("\n\nКонтекст розмови:\n");
        prompt.push_str(&self.render_context(history));
        prompt.push_str(&format!(
            "\n\n{} щойно написала: \"{}\"",
            policy.user_name, user_text
        ));

        if let Some(media) = media {
            prompt.push_str(&format!(
                "\n\n{} також надіслала медіафайл: {}",
                policy.user_name, media.url
            ));
        }

        prompt.push_str(&format!(
            "\n\nВідповідь як {} (надішли {}, кожне з нового рядка, як звичайна подруга, без драми):",
            policy.name,
            fragment_count_phrase(policy.effective_max_fragments())
        ));
        prompt
    }

    fn render_context(&self, history: &[Message]) -> String {
        let window = self.policy.context_window;
        let start = history.len().saturating_sub(window);

        history[start..]
            .iter()
            .map(|message| format!("{}: {}", self.speaker(message.sender), render_content(message)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn speaker(&self, sender: Sender) -> &str {
        match sender {
            Sender::User => &self.policy.user_name,
            Sender::Ai => &self.policy.name,
        }
    }
}

fn render_content(message: &Message) -> String {
    let content = message.content.trim();
    match (&message.media, content.is_empty()) {
        (Some(_), true) => MEDIA_PLACEHOLDER.to_string(),
        (Some(_), false) => format!("{content} {MEDIA_PLACEHOLDER}"),
        (None, _) => content.replace('\n', " "),
    }
}

fn fragment_count_phrase(max: usize) -> String {
    if max <= 1 {
        "1 коротке повідомлення".to_string()
    } else {
        format!("1-{max} коротких повідомлення")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use marianna_types::chat::MediaKind;
    use uuid::Uuid;

    fn message(sender: Sender, content: &str, media: Option<MediaRef>) -> Message {
        Message {
            id: Uuid::now_v7(),
            conversation_id: Uuid::nil(),
            content: content.to_string(),
            sender,
            media,
            timestamp: Utc::now(),
            reactions: Vec::new(),
            ai_avatar: None,
            reply_to_id: None,
        }
    }

    fn image() -> MediaRef {
        MediaRef {
            url: "/uploads/cat.png".to_string(),
            kind: MediaKind::Image,
        }
    }

    #[test]
    fn test_prompt_contains_all_sections_in_order() {
        let policy = PersonaPolicy::default();
        let history = vec![
            message(Sender::User, "Привіт!", None),
            message(Sender::Ai, "Привіт 😊", None),
        ];
        let prompt = PromptBuilder::new(&policy).build(&history, "Як справи?", None);

        assert!(prompt.starts_with(&policy.prompt));
        let context = prompt.find("Контекст розмови:\nВіолета: Привіт!\nМаріанна: Привіт 😊").unwrap();
        let current = prompt.find("Віолета щойно написала: \"Як справи?\"").unwrap();
        let instruction = prompt.find("Відповідь як Маріанна (надішли 1-2 коротких повідомлення").unwrap();
        assert!(context < current && current < instruction);
        assert!(!prompt.contains("медіафайл"));
    }

    #[test]
    fn test_context_is_limited_to_window() {
        let policy = PersonaPolicy {
            context_window: 3,
            ..PersonaPolicy::default()
        };
        let history: Vec<Message> = (0..6)
            .map(|i| message(Sender::User, &format!("msg-{i}"), None))
            .collect();
        let prompt = PromptBuilder::new(&policy).build(&history, "x", None);

        assert!(!prompt.contains("msg-2"));
        assert!(prompt.contains("msg-3"));
        assert!(prompt.contains("msg-5"));
    }

    #[test]
    fn test_media_line_and_placeholders() {
        let policy = PersonaPolicy::default();
        let history = vec![
            message(Sender::User, "", Some(image())),
            message(Sender::User, "дивись", Some(image())),
        ];
        let media = image();
        let prompt = PromptBuilder::new(&policy).build(&history, "", Some(&media));

        assert!(prompt.contains("Віолета: [медіа]\nВіолета: дивись [медіа]"));
        assert!(prompt.contains("Віолета також надіслала медіафайл: /uploads/cat.png"));
    }

    #[test]
    fn test_empty_history_still_has_context_header() {
        let policy = PersonaPolicy {
            max_fragments: 1,
            ..PersonaPolicy::default()
        };
        let prompt = PromptBuilder::new(&policy).build(&[], "привіт", None);
        assert!(prompt.contains("Контекст розмови:\n\n\nВіолета щойно написала"));
        assert!(prompt.contains("надішли 1 коротке повідомлення"));
    }
}
