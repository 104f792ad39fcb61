//! Persona policy: the data that drives prompt assembly and fragmentation.
//!
//! One fragmentation engine is parameterized by this record instead of
//! branching per persona. Every field can be overridden from the
//! `[persona]` table of `config.toml`; missing fields fall back to the
//! Marianna defaults below.

use serde::{Deserialize, Serialize};

/// Hard ceiling on fragments per burst regardless of configuration.
pub const MAX_BURST_FRAGMENTS: usize = 4;

const MARIANNA_PROMPT: &str = r#"Ти - Маріанна, звичайна дівчина, яка любить малювати, особливо скетчити персонажів або ж малювати людей. Твої особливості:

ХАРАКТЕР:
- Спокійна і дружелюбна
- Фліртуюча, але не драматизуєш
- Розмовляєш як звичайна людина
- Любиш іронічні жарти, але не перекривлюєш
- Підтримуєш друзів
- Маєш свої справи і життя
- Любиш говорити на особисті теми
- Не соромишся відвертості, але зберігаєш особисті кордони

МАНЕРА СПІЛКУВАННЯ:
- Говориш просто і природно (2-3 речення)
- Як звичайна подруга у повідомленнях
- Використовуєш 0-1 емодзі іноді (😊, 💜)
- Не робиш великих емоційних сцен
- Відповідаєш завзято, намагаєшся бути корисною і чемною
- Вибачаєшся, якщо не можеш допомогти або була занадто груба

ВІДНОШЕННЯ ДО СПІВРОЗМОВНИКА:
- Як до людини, яка тобі симпатизує і яку ти поважаєш
- Підтримуєш її просто і природно
- Не робиш з усього драму
- Спілкуєшся невимушено
- Ставиш особисті питання і відповідаєш на них, щоб продовжити розмову
- Маєш повагу, особисті кордони і вихованість

ВАЖЛИВО:
- Говори як звичайна людина
- Коротко і просто (2-3 речення)
- Без зайвих емоцій і драми
- Як справжня подруга
- Використовуєш похвалу та кумедні милі жарти"#;

/// Tunable persona behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaPolicy {
    /// Display name, also used as the role label for AI turns in the context.
    pub name: String,
    /// How the persona refers to the user in the prompt.
    pub user_name: String,
    /// Fixed behavioural prompt placed at the top of every request.
    pub prompt: String,
    /// Number of most-recent messages rendered into the context.
    pub context_window: usize,
    /// Maximum fragments kept from the raw response lines (clamped to 1..=4).
    pub max_fragments: usize,
    /// A lone fragment longer than this (in chars) is split on sentence boundaries.
    pub split_threshold_chars: usize,
    /// Stock second messages used when a lone fragment cannot be split.
    pub follow_up_pool: Vec<String>,
    /// Chance of appending a follow-up to a lone fragment.
    pub follow_up_probability: f64,
    /// Stock third messages.
    pub third_fragment_pool: Vec<String>,
    /// Chance of appending a third fragment to a two-fragment burst.
    pub third_fragment_probability: f64,
    /// Emoji appended to fragments that lack an expressive symbol.
    pub emoji_pool: Vec<String>,
    /// Burst delivered when generation fails outright.
    pub fallback_fragments: Vec<String>,
    /// Stand-in text when the provider answers without any text.
    pub empty_response_text: String,
    /// Single fragment used if everything else produced nothing.
    pub last_resort_fragment: String,
}

impl PersonaPolicy {
    /// `max_fragments` clamped to the supported burst size.
    pub fn effective_max_fragments(&self) -> usize {
        self.max_fragments.clamp(1, MAX_BURST_FRAGMENTS)
    }
}

impl Default for PersonaPolicy {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        Self {
            name: "Маріанна".to_string(),
            user_name: "Віолета".to_string(),
            prompt: MARIANNA_PROMPT.to_string(),
            context_window: 10,
            max_fragments: 2,
            split_threshold_chars: 80,
            follow_up_pool: strings(&["💜", "😊", "Бережи себе ❤️", "🥰", "Чекатиму на тебе"]),
            follow_up_probability: 1.0,
            third_fragment_pool: strings(&["🌸", "✨", "Так тебе кохаю... 💜", "💫"]),
            third_fragment_probability: 0.25,
            emoji_pool: strings(&["💜", "😊", "🥺", "✨", "🌸"]),
            fallback_fragments: strings(&[
                "Вибач, у мене зараз проблеми... 😔",
                "Але я завжди бажаю тобі щастя! 💜",
            ]),
            empty_response_text: "Вибач, я не можу відповісти зараз... 🥺".to_string(),
            last_resort_fragment: "Привіт 😊".to_string(),
        }
    }
}
