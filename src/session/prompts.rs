//! Suggestion cards offered on an empty chat

/// Advisory input length hint; longer input is still sent
pub const MAX_INPUT_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptCard {
    pub title: &'static str,
    /// Text sent when the card is selected
    pub description: &'static str,
    pub emoji: &'static str,
}

pub const PROMPT_CARDS: [PromptCard; 4] = [
    PromptCard {
        title: "Creative Ideas",
        description: "Help me brainstorm ideas for a new project",
        emoji: "💡",
    },
    PromptCard {
        title: "Coding Help",
        description: "Explain how to use React hooks",
        emoji: "👨‍💻",
    },
    PromptCard {
        title: "Fun Fact",
        description: "Tell me something interesting",
        emoji: "✨",
    },
    PromptCard {
        title: "Productivity",
        description: "Suggest ways to stay focused",
        emoji: "⏱️",
    },
];

/// Cards are shown until the conversation moves past the greeting
pub fn shows_prompt_cards(message_count: usize) -> bool {
    message_count <= 1
}

pub fn exceeds_input_limit(text: &str) -> bool {
    text.chars().count() > MAX_INPUT_CHARS
}
