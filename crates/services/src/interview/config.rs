use std::env;

use interview_core::model::TaskLevel;

const DEFAULT_SECRET_PHRASE: &str = "skip to practice";
const DEFAULT_THEORY_TARGET: u32 = 5;
const DEFAULT_HINT_LIMIT: u32 = 2;

const GREETINGS: &[&str] = &[
    "привет", "привет!", "hi", "hi!", "hello", "hello!", "ok", "окей", "начать", "начнём",
    "готов", "start", "ready",
];
const READINESS: &[&str] = &[
    "да",
    "готов",
    "начать",
    "лайв-кодинг",
    "практика",
    "yes",
    "ready",
    "start",
    "live-coding",
    "practice",
];
const AFFIRMATIVES: &[&str] = &[
    "да", "готов", "ок", "поехали", "начать", "yes", "ready", "ok", "go", "start",
];

/// Tunables of the stage machine.
///
/// Phrase sets are matched against the trimmed, lowercased input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterviewConfig {
    pub secret_phrase: String,
    pub theory_question_target: u32,
    pub hint_limit: u32,
    pub greetings: Vec<String>,
    pub readiness: Vec<String>,
    pub affirmatives: Vec<String>,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            secret_phrase: DEFAULT_SECRET_PHRASE.to_owned(),
            theory_question_target: DEFAULT_THEORY_TARGET,
            hint_limit: DEFAULT_HINT_LIMIT,
            greetings: owned(GREETINGS),
            readiness: owned(READINESS),
            affirmatives: owned(AFFIRMATIVES),
        }
    }
}

impl InterviewConfig {
    /// Defaults with `INTERVIEW_SECRET_PHRASE`, `INTERVIEW_THEORY_QUESTIONS` and
    /// `INTERVIEW_HINT_LIMIT` applied when set.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(phrase) = env::var("INTERVIEW_SECRET_PHRASE") {
            if !phrase.trim().is_empty() {
                config.secret_phrase = phrase;
            }
        }
        if let Some(target) = parse_positive("INTERVIEW_THEORY_QUESTIONS") {
            config.theory_question_target = target;
        }
        if let Some(limit) = parse_positive("INTERVIEW_HINT_LIMIT") {
            config.hint_limit = limit;
        }
        config
    }

    #[must_use]
    pub fn is_secret_phrase(&self, input: &str) -> bool {
        normalize(input) == normalize(&self.secret_phrase)
    }

    #[must_use]
    pub fn is_greeting(&self, input: &str) -> bool {
        contains(&self.greetings, input)
    }

    #[must_use]
    pub fn is_ready(&self, input: &str) -> bool {
        contains(&self.readiness, input)
    }

    #[must_use]
    pub fn is_affirmative(&self, input: &str) -> bool {
        contains(&self.affirmatives, input)
    }
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|word| (*word).to_owned()).collect()
}

fn normalize(input: &str) -> String {
    input.trim().to_lowercase()
}

fn contains(set: &[String], input: &str) -> bool {
    let input = normalize(input);
    set.iter().any(|word| normalize(word) == input)
}

fn parse_positive(key: &str) -> Option<u32> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
}

// Scripted replies.

pub(crate) const SECRET_CONFIRMATION: &str =
    "🔓 Practice mode unlocked! Ready to start solving tasks? Reply \"yes\" to begin.";

pub(crate) const LEVEL_PROMPT: &str = "Please choose a level with a single digit: 1, 2, 3 or 4.";

pub(crate) const PRACTICE_REPROMPT: &str = "Whenever you are ready, reply \"yes\".";

pub(crate) const RUNNING_SUBMISSION: &str = "⏳ Running the tests for your code...";

pub(crate) const PRACTICE_HANDOFF: &str = "Great! The theory part is complete.\n\n\
     Next up is live coding: you will solve tasks in the editor.\n\
     Ready to start? Reply \"yes\".";

pub(crate) const THEORY_WRAP_UP: &str = "\n\n---\n\n\
     The theory part is nearly done. Ready to move on to live coding? Reply \"yes\".";

pub(crate) fn level_menu() -> String {
    let mut text = String::from("Hi! Ready for the technical interview? 🚀\n\nChoose a difficulty level:\n");
    for level in TaskLevel::all() {
        let scope = match level.value() {
            1 => "core questions and tasks",
            2 => "standard questions",
            3 => "advanced architecture questions",
            _ => "expert level",
        };
        text.push_str(&format!("{}. {} ({scope})\n", level.value(), level.name()));
    }
    text.push_str("\nReply with a digit (1, 2, 3 or 4).");
    text
}

pub(crate) fn level_confirmation(level: TaskLevel) -> String {
    format!(
        "✅ Level **{}** selected!\n\n\
         Let's start with theory. Answer each question in as much detail as you can.\n\n\
         Question 1: Explain the difference between mutable and immutable types in Python. \
         Give examples.",
        level.name()
    )
}

pub(crate) fn theory_reminder(asked: u32, target: u32) -> String {
    format!("We still have theory questions to cover ({asked}/{target}). Let's keep going!")
}

pub(crate) fn task_announcement(level: TaskLevel, description: &str, template: &str) -> String {
    format!(
        "🎯 Level {} task:\n\n**{description}**\n\nYour template:\n```python\n{template}\n```\n\n\
         Write your solution in the editor.",
        level.value()
    )
}

pub(crate) fn no_task_at_level(level: TaskLevel) -> String {
    format!(
        "There are no tasks at level {} ({}) yet. Reset the interview to pick another level.",
        level.value(),
        level.name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phrase_matching_ignores_case_and_padding() {
        let config = InterviewConfig::default();
        assert!(config.is_greeting("  Hello "));
        assert!(config.is_greeting("Привет!"));
        assert!(!config.is_greeting("hello there"));
        assert!(config.is_ready("ДА"));
        assert!(config.is_affirmative("Поехали"));
        assert!(config.is_secret_phrase("Skip To Practice"));
    }

    #[test]
    fn menu_lists_every_level() {
        let menu = level_menu();
        for name in ["Junior", "Middle", "Senior", "Expert"] {
            assert!(menu.contains(name), "{name} missing from menu");
        }
    }
}
