//! Extraction of a next coding task from free advisor text.
//!
//! The advisor is asked to answer with a tagged JSON contract. Replies that
//! ignore it are scanned with the `task_id:` / `description:` / fenced-template
//! patterns as a last resort. Keys may be bare or quoted.

use interview_core::model::{Task, TaskId};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TAGGED_CONTRACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<next_task>\s*(.*?)\s*</next_task>").expect("valid tagged-contract regex")
});
static JSON_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```json\s*(\{.*?\})\s*```").expect("valid json-fence regex")
});
static TASK_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"?task_id"?\s*:\s*"?([\w\-]+)"#).expect("valid task_id regex")
});
static DESCRIPTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)"?description"?\s*:\s*(.*?)(?:"?template"?\s*:|```)"#)
        .expect("valid description regex")
});
static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9_+\-]*[ \t]*\n?(.+?)```").expect("valid code-fence regex")
});

/// A coding task handed to the candidate, either drawn from the catalog or
/// proposed by the advisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOffer {
    pub task_id: TaskId,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub template: String,
}

impl TaskOffer {
    #[must_use]
    pub fn from_task(task: &Task) -> Self {
        Self {
            task_id: task.id().clone(),
            description: task.description().to_owned(),
            template: task.template().to_owned(),
        }
    }

    /// Best-effort extraction; `None` when no task id can be found.
    #[must_use]
    pub fn extract(text: &str) -> Option<Self> {
        if text.trim().is_empty() {
            return None;
        }
        Self::from_contract(text).or_else(|| Self::from_patterns(text))
    }

    /// Fill blank fields from the catalog entry with the same id.
    pub fn complete_from(&mut self, task: &Task) {
        if self.description.trim().is_empty() {
            self.description = task.description().to_owned();
        }
        if self.template.trim().is_empty() {
            self.template = task.template().to_owned();
        }
    }

    fn from_contract(text: &str) -> Option<Self> {
        let tagged = TAGGED_CONTRACT
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());
        let fenced = || {
            JSON_FENCE
                .captures(text)
                .and_then(|caps| caps.get(1))
                .map(|m| m.as_str())
        };

        let raw = tagged.or_else(fenced)?;
        let parsed = serde_json::from_str::<Self>(raw)
            .or_else(|_| serde_json::from_str::<Self>(&escape_control_chars(raw)));
        match parsed {
            Ok(offer) => Some(offer),
            Err(err) => {
                tracing::debug!(error = %err, "next-task contract present but malformed");
                None
            }
        }
    }

    fn from_patterns(text: &str) -> Option<Self> {
        let task_id = TASK_ID
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| TaskId::new(m.as_str()))?;

        let description = DESCRIPTION
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| {
                m.as_str()
                    .trim()
                    .trim_end_matches(',')
                    .trim_matches('"')
                    .trim()
                    .to_owned()
            })
            .unwrap_or_default();
        let template = CODE_FENCE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_owned())
            .unwrap_or_default();

        Some(Self {
            task_id,
            description,
            template,
        })
    }
}

/// Escape raw control characters inside JSON string literals. Models often
/// paste a multi-line template verbatim into the contract.
fn escape_control_chars(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 16);
    let mut in_string = false;
    let mut escaped = false;

    for ch in raw.chars() {
        if !in_string {
            in_string = ch == '"';
            out.push(ch);
            continue;
        }
        if escaped {
            escaped = false;
            out.push(ch);
            continue;
        }
        match ch {
            '\\' => {
                escaped = true;
                out.push(ch);
            }
            '"' => {
                in_string = false;
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04x}", u32::from(c))),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_contract() {
        let text = "Great job!\n<next_task>{\"task_id\": \"two_sum\", \"description\": \"Find two indices.\", \"template\": \"def two_sum(nums, target):\\n    pass\"}</next_task>";
        let offer = TaskOffer::extract(text).unwrap();

        assert_eq!(offer.task_id.as_str(), "two_sum");
        assert_eq!(offer.description, "Find two indices.");
        assert!(offer.template.starts_with("def two_sum"));
    }

    #[test]
    fn parses_contract_with_literal_multiline_template() {
        let text = "Nice work.\n<next_task>\n{\"task_id\": \"two_sum\", \"description\": \"Find two indices.\", \"template\": \"def two_sum(nums, target):\n\tpass\n\"}\n</next_task>";
        let offer = TaskOffer::extract(text).unwrap();

        assert_eq!(offer.task_id.as_str(), "two_sum");
        assert_eq!(offer.description, "Find two indices.");
        assert_eq!(offer.template, "def two_sum(nums, target):\n\tpass\n");
    }

    #[test]
    fn control_chars_are_escaped_only_inside_strings() {
        let raw = "{\n  \"a\": \"x\ny\", \"b\": \"q\\\"\tz\"\n}";
        assert_eq!(
            escape_control_chars(raw),
            "{\n  \"a\": \"x\\ny\", \"b\": \"q\\\"\\tz\"\n}"
        );
    }

    #[test]
    fn quoted_keys_outside_a_contract_still_yield_the_task() {
        let text = "Next one: {\"task_id\": \"merge_intervals\", \"description\": \"Merge overlaps.\", \"template\": ...";
        let offer = TaskOffer::extract(text).unwrap();

        assert_eq!(offer.task_id.as_str(), "merge_intervals");
        assert_eq!(offer.description, "Merge overlaps.");
    }

    #[test]
    fn parses_json_fence_contract() {
        let text = "Well done.\n```json\n{\"task_id\": \"flatten_list\"}\n```";
        let offer = TaskOffer::extract(text).unwrap();

        assert_eq!(offer.task_id.as_str(), "flatten_list");
        assert!(offer.description.is_empty());
    }

    #[test]
    fn falls_back_to_patterns() {
        let text = "All tests pass!\n\ntask_id: rotate_array\ndescription: Rotate the list k steps.\nSome more words.\n```python\ndef rotate(arr, k):\n    pass\n```\n";
        let offer = TaskOffer::extract(text).unwrap();

        assert_eq!(offer.task_id.as_str(), "rotate_array");
        assert_eq!(offer.description, "Rotate the list k steps.\nSome more words.");
        assert_eq!(offer.template, "def rotate(arr, k):\n    pass");
    }

    #[test]
    fn description_may_end_at_template_label() {
        let text = "TASK_ID: lcp\nDescription: Longest prefix.\nTemplate:\n```\ndef lcp(arr):\n    pass\n```";
        let offer = TaskOffer::extract(text).unwrap();

        assert_eq!(offer.task_id.as_str(), "lcp");
        assert_eq!(offer.description, "Longest prefix.");
        assert_eq!(offer.template, "def lcp(arr):\n    pass");
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let offer = TaskOffer::extract("task_id: top_k").unwrap();
        assert!(offer.description.is_empty());
        assert!(offer.template.is_empty());
    }

    #[test]
    fn plain_hint_is_not_a_task() {
        assert!(TaskOffer::extract("Maybe check the empty list case?").is_none());
        assert!(TaskOffer::extract("").is_none());
    }

    #[test]
    fn malformed_contract_falls_back_to_patterns() {
        let text = "<next_task>{not json}</next_task>\ntask_id: trie";
        let offer = TaskOffer::extract(text).unwrap();
        assert_eq!(offer.task_id.as_str(), "trie");
    }
}
