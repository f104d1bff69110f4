//! Jira issue records and the in-memory task cache.
//!
//! Issues come straight from the relay's task listing, so every field is
//! treated as optional and wrongly-typed values degrade to "absent" instead
//! of failing the whole listing.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::api::TaskPayload;

/// Shown when a description is absent or cannot be read.
pub const NO_DESCRIPTION: &str = "No description provided";

/// Shown when an issue has no summary.
pub const UNTITLED: &str = "Untitled Task";

/// Deserialize `T`, falling back to `T::default()` on null or a wrong shape.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Jira returns ids as strings; tolerate numbers too.
fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Named {
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assignee {
    #[serde(default, rename = "displayName", deserialize_with = "lenient")]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub name: Option<String>,
    #[serde(default, rename = "emailAddress", deserialize_with = "lenient")]
    pub email: Option<String>,
}

impl Assignee {
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("User")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueFields {
    #[serde(default, deserialize_with = "lenient")]
    pub summary: Option<String>,
    /// Raw description; either a rich-text document or a plain string.
    /// Read it through [`Issue::description`].
    #[serde(default)]
    pub description: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<Named>,
    #[serde(default, deserialize_with = "lenient")]
    pub priority: Option<Named>,
    #[serde(default, deserialize_with = "lenient")]
    pub issuetype: Option<Named>,
    #[serde(default, deserialize_with = "lenient")]
    pub assignee: Option<Assignee>,
    #[serde(default, deserialize_with = "lenient")]
    pub components: Vec<Named>,
    #[serde(default, deserialize_with = "lenient")]
    pub labels: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A tracker issue as listed by the relay.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient")]
    pub key: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub fields: IssueFields,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCategory {
    Todo,
    InProgress,
    Done,
    Other,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriorityLevel {
    High,
    Medium,
    Low,
    Other,
    Unknown,
}

impl Issue {
    /// Identifier used to key per-task state: the id, or the key when the id
    /// is missing.
    pub fn handle(&self) -> &str {
        if self.id.is_empty() {
            self.key.as_deref().unwrap_or("")
        } else {
            &self.id
        }
    }

    pub fn title(&self) -> &str {
        self.fields
            .summary
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(UNTITLED)
    }

    pub fn description(&self) -> String {
        extract_description(self.fields.description.as_ref())
    }

    pub fn status_name(&self) -> Option<&str> {
        self.fields.status.as_ref().and_then(|s| s.name.as_deref())
    }

    pub fn priority_name(&self) -> Option<&str> {
        self.fields.priority.as_ref().and_then(|p| p.name.as_deref())
    }

    pub fn issue_type(&self) -> &str {
        self.fields
            .issuetype
            .as_ref()
            .and_then(|t| t.name.as_deref())
            .unwrap_or("Task")
    }

    pub fn assignee_label(&self) -> &str {
        self.fields
            .assignee
            .as_ref()
            .map(Assignee::label)
            .unwrap_or("Unassigned")
    }

    pub fn component_names(&self) -> Vec<&str> {
        self.fields
            .components
            .iter()
            .filter_map(|c| c.name.as_deref())
            .collect()
    }

    pub fn status_category(&self) -> StatusCategory {
        let Some(name) = self.status_name() else {
            return StatusCategory::Unknown;
        };
        let name = name.to_lowercase();
        if name.contains("to do") || name.contains("backlog") {
            StatusCategory::Todo
        } else if name.contains("progress") || name.contains("review") {
            StatusCategory::InProgress
        } else if name.contains("done") || name.contains("complete") {
            StatusCategory::Done
        } else {
            StatusCategory::Other
        }
    }

    pub fn priority_level(&self) -> PriorityLevel {
        match self.priority_name().map(str::to_lowercase).as_deref() {
            None => PriorityLevel::Unknown,
            Some("highest") | Some("high") => PriorityLevel::High,
            Some("medium") => PriorityLevel::Medium,
            Some("low") | Some("lowest") => PriorityLevel::Low,
            Some(_) => PriorityLevel::Other,
        }
    }

    /// Payload handed to the Void preview/send endpoints.
    pub fn payload(&self) -> TaskPayload {
        TaskPayload {
            title: self.title().to_string(),
            description: self.description(),
        }
    }

    fn matches(&self, id_or_key: &str) -> bool {
        self.id == id_or_key
            || self
                .key
                .as_deref()
                .is_some_and(|k| k.eq_ignore_ascii_case(id_or_key))
    }
}

#[derive(Debug, Deserialize)]
struct RichText {
    content: Vec<Block>,
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    content: Option<Vec<Inline>>,
}

#[derive(Debug, Deserialize)]
struct Inline {
    #[serde(default)]
    text: Option<String>,
}

/// Plain text of an issue description.
///
/// Plain strings pass through unchanged. Rich-text documents yield the text
/// of their paragraph blocks, one line per paragraph. Anything else
/// (absent, empty, or unreadable) yields [`NO_DESCRIPTION`].
pub fn extract_description(raw: Option<&Value>) -> String {
    match raw {
        Some(Value::String(text)) if !text.is_empty() => text.clone(),
        Some(doc @ Value::Object(map)) if map.contains_key("content") => {
            let Ok(doc) = RichText::deserialize(doc) else {
                return NO_DESCRIPTION.to_string();
            };
            let text = doc
                .content
                .iter()
                .filter(|block| block.kind == "paragraph")
                .map(|block| {
                    block
                        .content
                        .iter()
                        .flatten()
                        .filter_map(|inline| inline.text.as_deref())
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join("\n");
            if text.is_empty() {
                NO_DESCRIPTION.to_string()
            } else {
                text
            }
        }
        _ => NO_DESCRIPTION.to_string(),
    }
}

/// Ordered list of the user's issues, replaced wholesale on every refresh.
#[derive(Debug, Clone, Default)]
pub struct TaskCache {
    issues: Vec<Issue>,
}

impl TaskCache {
    pub fn replace(&mut self, issues: Vec<Issue>) {
        self.issues = issues;
    }

    pub fn clear(&mut self) {
        self.issues.clear();
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Find an issue by id or (case-insensitive) key.
    pub fn find(&self, id_or_key: &str) -> Option<&Issue> {
        self.issues.iter().find(|issue| issue.matches(id_or_key))
    }
}
