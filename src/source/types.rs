//! Upstream records as returned by the ClickUp v2 API.
//!
//! ClickUp is loose about JSON types: ids are sometimes numbers, timestamps
//! are epoch-millisecond strings, and `orderindex` flips between the two.
//! The `de` helpers normalise those on the way in.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Team {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub members: Vec<Member>,
}

/// Team membership wrapper (`{"user": {...}}`).
#[derive(Debug, Clone, Deserialize)]
pub struct Member {
    pub user: UserRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRef {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Space {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// Minimal `{id, name}` reference embedded in other records.
#[derive(Debug, Clone, Deserialize)]
pub struct ContainerRef {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Folder {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub space: Option<ContainerRef>,
}

/// A ClickUp list. Mirrors to a sprint.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskList {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "de::opt_millis")]
    pub start_date: Option<i64>,
    #[serde(default, deserialize_with = "de::opt_millis")]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub space: Option<ContainerRef>,
    #[serde(default)]
    pub folder: Option<ContainerRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "de::opt_int")]
    pub orderindex: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskPriority {
    #[serde(default)]
    pub priority: Option<String>,
}

/// A custom field value attached to a task.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskField {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Task {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "de::opt_millis")]
    pub date_created: Option<i64>,
    #[serde(default, deserialize_with = "de::opt_millis")]
    pub date_updated: Option<i64>,
    #[serde(default, deserialize_with = "de::opt_millis")]
    pub date_closed: Option<i64>,
    #[serde(default, deserialize_with = "de::opt_millis")]
    pub due_date: Option<i64>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub creator: Option<UserRef>,
    #[serde(default)]
    pub assignees: Vec<UserRef>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub parent: Option<String>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub top_level_parent: Option<String>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub points: Option<f64>,
    #[serde(default, deserialize_with = "de::opt_int")]
    pub time_estimate: Option<i64>,
    #[serde(default)]
    pub custom_fields: Vec<TaskField>,
    #[serde(default, deserialize_with = "de::opt_int")]
    pub custom_item_id: Option<i64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub list: Option<ContainerRef>,
    #[serde(default)]
    pub space: Option<ContainerRef>,
}

/// A custom task type (`custom_item`).
#[derive(Debug, Clone, Deserialize)]
pub struct CustomItem {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A custom field definition at workspace/space/folder/list scope.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldDefinition {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub field_type: Option<String>,
}

// ── Response envelopes ─────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct TeamsEnvelope {
    #[serde(default)]
    pub teams: Vec<Team>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SpacesEnvelope {
    #[serde(default)]
    pub spaces: Vec<Space>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FoldersEnvelope {
    #[serde(default)]
    pub folders: Vec<Folder>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListsEnvelope {
    #[serde(default)]
    pub lists: Vec<TaskList>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TasksEnvelope {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CustomItemsEnvelope {
    #[serde(default)]
    pub custom_items: Vec<CustomItem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FieldsEnvelope {
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

mod de {
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn value_to_id(value: Value) -> Option<String> {
        match value {
            Value::String(s) if !s.is_empty() => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    fn value_to_int(value: Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
    }

    pub fn id<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        value_to_id(Value::deserialize(d)?).ok_or_else(|| D::Error::custom("missing or empty id"))
    }

    pub fn opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(value_to_id(Value::deserialize(d)?))
    }

    pub fn opt_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(value_to_int(Value::deserialize(d)?))
    }

    /// Epoch-millisecond timestamps; ClickUp sends them as strings.
    pub fn opt_millis<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
        Ok(value_to_int(Value::deserialize(d)?).filter(|ms| *ms > 0))
    }
}
