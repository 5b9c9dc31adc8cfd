use clap::ValueEnum;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Accepts a string or a number for identifier-like fields; the API is not
/// consistent about which one it returns.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Mission {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mission_id: Option<String>,
    pub name: Option<String>,
}

impl Mission {
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_deref().or(self.mission_id.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Run {
    #[serde(default, deserialize_with = "lenient_string")]
    pub run_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    pub status: Option<RunStatus>,
}

impl Run {
    pub fn identifier(&self) -> Option<&str> {
        self.run_id.as_deref().or(self.id.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    Unknown(String),
}

impl<'de> Deserialize<'de> for RunStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Ok(Self::from(value.as_str()))
    }
}

impl Serialize for RunStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl From<&str> for RunStatus {
    fn from(value: &str) -> Self {
        match value {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            "cancelled" => Self::Cancelled,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Unknown(v) => v.as_str(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StepStatus {
    Pending,
    #[value(name = "in_progress")]
    InProgress,
    Completed,
    Skipped,
    Failed,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MissionEvent {
    #[serde(rename = "type")]
    pub event_type: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LinkedAgent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub telnyx_agent_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Assistant {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub assistant_id: Option<String>,
    pub name: Option<String>,
    pub model: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub enabled_features: Vec<String>,
}

impl Assistant {
    pub fn identifier(&self) -> Option<&str> {
        self.id.as_deref().or(self.assistant_id.as_deref())
    }
}

/// Pagination block of the assistant listing. Older API versions report
/// `total`, newer ones `total_results`.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PageMeta {
    pub total_results: Option<u64>,
    pub total: Option<u64>,
    pub total_pages: Option<u64>,
}

impl PageMeta {
    pub fn total_or(&self, returned: usize) -> u64 {
        self.total_results
            .filter(|n| *n > 0)
            .or(self.total.filter(|n| *n > 0))
            .unwrap_or(returned as u64)
    }

    pub fn total_pages(&self) -> u64 {
        self.total_pages.unwrap_or(1)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum Feature {
    Telephony,
    Messaging,
}

impl Feature {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Telephony => "telephony",
            Self::Messaging => "messaging",
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct PhoneNumber {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    pub phone_number: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub connection_id: Option<String>,
}

impl PhoneNumber {
    /// A number with no connection attached is free to assign.
    pub fn is_available(&self) -> bool {
        self.connection_id.as_deref().map_or(true, str::is_empty)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ConnectionType {
    Voice,
    Sms,
}

impl ConnectionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Voice => "voice",
            Self::Sms => "sms",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Call,
    Sms,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ScheduledEvent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    pub status: Option<String>,
    pub call_status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub retry_count: Option<u64>,
}

impl ScheduledEvent {
    pub fn status_line(&self) -> String {
        let mut parts = vec![format!(
            "Status: {}",
            self.status.as_deref().unwrap_or("unknown")
        )];
        if let Some(cs) = &self.call_status {
            parts.push(format!("call_status: {}", cs));
        }
        if let Some(conv) = &self.conversation_id {
            parts.push(format!("conversation_id: {}", conv));
        }
        if let Some(n) = self.retry_count.filter(|n| *n > 0) {
            parts.push(format!("retry_count: {}", n));
        }
        parts.join(", ")
    }

    pub fn list_line(&self) -> String {
        let mut line = format!(
            "{}: {}",
            self.id.as_deref().unwrap_or("-"),
            self.status.as_deref().unwrap_or("-")
        );
        if let Some(cs) = &self.call_status {
            line.push_str(&format!(", call_status={}", cs));
        }
        line
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Insight {
    pub status: Option<String>,
    #[serde(default)]
    pub conversation_insights: Vec<ConversationInsight>,
}

impl Insight {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ConversationInsight {
    #[serde(default)]
    pub result: serde_json::Value,
}
