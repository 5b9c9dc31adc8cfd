use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{encode, identifier, print_json, ASSISTANT, ASSISTANT_LIST};
use crate::http_client::Client;
use crate::types::{Assistant, Feature, PageMeta};

pub const DEFAULT_MODEL: &str = "openai/gpt-4o";
pub const DEFAULT_FEATURES: [&str; 2] = ["telephony", "messaging"];
pub const DEFAULT_PAGE_SIZE: u32 = 25;

/// Hangup plus DTMF, used when the caller supplies no tools.
pub fn default_tools() -> Vec<Value> {
    vec![
        json!({
            "type": "hangup",
            "hangup": {
                "description": "To be used whenever the conversation has ended and it would be appropriate to hangup the call."
            }
        }),
        json!({
            "type": "send_dtmf",
            "send_dtmf": {}
        }),
    ]
}

/// Optional knobs of `create-assistant`, read from its options JSON.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssistantOptions {
    #[serde(default, alias = "enabled_features")]
    pub features: Option<Vec<String>>,
    pub model: Option<String>,
    pub tools: Option<Vec<Value>>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAssistant {
    pub name: String,
    pub model: String,
    pub instructions: String,
    pub greeting: String,
    pub tools: Vec<Value>,
    pub enabled_features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl NewAssistant {
    pub fn new(
        name: impl Into<String>,
        instructions: impl Into<String>,
        greeting: impl Into<String>,
        options: AssistantOptions,
    ) -> Self {
        Self {
            name: name.into(),
            model: options.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            instructions: instructions.into(),
            greeting: greeting.into(),
            tools: options.tools.unwrap_or_else(default_tools),
            enabled_features: options
                .features
                .filter(|f| !f.is_empty())
                .unwrap_or_else(|| DEFAULT_FEATURES.iter().map(|f| f.to_string()).collect()),
            description: options.description.filter(|d| !d.is_empty()),
        }
    }
}

pub async fn create_assistant(client: &Client, assistant: &NewAssistant) -> Result<String> {
    let body = serde_json::to_value(assistant)?;
    let resp = client.post("/assistants", &body).await?;
    let id = identifier(&ASSISTANT.unwrap(&resp), &["id", "assistant_id"])
        .context("create assistant response missing id")?;
    println!("Created assistant: {}", id);
    Ok(id)
}

#[derive(Debug, Clone)]
pub struct ListAssistants {
    pub page_size: u32,
    /// 1-indexed.
    pub page: u32,
    pub name: Option<String>,
}

impl Default for ListAssistants {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page: 1,
            name: None,
        }
    }
}

impl ListAssistants {
    fn path(&self) -> String {
        let mut path = format!("/assistants?pageSize={}&page={}", self.page_size, self.page);
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            path.push_str(&format!("&name={}", encode(name)));
        }
        path
    }
}

#[derive(Debug, Clone)]
pub struct AssistantPage {
    pub assistants: Vec<Assistant>,
    pub page: u32,
    pub total: u64,
    pub total_pages: u64,
}

pub async fn list_assistants(client: &Client, query: &ListAssistants) -> Result<AssistantPage> {
    let resp = client.get(&query.path()).await?;
    let assistants: Vec<Assistant> = ASSISTANT_LIST.unwrap_list(&resp)?;
    let meta: PageMeta = match resp.get("meta") {
        Some(m) if m.is_object() => {
            serde_json::from_value(m.clone()).context("Unexpected pagination meta")?
        }
        _ => PageMeta::default(),
    };

    for a in &assistants {
        println!(
            "{}: {} (model={}, features={:?})",
            a.identifier().unwrap_or("-"),
            a.name.as_deref().unwrap_or("unnamed"),
            a.model.as_deref().unwrap_or(""),
            a.enabled_features
        );
    }

    let page = AssistantPage {
        total: meta.total_or(assistants.len()),
        total_pages: meta.total_pages(),
        page: query.page,
        assistants,
    };
    eprintln!(
        "\nPage {}/{} ({} total)",
        page.page, page.total_pages, page.total
    );
    Ok(page)
}

pub async fn get_assistant(client: &Client, assistant_id: &str) -> Result<Value> {
    let resp = client.get(&format!("/assistants/{}", assistant_id)).await?;
    let assistant = ASSISTANT.unwrap(&resp);
    print_json(&assistant)?;
    Ok(assistant)
}

pub async fn update_assistant(
    client: &Client,
    assistant_id: &str,
    updates: &Value,
) -> Result<Value> {
    let resp = client
        .patch(&format!("/assistants/{}", assistant_id), updates)
        .await?;
    println!("Updated assistant {}", assistant_id);
    Ok(ASSISTANT.unwrap(&resp))
}

/// Telephony resolves to the TeXML app id, messaging to the messaging
/// profile id. A missing id is reported, not treated as a failure.
pub async fn connection_id(
    client: &Client,
    assistant_id: &str,
    feature: Feature,
) -> Result<Option<String>> {
    let resp = client
        .get(&format!(
            "/assistants/{}/connection-id?feature={}",
            assistant_id,
            feature.as_str()
        ))
        .await?;
    let conn = match resp.get("connection_id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    match &conn {
        Some(id) => println!("Connection ID: {}", id),
        None => eprintln!("No connection ID found for {}", feature.as_str()),
    }
    Ok(conn)
}
