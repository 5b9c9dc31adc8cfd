use anyhow::Result;
use serde_json::Value;

use super::DATA_LIST;
use crate::http_client::Client;
use crate::types::Insight;

pub async fn conversation_insights(client: &Client, conversation_id: &str) -> Result<Vec<Insight>> {
    let resp = client
        .get(&format!(
            "/missions/conversations/{}/insights",
            conversation_id
        ))
        .await?;
    let insights: Vec<Insight> = DATA_LIST.unwrap_list(&resp)?;
    for result in completed_results(&insights) {
        println!("Insight: {}", display_result(result));
    }
    Ok(insights)
}

/// Results of every nested insight, only from entries whose analysis has
/// completed.
pub fn completed_results(insights: &[Insight]) -> Vec<&Value> {
    insights
        .iter()
        .filter(|i| i.is_completed())
        .flat_map(|i| i.conversation_insights.iter().map(|ci| &ci.result))
        .collect()
}

fn display_result(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
