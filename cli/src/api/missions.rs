use anyhow::{Context, Result};
use serde_json::{json, Value};

use super::{identifier, print_json, MISSION, MISSION_LIST};
use crate::http_client::Client;
use crate::types::Mission;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

pub async fn create_mission(client: &Client, name: &str, instructions: &str) -> Result<String> {
    let resp = client
        .post(
            "/missions",
            &json!({ "name": name, "instructions": instructions }),
        )
        .await?;
    let id = identifier(&MISSION.unwrap(&resp), &["id", "mission_id"])
        .context("create mission response missing id")?;
    println!("Created mission: {}", id);
    Ok(id)
}

pub async fn get_mission(client: &Client, mission_id: &str) -> Result<Value> {
    let resp = client.get(&format!("/missions/{}", mission_id)).await?;
    let mission = MISSION.unwrap(&resp);
    print_json(&mission)?;
    Ok(mission)
}

pub async fn list_missions(client: &Client, page_size: u32) -> Result<Vec<Mission>> {
    let resp = client
        .get(&format!("/missions?page[size]={}", page_size))
        .await?;
    let missions: Vec<Mission> = MISSION_LIST.unwrap_list(&resp)?;
    for m in &missions {
        println!(
            "{}: {}",
            m.identifier().unwrap_or("-"),
            m.name.as_deref().unwrap_or("unnamed")
        );
    }
    Ok(missions)
}
