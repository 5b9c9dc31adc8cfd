use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::warn;

use super::{DATA_LIST, DATA_OBJECT};
use crate::http_client::Client;
use crate::types::{ConnectionType, PhoneNumber};

pub async fn list_phone_numbers(client: &Client) -> Result<Vec<PhoneNumber>> {
    let resp = client.get("/numbers/account-phones").await?;
    let numbers: Vec<PhoneNumber> = DATA_LIST.unwrap_list(&resp)?;
    for n in &numbers {
        println!(
            "{}: {} [{}]",
            n.id.as_deref().unwrap_or("-"),
            n.phone_number.as_deref().unwrap_or("-"),
            if n.is_available() { "available" } else { "assigned" }
        );
    }
    Ok(numbers)
}

/// The API picks the candidate; nothing is ranked client-side. `None` when
/// the account has no free number.
pub async fn available_phone_number(client: &Client) -> Result<Option<PhoneNumber>> {
    let resp = client.get("/numbers/account-phones/available").await?;
    let phone = match resp.get("phone") {
        Some(p) if p.as_object().is_some_and(|m| !m.is_empty()) => p.clone(),
        _ => {
            warn!("no available phone number returned");
            eprintln!("ERROR: No available phone numbers found");
            return Ok(None);
        }
    };
    let phone: PhoneNumber =
        serde_json::from_value(phone).context("Unexpected available phone shape")?;
    if phone.id.is_none() || phone.phone_number.is_none() {
        anyhow::bail!("available phone response missing id or phone_number");
    }
    println!(
        "Found available: {}",
        phone.phone_number.as_deref().unwrap_or_default()
    );
    Ok(Some(phone))
}

pub async fn assign_phone_number(
    client: &Client,
    phone_number_id: &str,
    connection_id: &str,
    connection_type: ConnectionType,
) -> Result<Value> {
    let resp = client
        .patch(
            &format!("/numbers/account-phones/{}", phone_number_id),
            &json!({
                "connection_id": connection_id,
                "type": connection_type.as_str(),
            }),
        )
        .await?;
    println!("Assigned phone number {}", phone_number_id);
    Ok(DATA_OBJECT.unwrap(&resp))
}
