//! User management command handlers.

use anyhow::Result;
use bizdesk_core::api::ApiClient;
use serde_json::Value;

use super::{parse_fields, print_json};

pub async fn list(client: &ApiClient) -> Result<()> {
    let users = client.auth().users().await?;
    print_json(&Value::Array(users))
}

pub async fn update(client: &ApiClient, id: &str, fields: &[String]) -> Result<()> {
    let payload = parse_fields(fields)?;
    let user = client.auth().update_user(id, payload).await?;
    print_json(&user)
}
