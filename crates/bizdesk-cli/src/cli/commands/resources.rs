//! Generic resource command handlers.

use anyhow::Result;
use bizdesk_core::api::{ApiClient, ListQuery, Resource};
use serde_json::Value;

use super::{parse_data, parse_pairs, print_json};

pub struct GetOptions<'a> {
    pub resource: &'a str,
    pub id: Option<&'a str>,
    pub ordering: Option<String>,
    pub limit: Option<u32>,
    pub filters: &'a [String],
}

pub fn names() {
    for resource in Resource::all() {
        println!("{resource}");
    }
}

pub async fn get(client: &ApiClient, options: GetOptions<'_>) -> Result<()> {
    let resource: Resource = options.resource.parse()?;
    let api = client.resource(resource);

    if let Some(id) = options.id {
        let item: Value = api.get(id).await?;
        return print_json(&item);
    }

    let query = ListQuery {
        ordering: options.ordering,
        limit: options.limit,
        filters: parse_pairs(options.filters)?,
    };
    let items: Vec<Value> = api.list(&query).await?;
    print_json(&Value::Array(items))
}

pub async fn create(client: &ApiClient, resource: &str, data: &str) -> Result<()> {
    let resource: Resource = resource.parse()?;
    let body = parse_data(data)?;
    let created: Value = client.resource(resource).create(body).await?;
    print_json(&created)
}

pub async fn update(
    client: &ApiClient,
    resource: &str,
    id: &str,
    data: &str,
    partial: bool,
) -> Result<()> {
    let resource: Resource = resource.parse()?;
    let body = parse_data(data)?;
    let api = client.resource(resource);
    let updated: Value = if partial {
        api.partial_update(id, body).await?
    } else {
        api.update(id, body).await?
    };
    print_json(&updated)
}

pub async fn delete(client: &ApiClient, resource: &str, id: &str) -> Result<()> {
    let resource: Resource = resource.parse()?;
    client.resource(resource).delete(id).await?;
    println!("✓ Deleted {resource} {id}");
    Ok(())
}
