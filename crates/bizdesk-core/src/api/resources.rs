//! Generic CRUD over the backend's resource collections.
//!
//! Every collection follows the same REST convention:
//! `/<name>/` for list and create, `/<name>/<id>/` for the item.
//! Lists accept `ordering` and `limit` query parameters and may come back
//! either as a bare array or wrapped as `{"results": [...]}`.

use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::pipeline::{Pipeline, RequestDescriptor};

/// Backend resource collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Projects,
    Tasks,
    TimeEntries,
    Proposals,
    Invoices,
    Expenses,
    Clients,
    ProjectRequests,
    Notifications,
    UserInvitations,
    Settings,
}

impl Resource {
    /// Returns all resources for iteration (e.g., in help output).
    pub fn all() -> &'static [Resource] {
        &[
            Resource::Projects,
            Resource::Tasks,
            Resource::TimeEntries,
            Resource::Proposals,
            Resource::Invoices,
            Resource::Expenses,
            Resource::Clients,
            Resource::ProjectRequests,
            Resource::Notifications,
            Resource::UserInvitations,
            Resource::Settings,
        ]
    }

    /// Kebab-case name, identical to the URL segment.
    pub fn name(self) -> &'static str {
        match self {
            Resource::Projects => "projects",
            Resource::Tasks => "tasks",
            Resource::TimeEntries => "time-entries",
            Resource::Proposals => "proposals",
            Resource::Invoices => "invoices",
            Resource::Expenses => "expenses",
            Resource::Clients => "clients",
            Resource::ProjectRequests => "project-requests",
            Resource::Notifications => "notifications",
            Resource::UserInvitations => "user-invitations",
            Resource::Settings => "settings",
        }
    }

    pub fn collection_path(self) -> String {
        format!("/{}/", self.name())
    }

    pub fn item_path(self, id: impl fmt::Display) -> String {
        format!("/{}/{id}/", self.name())
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Resource {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        Resource::all()
            .iter()
            .copied()
            .find(|r| r.name() == normalized)
            .ok_or_else(|| {
                let names: Vec<&str> = Resource::all().iter().map(|r| r.name()).collect();
                anyhow::anyhow!("Unknown resource '{s}'. Expected one of: {}", names.join(", "))
            })
    }
}

/// Query options for list calls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListQuery {
    /// Backend ordering expression, e.g. `-created_at`.
    pub ordering: Option<String>,
    pub limit: Option<u32>,
    /// Extra `key=value` filters passed through verbatim.
    pub filters: Vec<(String, String)>,
}

impl ListQuery {
    #[must_use]
    pub fn ordering(mut self, ordering: impl Into<String>) -> Self {
        self.ordering = Some(ordering.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    fn apply(&self, mut request: RequestDescriptor) -> RequestDescriptor {
        if let Some(ordering) = &self.ordering {
            request = request.query("ordering", ordering.as_str());
        }
        if let Some(limit) = self.limit {
            request = request.query("limit", limit.to_string());
        }
        for (key, value) in &self.filters {
            request = request.query(key.as_str(), value.as_str());
        }
        request
    }
}

/// Unwraps a list payload: either a bare array or `{"results": [...]}`.
///
/// # Errors
/// Returns [`crate::error::ApiError::Decode`] for any other shape.
pub fn unwrap_list<T: DeserializeOwned>(payload: Value) -> Result<Vec<T>> {
    let items = match payload {
        Value::Object(mut map) if map.get("results").is_some_and(Value::is_array) => {
            map.remove("results").unwrap_or_default()
        }
        other => other,
    };
    Ok(serde_json::from_value(items)?)
}

/// CRUD wrapper for one resource collection.
pub struct ResourceApi<'a> {
    pipeline: &'a Pipeline,
    resource: Resource,
}

impl<'a> ResourceApi<'a> {
    pub fn new(pipeline: &'a Pipeline, resource: Resource) -> Self {
        Self { pipeline, resource }
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    /// # Errors
    /// Any pipeline error, or `Decode` if the payload is not a list.
    pub async fn list<T: DeserializeOwned>(&self, query: &ListQuery) -> Result<Vec<T>> {
        let request = query.apply(RequestDescriptor::get(self.resource.collection_path()));
        let payload: Value = self.pipeline.send_json(&request).await?;
        unwrap_list(payload)
    }

    /// # Errors
    /// Any pipeline error, or `Decode` if the payload does not match `T`.
    pub async fn get<T: DeserializeOwned>(&self, id: impl fmt::Display) -> Result<T> {
        let request = RequestDescriptor::get(self.resource.item_path(id));
        self.pipeline.send_json(&request).await
    }

    /// # Errors
    /// Any pipeline error, or `Decode` if the payload does not match `T`.
    pub async fn create<T: DeserializeOwned>(&self, body: Value) -> Result<T> {
        let request = RequestDescriptor::post(self.resource.collection_path()).json(body);
        self.pipeline.send_json(&request).await
    }

    /// Full replacement (`PUT`).
    ///
    /// # Errors
    /// Any pipeline error, or `Decode` if the payload does not match `T`.
    pub async fn update<T: DeserializeOwned>(
        &self,
        id: impl fmt::Display,
        body: Value,
    ) -> Result<T> {
        let request = RequestDescriptor::put(self.resource.item_path(id)).json(body);
        self.pipeline.send_json(&request).await
    }

    /// Partial update (`PATCH`).
    ///
    /// # Errors
    /// Any pipeline error, or `Decode` if the payload does not match `T`.
    pub async fn partial_update<T: DeserializeOwned>(
        &self,
        id: impl fmt::Display,
        body: Value,
    ) -> Result<T> {
        let request = RequestDescriptor::patch(self.resource.item_path(id)).json(body);
        self.pipeline.send_json(&request).await
    }

    /// # Errors
    /// Any pipeline error.
    pub async fn delete(&self, id: impl fmt::Display) -> Result<()> {
        let request = RequestDescriptor::delete(self.resource.item_path(id));
        self.pipeline.send_empty(&request).await
    }
}
