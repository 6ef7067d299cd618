//! Backend API façade.
//!
//! [`ApiClient`] owns the [`Pipeline`] and hands out thin per-area wrappers:
//! [`auth::AuthApi`] for the `/auth/` endpoints and
//! [`resources::ResourceApi`] for the generic CRUD collections.

pub mod auth;
pub mod resources;

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::session::{FileSessionStore, SessionEvent, SessionStore};

pub use auth::{AuthApi, AuthOutcome, LoginCredentials, SocialProvider};
pub use resources::{ListQuery, Resource, ResourceApi};

/// Entry point for talking to the backend.
#[derive(Clone)]
pub struct ApiClient {
    pipeline: Arc<Pipeline>,
}

impl ApiClient {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
        }
    }

    /// Builds a client from config, persisting the session under `BIZDESK_HOME`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &Config) -> Result<Self> {
        let store: Arc<dyn SessionStore> = Arc::new(FileSessionStore::default_location());
        Ok(Self::new(Pipeline::from_config(config, store)?))
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn auth(&self) -> AuthApi<'_> {
        AuthApi::new(&self.pipeline)
    }

    pub fn resource(&self, resource: Resource) -> ResourceApi<'_> {
        ResourceApi::new(&self.pipeline, resource)
    }

    /// Subscribes to session lifecycle events (sign-in, refresh, re-auth).
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.pipeline.subscribe()
    }
}
