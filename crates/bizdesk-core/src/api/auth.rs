//! `/auth/` endpoints: login, registration, profile, users, password,
//! social and phone-OTP sign-in.
//!
//! Every endpoint that hands out tokens stores them through the pipeline so
//! later requests pick them up. Sign-in style requests are sent anonymously.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Result;
use crate::pipeline::{Pipeline, RequestDescriptor};
use crate::session::Session;

use super::resources::unwrap_list;

/// Login payload. The backend accepts either an email or a username.
#[derive(Debug, Clone, Serialize)]
pub struct LoginCredentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password: String,
}

impl LoginCredentials {
    pub fn with_email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            username: None,
            password: password.into(),
        }
    }

    pub fn with_username(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: None,
            username: Some(username.into()),
            password: password.into(),
        }
    }
}

/// Third-party identity providers with a token-exchange endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialProvider {
    Google,
    Microsoft,
    Apple,
}

impl SocialProvider {
    pub fn name(self) -> &'static str {
        match self {
            SocialProvider::Google => "google",
            SocialProvider::Microsoft => "microsoft",
            SocialProvider::Apple => "apple",
        }
    }

    fn path(self) -> String {
        format!("/auth/{}/", self.name())
    }
}

impl fmt::Display for SocialProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SocialProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(SocialProvider::Google),
            "microsoft" => Ok(SocialProvider::Microsoft),
            "apple" => Ok(SocialProvider::Apple),
            other => anyhow::bail!(
                "Unknown social provider '{other}'. Expected google, microsoft or apple"
            ),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenPair {
    access: String,
    refresh: String,
}

/// Result of an endpoint that may sign the user in.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    /// Whether a token pair was found and stored.
    pub signed_in: bool,
    /// The `user` object, when the backend includes one.
    pub user: Option<Value>,
    /// Full response payload.
    pub payload: Value,
}

/// Token pairs arrive either at the top level or nested under `tokens`.
fn token_source(payload: &Value) -> &Value {
    payload
        .get("tokens")
        .filter(|v| v.is_object())
        .unwrap_or(payload)
}

/// Wrapper for the `/auth/` endpoints.
pub struct AuthApi<'a> {
    pipeline: &'a Pipeline,
}

impl<'a> AuthApi<'a> {
    pub fn new(pipeline: &'a Pipeline) -> Self {
        Self { pipeline }
    }

    /// Logs in and stores the returned session.
    ///
    /// # Errors
    /// Any pipeline error, or `Decode` if the response carries no token pair.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<AuthOutcome> {
        let request = RequestDescriptor::post("/auth/login/")
            .json(serde_json::to_value(credentials)?)
            .anonymous();
        let payload: Value = self.pipeline.send_json(&request).await?;
        let tokens: TokenPair = serde_json::from_value(token_source(&payload).clone())?;
        self.pipeline
            .sign_in(&Session::new(tokens.access, tokens.refresh))?;
        Ok(AuthOutcome {
            signed_in: true,
            user: payload.get("user").cloned(),
            payload,
        })
    }

    /// Registers an account. Signs in if the backend returns tokens.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn register(&self, payload: Value) -> Result<AuthOutcome> {
        let request = RequestDescriptor::post("/auth/register/")
            .json(payload)
            .anonymous();
        self.sign_in_from(&request).await
    }

    /// Exchanges a provider token for a backend session.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn social_login(
        &self,
        provider: SocialProvider,
        access_token: &str,
    ) -> Result<AuthOutcome> {
        let request = RequestDescriptor::post(provider.path())
            .json(json!({ "access_token": access_token }))
            .anonymous();
        self.sign_in_from(&request).await
    }

    /// Asks the backend to text a one-time code to `phone_number`.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn request_phone_otp(&self, phone_number: &str) -> Result<Value> {
        let request = RequestDescriptor::post("/auth/phone/send-otp/")
            .json(json!({ "phone_number": phone_number }))
            .anonymous();
        self.pipeline.send_json(&request).await
    }

    /// Verifies a one-time code and signs in with the returned tokens.
    ///
    /// # Errors
    /// Any pipeline error.
    pub async fn verify_phone_otp(&self, phone_number: &str, otp: &str) -> Result<AuthOutcome> {
        let request = RequestDescriptor::post("/auth/phone/verify-otp/")
            .json(json!({ "phone_number": phone_number, "otp": otp }))
            .anonymous();
        self.sign_in_from(&request).await
    }

    /// Clears the local session. Returns true if one existed.
    ///
    /// # Errors
    /// Returns `Session` if the store cannot be modified.
    pub fn logout(&self) -> Result<bool> {
        self.pipeline.sign_out()
    }

    /// # Errors
    /// Any pipeline error.
    pub async fn profile(&self) -> Result<Value> {
        self.pipeline
            .send_json(&RequestDescriptor::get("/auth/profile/"))
            .await
    }

    /// # Errors
    /// Any pipeline error.
    pub async fn update_profile(&self, payload: Value) -> Result<Value> {
        self.pipeline
            .send_json(&RequestDescriptor::put("/auth/profile/").json(payload))
            .await
    }

    /// # Errors
    /// Any pipeline error, or `Decode` if the payload is not a list.
    pub async fn users(&self) -> Result<Vec<Value>> {
        let payload: Value = self
            .pipeline
            .send_json(&RequestDescriptor::get("/auth/users/"))
            .await?;
        unwrap_list(payload)
    }

    /// # Errors
    /// Any pipeline error.
    pub async fn update_user(&self, id: impl fmt::Display, payload: Value) -> Result<Value> {
        let request = RequestDescriptor::patch(format!("/auth/users/{id}/")).json(payload);
        self.pipeline.send_json(&request).await
    }

    /// # Errors
    /// Any pipeline error.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<()> {
        let request = RequestDescriptor::post("/auth/change-password/").json(json!({
            "old_password": old_password,
            "new_password": new_password,
        }));
        self.pipeline.send_empty(&request).await
    }

    async fn sign_in_from(&self, request: &RequestDescriptor) -> Result<AuthOutcome> {
        let payload: Value = self.pipeline.send_json(request).await?;
        let tokens = serde_json::from_value::<TokenPair>(token_source(&payload).clone()).ok();
        let signed_in = tokens.is_some();
        if let Some(tokens) = tokens {
            self.pipeline
                .sign_in(&Session::new(tokens.access, tokens.refresh))?;
        }
        Ok(AuthOutcome {
            signed_in,
            user: payload.get("user").cloned(),
            payload,
        })
    }
}
