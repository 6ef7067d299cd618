//! Auth command handlers.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use bizdesk_core::api::{ApiClient, AuthOutcome, LoginCredentials, SocialProvider};
use bizdesk_core::config::paths;
use bizdesk_core::session::mask_token;

use super::{parse_fields, print_json};

pub async fn login(
    client: &ApiClient,
    email: Option<String>,
    username: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_password()?,
    };
    let credentials = match (email, username) {
        (Some(email), None) => LoginCredentials::with_email(email, password),
        (None, Some(username)) => LoginCredentials::with_username(username, password),
        _ => anyhow::bail!("Please specify --email or --username"),
    };

    let outcome = client.auth().login(&credentials).await?;
    report_sign_in(client, &outcome)
}

pub fn logout(client: &ApiClient) -> Result<()> {
    if client.auth().logout()? {
        println!("✓ Logged out");
        println!("  Session removed from: {}", paths::session_path().display());
    } else {
        println!("Not logged in (no session found).");
    }
    Ok(())
}

pub async fn whoami(client: &ApiClient) -> Result<()> {
    if client.pipeline().session()?.is_none() {
        anyhow::bail!("Not logged in. Run 'bizdesk login' first.");
    }
    let profile = client.auth().profile().await.context("fetch profile")?;
    print_json(&profile)
}

pub async fn register(client: &ApiClient, fields: &[String]) -> Result<()> {
    let payload = parse_fields(fields)?;
    let outcome = client.auth().register(payload).await?;
    if outcome.signed_in {
        report_sign_in(client, &outcome)
    } else {
        println!("✓ Account registered. Run 'bizdesk login' to sign in.");
        Ok(())
    }
}

pub async fn social_login(client: &ApiClient, provider: &str, token: &str) -> Result<()> {
    let provider: SocialProvider = provider.parse()?;
    let outcome = client.auth().social_login(provider, token).await?;
    if !outcome.signed_in {
        anyhow::bail!("{provider} sign-in succeeded but the backend returned no session tokens");
    }
    report_sign_in(client, &outcome)
}

pub async fn otp_request(client: &ApiClient, phone: &str) -> Result<()> {
    client.auth().request_phone_otp(phone).await?;
    println!("✓ Code sent to {phone}");
    println!("  Run 'bizdesk otp verify --phone {phone} --code <CODE>' to sign in.");
    Ok(())
}

pub async fn otp_verify(client: &ApiClient, phone: &str, code: &str) -> Result<()> {
    let outcome = client.auth().verify_phone_otp(phone, code).await?;
    if !outcome.signed_in {
        anyhow::bail!("Code accepted but the backend returned no session tokens");
    }
    report_sign_in(client, &outcome)
}

pub async fn change_password(client: &ApiClient, old: &str, new: &str) -> Result<()> {
    client.auth().change_password(old, new).await?;
    println!("✓ Password changed");
    Ok(())
}

fn report_sign_in(client: &ApiClient, outcome: &AuthOutcome) -> Result<()> {
    let token = client
        .pipeline()
        .session()?
        .map(|s| mask_token(&s.access))
        .unwrap_or_default();
    println!("✓ Logged in (token: {token})");
    if let Some(name) = outcome
        .user
        .as_ref()
        .and_then(|u| u.get("email").or_else(|| u.get("username")))
        .and_then(|v| v.as_str())
    {
        println!("  User: {name}");
    }
    println!("  Session saved to: {}", paths::session_path().display());
    Ok(())
}

fn read_password() -> Result<String> {
    print!("Password: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    let password = input.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("Password cannot be empty");
    }
    Ok(password)
}
