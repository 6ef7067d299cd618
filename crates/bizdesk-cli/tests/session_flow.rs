//! End-to-end tests for login, token refresh and logout through the binary.
//!
//! Each test gets its own BIZDESK_HOME and a wiremock backend.

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn temp_home() -> TempDir {
    TempDir::new().expect("create temp bizdesk home")
}

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

fn write_session(home: &Path, access: &str, refresh: &str) {
    fs::write(
        home.join("session.json"),
        json!({"access": access, "refresh": refresh}).to_string(),
    )
    .unwrap();
}

fn read_session(home: &Path) -> Option<Value> {
    let contents = fs::read_to_string(home.join("session.json")).ok()?;
    Some(serde_json::from_str(&contents).unwrap())
}

#[tokio::test]
async fn test_login_persists_session() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .and(body_json(json!({"email": "ana@example.com", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access": "A1-access-token-value",
            "refresh": "R1",
            "user": {"email": "ana@example.com"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("bizdesk")
        .env("BIZDESK_HOME", home.path())
        .env("BIZDESK_API_URL", server.uri())
        .env_remove("BIZDESK_PASSWORD")
        .args(["login", "--email", "ana@example.com", "--password", "secret"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged in"))
        .stdout(predicate::str::contains("ana@example.com"))
        .stdout(predicate::str::contains("A1-access-token-value").not());

    let session = read_session(home.path()).expect("session saved");
    assert_eq!(session["access"], "A1-access-token-value");
    assert_eq!(session["refresh"], "R1");
}

#[tokio::test]
async fn test_login_reads_password_from_stdin() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login/"))
        .and(body_json(json!({"username": "ana", "password": "from-stdin"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access": "A1", "refresh": "R1"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("bizdesk")
        .env("BIZDESK_HOME", home.path())
        .env("BIZDESK_API_URL", server.uri())
        .env_remove("BIZDESK_PASSWORD")
        .args(["login", "--username", "ana"])
        .write_stdin("from-stdin\n")
        .assert()
        .success();

    assert!(read_session(home.path()).is_some());
}

#[tokio::test]
async fn test_expired_token_refreshes_transparently() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    write_session(home.path(), "A1", "R1");
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/projects/"))
        .and(header("authorization", "Bearer A1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .and(body_json(json!({"refresh": "R1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access": "A2"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/projects/"))
        .and(header("authorization", "Bearer A2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [{"id": 1, "name": "Harbour office fit-out"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("bizdesk")
        .env("BIZDESK_HOME", home.path())
        .env("BIZDESK_API_URL", server.uri())
        .args(["get", "projects", "--ordering", "-created_at", "--limit", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Harbour office fit-out"));

    let session = read_session(home.path()).expect("session kept");
    assert_eq!(session["access"], "A2");
    assert_eq!(session["refresh"], "R1");
}

#[tokio::test]
async fn test_failed_refresh_removes_session_and_asks_for_login() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    write_session(home.path(), "A1", "R1");
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/invoices/12/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/token/refresh/"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"detail": "Token is blacklisted"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("bizdesk")
        .env("BIZDESK_HOME", home.path())
        .env("BIZDESK_API_URL", server.uri())
        .args(["get", "invoices", "12"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Authentication failed"))
        .stderr(predicate::str::contains("bizdesk login"));

    assert!(read_session(home.path()).is_none());
}

#[tokio::test]
async fn test_backend_errors_are_shown_verbatim() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = temp_home();
    write_session(home.path(), "A1", "R1");
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/expenses/"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(r#"{"amount":["A valid number is required."]}"#),
        )
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("bizdesk")
        .env("BIZDESK_HOME", home.path())
        .env("BIZDESK_API_URL", server.uri())
        .args(["create", "expenses", "--data", r#"{"amount":"x"}"#])
        .assert()
        .failure()
        .stderr(predicate::str::contains("HTTP 400"))
        .stderr(predicate::str::contains("A valid number is required."))
        .stderr(predicate::str::contains("bizdesk login").not());

    assert!(read_session(home.path()).is_some());
}

#[test]
fn test_logout_removes_session() {
    let home = temp_home();
    write_session(home.path(), "A1", "R1");

    cargo_bin_cmd!("bizdesk")
        .env("BIZDESK_HOME", home.path())
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logged out"));

    assert!(read_session(home.path()).is_none());

    cargo_bin_cmd!("bizdesk")
        .env("BIZDESK_HOME", home.path())
        .arg("logout")
        .assert()
        .success()
        .stdout(predicate::str::contains("Not logged in"));
}

#[test]
fn test_whoami_requires_session() {
    let home = temp_home();

    cargo_bin_cmd!("bizdesk")
        .env("BIZDESK_HOME", home.path())
        .env("BIZDESK_API_URL", "http://127.0.0.1:1")
        .arg("whoami")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not logged in"));
}
