//! End-to-end exercise of the authentication exchange and vacancy API
//! against a live Postgres and a spawned server binary.
//!
//! Requires `INVITI_TEST_DSN` pointing at a scratch database; the test is
//! skipped when it is not set.

use anyhow::{bail, ensure, Context, Result};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use std::{
    env,
    net::TcpListener,
    process::{Child, Command, Stdio},
    time::Duration,
};
use tokio::{task::JoinSet, time::sleep};
use uuid::Uuid;

const SIGNING_KEY: &str =
    "integration-test-signing-key-0123456789-0123456789-0123456789-0123456789";

#[derive(Debug, Deserialize)]
struct Credential {
    access_token: String,
    user_id: u64,
    can_manage_permissions: bool,
    can_manage_vacancies: bool,
}

#[derive(Debug, Deserialize)]
struct EmittedSecret {
    secret: String,
}

#[derive(Debug, Deserialize)]
struct OpenedVacancy {
    id: Uuid,
}

#[derive(Debug, Deserialize)]
struct VacancyHeader {
    id: Uuid,
    title: String,
}

struct ChildGuard(Child);

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn pick_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("Failed to bind a local port")?;
    Ok(listener
        .local_addr()
        .context("Failed to read local port")?
        .port())
}

async fn prepare_database(dsn: &str) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(dsn)
        .await
        .context("Failed to connect to test database")?;

    sqlx::raw_sql(include_str!("../db/sql/01_inviti.sql"))
        .execute(&pool)
        .await
        .context("Failed to apply schema")?;

    // Leftovers from a previous run would suppress bootstrap seeding.
    sqlx::raw_sql("TRUNCATE authentication_tokens, vacancies")
        .execute(&pool)
        .await
        .context("Failed to truncate tables")?;

    Ok(())
}

fn spawn_inviti(port: u16, dsn: &str, first_secret: &str) -> Result<ChildGuard> {
    let mut command = Command::new(env!("CARGO_BIN_EXE_inviti"));
    // Default to info logs so CI failures include useful context.
    if env::var("INVITI_LOG_LEVEL").is_err() {
        command.env("INVITI_LOG_LEVEL", "info");
    }
    let child = command
        .env("INVITI_SIGNING_KEY", SIGNING_KEY)
        .env("INVITI_FIRST_SECRET", first_secret)
        .args(["--port", &port.to_string(), "--dsn", dsn])
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .context("Failed to spawn inviti binary")?;
    Ok(ChildGuard(child))
}

async fn wait_until_ready(client: &reqwest::Client, base: &str) -> Result<()> {
    for _ in 0..50 {
        if let Ok(response) = client.get(format!("{base}/health")).send().await {
            if response.status() == StatusCode::OK {
                return Ok(());
            }
        }
        sleep(Duration::from_millis(200)).await;
    }
    bail!("Server did not become ready in time");
}

async fn authenticate(
    client: &reqwest::Client,
    base: &str,
    user_id: u64,
    secret: &str,
) -> Result<reqwest::Response> {
    client
        .post(format!("{base}/authentication/token"))
        .json(&json!({ "user_id": user_id, "secret": secret }))
        .send()
        .await
        .context("Authentication request failed")
}

#[tokio::test(flavor = "multi_thread")]
async fn authentication_exchange_and_vacancy_flow() -> Result<()> {
    let Ok(dsn) = env::var("INVITI_TEST_DSN") else {
        eprintln!("Skipping integration test: INVITI_TEST_DSN is not set");
        return Ok(());
    };

    prepare_database(&dsn).await?;

    let port = pick_port()?;
    let first_secret = Uuid::new_v4().to_string();
    let _server = spawn_inviti(port, &dsn, &first_secret)?;

    let client = reqwest::Client::new();
    let base = format!("http://127.0.0.1:{port}");
    wait_until_ready(&client, &base).await?;

    // Bootstrap: the seeded first secret grants both permissions.
    let response = authenticate(&client, &base, 1, &first_secret).await?;
    ensure!(
        response.status() == StatusCode::OK,
        "Bootstrap exchange failed: {}",
        response.status()
    );
    let admin: Credential = response.json().await.context("Bootstrap credential")?;
    ensure!(admin.user_id == 1, "Echoed user id mismatch");
    ensure!(admin.can_manage_permissions, "Bootstrap must manage permissions");
    ensure!(admin.can_manage_vacancies, "Bootstrap must manage vacancies");

    // The bootstrap secret is gone after one use.
    let replay = authenticate(&client, &base, 1, &first_secret).await?;
    ensure!(
        replay.status() == StatusCode::FORBIDDEN,
        "Replayed bootstrap secret must be rejected: {}",
        replay.status()
    );

    // Emitting a secret with no permissions is a validation error.
    let response = client
        .post(format!("{base}/authentication/secret"))
        .bearer_auth(&admin.access_token)
        .json(&json!({ "can_manage_vacancies": false, "can_manage_permissions": false }))
        .send()
        .await?;
    ensure!(
        response.status() == StatusCode::BAD_REQUEST,
        "Zero-permission secret must be rejected: {}",
        response.status()
    );

    // Emitting without a credential is rejected outright.
    let response = client
        .post(format!("{base}/authentication/secret"))
        .json(&json!({ "can_manage_vacancies": true }))
        .send()
        .await?;
    ensure!(
        response.status() == StatusCode::UNAUTHORIZED,
        "Anonymous emission must be rejected: {}",
        response.status()
    );

    // Mint a vacancies-only secret and exchange it.
    let response = client
        .post(format!("{base}/authentication/secret"))
        .bearer_auth(&admin.access_token)
        .json(&json!({ "can_manage_vacancies": true }))
        .send()
        .await?;
    ensure!(
        response.status() == StatusCode::OK,
        "Secret emission failed: {}",
        response.status()
    );
    let emitted: EmittedSecret = response.json().await.context("Emitted secret")?;
    ensure!(!emitted.secret.is_empty(), "Emitted secret is empty");

    let response = authenticate(&client, &base, 0xDEAD_BEEF, &emitted.secret).await?;
    ensure!(response.status() == StatusCode::OK, "Exchange failed");
    let member: Credential = response.json().await.context("Member credential")?;
    ensure!(member.user_id == 0xDEAD_BEEF, "Echoed user id mismatch");
    ensure!(!member.can_manage_permissions, "Member must not manage permissions");
    ensure!(member.can_manage_vacancies, "Member must manage vacancies");

    // A vacancies-only credential cannot emit secrets.
    let response = client
        .post(format!("{base}/authentication/secret"))
        .bearer_auth(&member.access_token)
        .json(&json!({ "can_manage_vacancies": true }))
        .send()
        .await?;
    ensure!(
        response.status() == StatusCode::FORBIDDEN,
        "Vacancies-only caller must not emit secrets: {}",
        response.status()
    );

    // A syntactically valid but never-emitted secret is rejected.
    let response = authenticate(&client, &base, 7, &Uuid::new_v4().to_string()).await?;
    ensure!(
        response.status() == StatusCode::FORBIDDEN,
        "Unknown secret must be rejected: {}",
        response.status()
    );

    vacancy_flow(&client, &base, &member.access_token).await?;
    concurrent_exchange(&client, &base, &admin.access_token).await?;

    Ok(())
}

async fn vacancy_flow(client: &reqwest::Client, base: &str, bearer: &str) -> Result<()> {
    let response = client
        .post(format!("{base}/vacancies"))
        .bearer_auth(bearer)
        .json(&json!({ "title": "Moderator", "description": "Keep the peace" }))
        .send()
        .await?;
    ensure!(
        response.status() == StatusCode::CREATED,
        "Opening a vacancy failed: {}",
        response.status()
    );
    let opened: OpenedVacancy = response.json().await.context("Opened vacancy")?;

    let headers: Vec<VacancyHeader> = client
        .get(format!("{base}/vacancies"))
        .send()
        .await?
        .json()
        .await
        .context("Vacancy listing")?;
    ensure!(
        headers
            .iter()
            .any(|header| header.id == opened.id && header.title == "Moderator"),
        "Opened vacancy missing from the listing"
    );

    let response = client
        .get(format!("{base}/vacancies/{}", opened.id))
        .send()
        .await?;
    ensure!(
        response.status() == StatusCode::OK,
        "Fetching the vacancy failed: {}",
        response.status()
    );

    // Closing requires the manage-vacancies claim.
    let response = client
        .delete(format!("{base}/vacancies/{}", opened.id))
        .send()
        .await?;
    ensure!(
        response.status() == StatusCode::UNAUTHORIZED,
        "Anonymous close must be rejected: {}",
        response.status()
    );

    let response = client
        .delete(format!("{base}/vacancies/{}", opened.id))
        .bearer_auth(bearer)
        .send()
        .await?;
    ensure!(
        response.status() == StatusCode::OK,
        "Closing the vacancy failed: {}",
        response.status()
    );

    let response = client
        .get(format!("{base}/vacancies/{}", opened.id))
        .send()
        .await?;
    ensure!(
        response.status() == StatusCode::NOT_FOUND,
        "Closed vacancy must be gone: {}",
        response.status()
    );

    Ok(())
}

/// Concurrent exchanges of one secret must yield exactly one credential.
async fn concurrent_exchange(client: &reqwest::Client, base: &str, admin: &str) -> Result<()> {
    let response = client
        .post(format!("{base}/authentication/secret"))
        .bearer_auth(admin)
        .json(&json!({ "can_manage_vacancies": true }))
        .send()
        .await?;
    ensure!(response.status() == StatusCode::OK, "Secret emission failed");
    let emitted: EmittedSecret = response.json().await?;

    let mut tasks = JoinSet::new();
    for user_id in 0..8_u64 {
        let client = client.clone();
        let base = base.to_string();
        let secret = emitted.secret.clone();
        tasks.spawn(async move {
            authenticate(&client, &base, user_id, &secret)
                .await
                .map(|response| response.status())
        });
    }

    let mut successes = 0;
    let mut denials = 0;
    while let Some(joined) = tasks.join_next().await {
        match joined.context("Exchange task panicked")?? {
            StatusCode::OK => successes += 1,
            StatusCode::FORBIDDEN => denials += 1,
            other => bail!("Unexpected status during concurrent exchange: {other}"),
        }
    }

    ensure!(
        successes == 1 && denials == 7,
        "Expected exactly one success, got {successes} successes and {denials} denials"
    );

    Ok(())
}
