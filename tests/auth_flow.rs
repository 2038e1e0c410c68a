use bazaar::auth::ephemeral_token::{self, TokenKind};
use bazaar::auth::{issue_access_token, refresh_tokens};
use bazaar::configuration::{get_configuration, DatabaseSettings, JwtSettings};
use bazaar::error::AppError;
use bazaar::startup::run;
use bazaar::users;
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use std::net::TcpListener;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
    pub jwt_config: JwtSettings,
}

async fn spawn_app() -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = Uuid::new_v4().to_string();
    let connection_pool = configure_database(&configuration.database).await;

    let jwt_config = configuration.jwt.clone();
    let server =
        run(listener, connection_pool.clone(), configuration).expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: connection_pool,
        jwt_config,
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

impl TestApp {
    async fn sign_up(&self, client: &reqwest::Client, email: &str) -> reqwest::Response {
        client
            .post(&format!("{}/auth/sign-up", &self.address))
            .json(&json!({
                "name": "John Doe",
                "email": email,
                "password": "SecurePass123"
            }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn sign_in(
        &self,
        client: &reqwest::Client,
        email: &str,
        password: &str,
    ) -> reqwest::Response {
        client
            .post(&format!("{}/auth/sign-in", &self.address))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn user_id(&self, email: &str) -> Uuid {
        let (id,): (Uuid,) = sqlx::query_as("SELECT id FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.db_pool)
            .await
            .expect("Failed to fetch user id");
        id
    }
}

async fn sign_in_tokens(app: &TestApp, client: &reqwest::Client, email: &str) -> (String, String) {
    let body: Value = app
        .sign_in(client, email, "SecurePass123")
        .await
        .json()
        .await
        .expect("Failed to parse sign-in response");
    (
        body["tokens"]["access"].as_str().unwrap().to_string(),
        body["tokens"]["refresh"].as_str().unwrap().to_string(),
    )
}

// --- Sign-up ---

#[tokio::test]
async fn sign_up_creates_an_unverified_account_and_no_session() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = app.sign_up(&client, "john@example.com").await;
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body.get("tokens").is_none());

    let (verified,): (bool,) =
        sqlx::query_as("SELECT verified FROM users WHERE email = 'john@example.com'")
            .fetch_one(&app.db_pool)
            .await
            .expect("Failed to fetch created user");
    assert!(!verified);

    // A verification token was stored for the new account
    let user_id = app.user_id("john@example.com").await;
    let (tokens,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM verification_tokens WHERE owner_id = $1")
            .bind(user_id)
            .fetch_one(&app.db_pool)
            .await
            .unwrap();
    assert_eq!(tokens, 1);
}

#[tokio::test]
async fn sign_up_with_duplicate_email_fails_without_duplicating_the_account() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    assert_eq!(200, app.sign_up(&client, "john@example.com").await.status());

    let response = app.sign_up(&client, "john@example.com").await;
    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Email is already in use!");

    let (count,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM users WHERE email = 'john@example.com'")
            .fetch_one(&app.db_pool)
            .await
            .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn losing_a_sign_up_race_reads_as_duplicate_email() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.sign_up(&client, "john@example.com").await;

    // Insert directly, bypassing the handler's existence pre-check, as the
    // loser of two concurrent sign-ups would
    let err = users::create(&app.db_pool, "john@example.com", "Jane Doe", "SecurePass123")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DuplicateEmail));
}

#[tokio::test]
async fn sign_up_rejects_invalid_input() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let cases = vec![
        json!({"name": "John", "email": "not-an-email", "password": "SecurePass123"}),
        json!({"name": "Jo", "email": "john@example.com", "password": "SecurePass123"}),
        json!({"name": "John", "email": "john@example.com", "password": "weak"}),
        json!({"name": "John", "email": "john@example.com", "password": "alllowercase1"}),
    ];

    for body in cases {
        let response = client
            .post(&format!("{}/auth/sign-up", &app.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(400, response.status().as_u16(), "Should reject: {}", body);
    }
}

// --- Email verification ---

#[tokio::test]
async fn verification_token_is_single_use() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.sign_up(&client, "john@example.com").await;
    let user_id = app.user_id("john@example.com").await;

    // Supersede the mailed token with one whose plaintext we hold
    let token = ephemeral_token::issue(&app.db_pool, user_id, TokenKind::Verification)
        .await
        .unwrap();

    let verify = |token: String| {
        let client = client.clone();
        let url = format!("{}/auth/verify-email", &app.address);
        let id = user_id;
        async move {
            client
                .post(&url)
                .json(&json!({ "id": id, "token": token }))
                .send()
                .await
                .expect("Failed to execute request.")
        }
    };

    assert_eq!(200, verify(token.clone()).await.status().as_u16());
    // Second consumption must fail
    assert_eq!(400, verify(token).await.status().as_u16());
}

#[tokio::test]
async fn issuing_a_new_verification_token_invalidates_the_old_one() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.sign_up(&client, "john@example.com").await;
    let user_id = app.user_id("john@example.com").await;

    let old_token = ephemeral_token::issue(&app.db_pool, user_id, TokenKind::Verification)
        .await
        .unwrap();
    let new_token = ephemeral_token::issue(&app.db_pool, user_id, TokenKind::Verification)
        .await
        .unwrap();

    let response = client
        .post(&format!("{}/auth/verify-email", &app.address))
        .json(&json!({ "id": user_id, "token": old_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());

    let response = client
        .post(&format!("{}/auth/verify-email", &app.address))
        .json(&json!({ "id": user_id, "token": new_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn verification_token_past_its_ttl_is_rejected() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.sign_up(&client, "john@example.com").await;
    let user_id = app.user_id("john@example.com").await;
    let token = ephemeral_token::issue(&app.db_pool, user_id, TokenKind::Verification)
        .await
        .unwrap();

    // Verification tokens live 24 hours; age the record past that
    sqlx::query("UPDATE verification_tokens SET created_at = now() - interval '25 hours'")
        .execute(&app.db_pool)
        .await
        .unwrap();

    let response = client
        .post(&format!("{}/auth/verify-email", &app.address))
        .json(&json!({ "id": user_id, "token": token }))
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());

    let (verified,): (bool,) = sqlx::query_as("SELECT verified FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&app.db_pool)
        .await
        .unwrap();
    assert!(!verified);
}

#[tokio::test]
async fn sign_up_verify_then_sign_in_returns_verified_profile() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.sign_up(&client, "john@example.com").await;
    let user_id = app.user_id("john@example.com").await;
    let token = ephemeral_token::issue(&app.db_pool, user_id, TokenKind::Verification)
        .await
        .unwrap();

    client
        .post(&format!("{}/auth/verify-email", &app.address))
        .json(&json!({ "id": user_id, "token": token }))
        .send()
        .await
        .unwrap();

    let response = app.sign_in(&client, "john@example.com", "SecurePass123").await;
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["profile"]["verified"], true);
    assert_eq!(body["profile"]["email"], "john@example.com");
    assert!(body["profile"].get("password_hash").is_none());
    assert!(body["tokens"]["access"].as_str().is_some());
    assert!(body["tokens"]["refresh"].as_str().is_some());
}

// --- Sign-in ---

#[tokio::test]
async fn wrong_email_and_wrong_password_return_the_same_error() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.sign_up(&client, "john@example.com").await;

    let wrong_password = app.sign_in(&client, "john@example.com", "WrongPass123").await;
    let wrong_email = app.sign_in(&client, "nobody@example.com", "SecurePass123").await;

    assert_eq!(400, wrong_password.status().as_u16());
    assert_eq!(400, wrong_email.status().as_u16());

    let body_password: Value = wrong_password.json().await.unwrap();
    let body_email: Value = wrong_email.json().await.unwrap();
    assert_eq!(body_password["message"], body_email["message"]);
}

// --- Refresh rotation ---

#[tokio::test]
async fn rotated_refresh_token_is_rejected_and_reuse_clears_the_whole_set() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.sign_up(&client, "john@example.com").await;
    let user_id = app.user_id("john@example.com").await;

    let (_, refresh_a) = sign_in_tokens(&app, &client, "john@example.com").await;
    // Refresh tokens embed an issued-at second; space the sign-ins out so the
    // two sessions hold distinct tokens
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let (_, refresh_b) = sign_in_tokens(&app, &client, "john@example.com").await;
    assert_ne!(refresh_a, refresh_b);

    let refresh = |token: String| {
        let client = client.clone();
        let url = format!("{}/auth/refresh-token", &app.address);
        async move {
            client
                .post(&url)
                .json(&json!({ "refreshToken": token }))
                .send()
                .await
                .expect("Failed to execute request.")
        }
    };

    // Rotate A
    let response = refresh(refresh_a.clone()).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    let refresh_a2 = body["tokens"]["refresh"].as_str().unwrap().to_string();
    assert_ne!(refresh_a, refresh_a2);

    // Reusing the rotated token is a compromise signal
    assert_eq!(400, refresh(refresh_a).await.status().as_u16());

    // The whole set was cleared: B and the freshly rotated A2 are both dead
    assert_eq!(0, refresh_tokens::count(&app.db_pool, user_id).await.unwrap());
    assert_eq!(400, refresh(refresh_b).await.status().as_u16());
    assert_eq!(400, refresh(refresh_a2).await.status().as_u16());
}

#[tokio::test]
async fn refresh_with_garbage_token_fails() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&format!("{}/auth/refresh-token", &app.address))
        .json(&json!({ "refreshToken": "not.a.jwt" }))
        .send()
        .await
        .unwrap();

    assert_eq!(400, response.status().as_u16());
}

// --- Sign-out ---

#[tokio::test]
async fn sign_out_removes_exactly_the_presented_token() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.sign_up(&client, "john@example.com").await;
    let user_id = app.user_id("john@example.com").await;

    let (access, refresh_a) = sign_in_tokens(&app, &client, "john@example.com").await;
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let (_, refresh_b) = sign_in_tokens(&app, &client, "john@example.com").await;

    assert_eq!(2, refresh_tokens::count(&app.db_pool, user_id).await.unwrap());

    let response = client
        .post(&format!("{}/auth/sign-out", &app.address))
        .header("Authorization", format!("Bearer {}", access))
        .json(&json!({ "refreshToken": refresh_a }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    // The other session survives
    assert_eq!(1, refresh_tokens::count(&app.db_pool, user_id).await.unwrap());

    let response = client
        .post(&format!("{}/auth/refresh-token", &app.address))
        .json(&json!({ "refreshToken": refresh_b }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
}

// --- Auth gate ---

#[tokio::test]
async fn profile_requires_a_valid_access_token() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.sign_up(&client, "john@example.com").await;

    // Missing header
    let response = client
        .get(&format!("{}/auth/profile", &app.address))
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());

    // Garbage token
    let response = client
        .get(&format!("{}/auth/profile", &app.address))
        .header("Authorization", "Bearer garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(401, response.status().as_u16());

    // Valid token
    let (access, _) = sign_in_tokens(&app, &client, "john@example.com").await;
    let response = client
        .get(&format!("{}/auth/profile", &app.address))
        .header("Authorization", format!("Bearer {}", access))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["email"], "john@example.com");
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn expired_access_token_returns_session_expired() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    app.sign_up(&client, "john@example.com").await;
    let user_id = app.user_id("john@example.com").await;

    let mut expired_config = app.jwt_config.clone();
    expired_config.access_token_expiry = -300;
    let expired = issue_access_token(user_id, &expired_config).unwrap();

    let response = client
        .get(&format!("{}/auth/profile", &app.address))
        .header("Authorization", format!("Bearer {}", expired))
        .send()
        .await
        .unwrap();

    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Session expired!");
}
