// tests/api_tests.rs

use sqlx::postgres::PgPoolOptions;
use survey_backend::{config::Config, routes, state::AppState};

/// Helper function to spawn the app on a random port for testing.
/// Returns the base URL (e.g., "http://127.0.0.1:12345").
async fn spawn_app() -> String {
    // Note: For Postgres, you must have a running database.
    // We'll read from DATABASE_URL environment variable.
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    // 1. Create a pool
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to Postgres for testing. Make sure DATABASE_URL is set.");

    // 2. Run migrations
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to migrate database");

    // 3. Create test configuration and state
    let config = Config {
        database_url: database_url.clone(),
        jwt_secret: "test_secret_for_integration_tests".to_string(),
        jwt_expiration: 600, // 10 minutes for tests
        rust_log: "error".to_string(),
        port: 0,
    };

    let state = AppState { pool, config };

    // 4. Create the router with the app state
    let app = routes::create_router(state);

    // 5. Bind to port 0 to get a random available port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");

    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    // 6. Spawn the server in the background
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    address
}

fn unique_email() -> String {
    format!("u_{}@example.com", &uuid::Uuid::new_v4().to_string()[..8])
}

#[tokio::test]
async fn health_check_404() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .get(&format!("{}/random_path_that_does_not_exist", address))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 404);
}

#[tokio::test]
async fn register_works() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act
    let response = client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "email": unique_email(),
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 201);
}

#[tokio::test]
async fn register_fails_validation() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act: Send something that is not an email address
    let response = client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({
            "email": "not-an-email",
            "password": "password123"
        }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let email = unique_email();

    let first = client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .expect("Failed to execute request");
    assert_eq!(first.status().as_u16(), 201);

    // Act
    let second = client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(second.status().as_u16(), 409);
}

#[tokio::test]
async fn login_returns_bearer_token() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let email = unique_email();

    client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .expect("Register failed");

    // Act
    let login = client
        .post(&format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .expect("Login failed")
        .json::<serde_json::Value>()
        .await
        .expect("Failed to parse login json");

    // Assert
    assert!(login["token"].as_str().is_some());
    assert_eq!(login["type"], "Bearer");
}

#[tokio::test]
async fn login_rejects_wrong_password() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let email = unique_email();

    client
        .post(&format!("{}/api/auth/register", address))
        .json(&serde_json::json!({ "email": email, "password": "password123" }))
        .send()
        .await
        .expect("Register failed");

    // Act
    let response = client
        .post(&format!("{}/api/auth/login", address))
        .json(&serde_json::json!({ "email": email, "password": "wrong-password" }))
        .send()
        .await
        .expect("Login failed");

    // Assert
    assert_eq!(response.status().as_u16(), 401);
}

#[tokio::test]
async fn questions_are_grouped_by_category() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .expect("Failed to connect to test DB");

    let title = format!("Seeded question {}", uuid::Uuid::new_v4());
    sqlx::query("INSERT INTO questions (title, description, type, category) VALUES ($1, $2, 'text', 'financial')")
        .bind(&title)
        .bind("inserted by test")
        .execute(&pool)
        .await
        .unwrap();

    // Act
    let body: serde_json::Value = client
        .get(&format!("{}/api/questions", address))
        .send()
        .await
        .expect("Failed to execute request")
        .json()
        .await
        .expect("Failed to parse questions json");

    // Assert: the question shows up in its category group with its metadata
    let financial = body["financial"]
        .as_array()
        .expect("financial group missing");
    let found = financial
        .iter()
        .find(|q| q["title"] == title.as_str())
        .expect("seeded question not in financial group");
    assert_eq!(found["type"], "text");
    assert_eq!(found["category"], "financial");
}

#[tokio::test]
async fn responses_require_authentication() {
    // Arrange
    let address = spawn_app().await;
    let client = reqwest::Client::new();

    // Act: no Authorization header
    let get = client
        .get(&format!("{}/api/responses", address))
        .send()
        .await
        .expect("Failed to execute request");
    let post = client
        .post(&format!("{}/api/responses", address))
        .json(&serde_json::json!({ "responses": [{ "questionId": 1, "answer": "x" }] }))
        .send()
        .await
        .expect("Failed to execute request");

    // Assert
    assert_eq!(get.status().as_u16(), 401);
    assert_eq!(post.status().as_u16(), 401);
}
