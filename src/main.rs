// src/main.rs

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use survey_backend::config::Config;
use survey_backend::routes;
use survey_backend::state::AppState;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// The built-in survey catalog: (title, description, type, category).
/// Inserted once when the questions table is empty.
const SEED_QUESTIONS: &[(&str, &str, &str, &str)] = &[
    // DEMOGRAPHIC questions
    ("What is your full name?", "Enter your legal full name", "text", "demographic"),
    ("What is your age?", "Your current age in years", "number", "demographic"),
    ("What is your biological sex?", "Select male or female", "text", "demographic"),
    ("What is your zip code?", "Your current residential zip code", "text", "demographic"),
    // HEALTH questions
    ("Do you smoke or use tobacco?", "Yes or no", "text", "health"),
    ("Do you drink alcohol?", "If yes, how often?", "text", "health"),
    ("Do you have chronic conditions?", "e.g., Diabetes, Hypertension", "text", "health"),
    ("Do you require assistance with daily tasks?", "e.g., dressing, bathing", "text", "health"),
    ("What is your height (in cm)?", "Required for health scoring", "number", "health"),
    ("What is your weight (in kg)?", "Required for BMI calculation", "number", "health"),
    // FINANCIAL questions
    ("Are you currently insured?", "Do you have any health insurance?", "text", "financial"),
    ("What is your total monthly income?", "Approximate after-tax income", "number", "financial"),
    ("What are your average monthly expenses?", "Bills, rent, groceries, etc.", "number", "financial"),
    ("Do you have long-term care insurance?", "Yes, no, or unsure", "text", "financial"),
];

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env();

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    panic!("Failed to connect to database after 5 retries: {}", e);
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Migrations applied successfully.");

    // Seed Question Catalog
    if let Err(e) = seed_questions(&pool).await {
        tracing::error!("Failed to seed questions: {:?}", e);
    }

    // Create AppState
    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    // Bind to the listening address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();

    // Start the server
    axum::serve(listener, app).await.unwrap();
}

async fn seed_questions(pool: &PgPool) -> Result<(), Box<dyn std::error::Error>> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM questions")
        .fetch_one(pool)
        .await?;

    if count > 0 {
        return Ok(());
    }

    tracing::info!("Seeding question catalog ({} questions)", SEED_QUESTIONS.len());

    let mut builder =
        QueryBuilder::<Postgres>::new("INSERT INTO questions (title, description, type, category) ");
    builder.push_values(SEED_QUESTIONS, |mut row, (title, description, qtype, category)| {
        row.push_bind(*title)
            .push_bind(*description)
            .push_bind(*qtype)
            .push_bind(*category);
    });
    builder.build().execute(pool).await?;

    tracing::info!("Question catalog seeded.");
    Ok(())
}
