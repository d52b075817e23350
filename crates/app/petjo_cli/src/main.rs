// Import and re-export the `error` module
pub use self::error::{Error, Result};
mod error;

use clap::Parser;
use cli::{Cli, Commands};
use petjo_core::auth::api_key::{compute_signature, generate_api_key};
use petjo_core::auth::credentials::{PgCredentialStore, ensure_superuser};
use petjo_core::auth::password::hash_password;
use petjo_core::auth::revocation::PgRevocationStore;
use petjo_core::auth::{normalize_email, validate_email, validate_password_strength};
use sqlx::postgres::PgPoolOptions;

mod cli;
mod logging;

fn main() -> Result<()> {
    if let Err(e) = run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    logging::init()?;

    let args = Cli::parse();

    match args.command {
        Commands::Version => {
            println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        }
        Commands::CreateSuperuser {
            email,
            password,
            full_name,
            database_url,
        } => {
            // Fail on bad input before touching the database.
            validate_email(&normalize_email(&email))?;
            validate_password_strength(&password)?;

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(create_superuser(email, password, full_name, database_url))?;
        }
        Commands::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
        }
        Commands::GenerateApiKey => {
            let (key, secret) = generate_api_key();
            println!("api_key={key}");
            println!("api_secret={secret}");
        }
        Commands::SignRequest {
            method,
            path,
            timestamp,
            body,
            secret,
        } => {
            let timestamp = timestamp
                .unwrap_or_else(|| chrono::Utc::now().timestamp())
                .to_string();
            let signature =
                compute_signature(&method.to_uppercase(), &path, &timestamp, &body, &secret)?;
            println!("X-Timestamp: {timestamp}");
            println!("X-Signature: {signature}");
        }
    }

    Ok(())
}

async fn create_superuser(
    email: String,
    password: String,
    full_name: Option<String>,
    database_url: String,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await?;
    petjo_core::migrate::migrate(&pool).await?;

    let store = PgCredentialStore::new(pool.clone());
    let revocation = PgRevocationStore::new(pool.clone());
    let (identity, created) =
        ensure_superuser(&store, &revocation, &email, &password, full_name).await?;
    if created {
        log::info!("Created superuser {} ({})", identity.email, identity.id);
    } else {
        log::info!("Promoted {} ({}) to superuser", identity.email, identity.id);
    }

    pool.close().await;
    Ok(())
}
