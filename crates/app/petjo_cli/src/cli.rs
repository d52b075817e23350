use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "petjo-cli", about = "PetJo administration", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the CLI version.
    Version,

    /// Create the initial superuser, or promote an existing account.
    CreateSuperuser {
        #[arg(long)]
        email: String,

        #[arg(long, env = "PETJO_SUPERUSER_PASSWORD", hide_env_values = true)]
        password: String,

        #[arg(long)]
        full_name: Option<String>,

        #[arg(
            long,
            env = "DATABASE_URL",
            default_value = "postgres://localhost:5432/petjo"
        )]
        database_url: String,
    },

    /// Print a bcrypt hash of a password.
    HashPassword {
        #[arg(long, env = "PETJO_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Generate an API key and secret.
    GenerateApiKey,

    /// Sign a request with an API secret.
    SignRequest {
        #[arg(long)]
        method: String,

        #[arg(long)]
        path: String,

        /// Unix timestamp; defaults to now.
        #[arg(long)]
        timestamp: Option<i64>,

        #[arg(long, default_value = "")]
        body: String,

        #[arg(long, env = "PETJO_API_SECRET", hide_env_values = true)]
        secret: String,
    },
}
