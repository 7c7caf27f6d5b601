use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facegate_core::{
    AccessGate, AllowedOrigins, FaceComparator, OriginValidator, OwnerId, OwnerScopedGate,
    ResultPoller, SessionId, SessionManager, SessionSettings, WaitPolicy,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "facegate",
    about = "Facegate CLI: drive liveness sessions and face comparison without the daemon"
)]
struct Cli {
    /// Object store bucket holding profile and liveness images
    #[arg(long, env = "FACEGATE_BUCKET", global = true, default_value = "")]
    bucket: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a liveness session writing frames under the owner's prefix
    CreateSession {
        /// Identity that will own the captured frames
        #[arg(long)]
        owner: String,
        /// Audit frames to keep (0-4)
        #[arg(long, default_value_t = 0)]
        audit_images: u8,
    },
    /// Show the current results of a liveness session
    Results {
        session_id: String,
    },
    /// Poll a liveness session until it reaches a terminal status
    Wait {
        session_id: String,
        /// Initial poll interval in milliseconds
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
        /// Maximum number of polls
        #[arg(long, default_value_t = 60)]
        max_attempts: u32,
    },
    /// Compare a profile image with a liveness image
    Compare {
        /// Identity that owns both images
        #[arg(long)]
        owner: String,
        #[arg(long)]
        profile_key: String,
        #[arg(long)]
        liveness_key: String,
    },
    /// Print the Access-Control-Allow-Origin value the daemon would send
    Origin {
        /// Origin header of the incoming request
        #[arg(long)]
        origin: Option<String>,
        /// Comma-separated allowed origins
        #[arg(long, env = "FACEGATE_ALLOWED_ORIGINS", default_value = "http://localhost:5173")]
        allowed: String,
    },
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_origin(origin: Option<&str>, allowed: &str) -> Result<()> {
    let validator = OriginValidator::new(AllowedOrigins::from_csv(allowed)?);
    println!("{}", validator.select(origin));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Origin { origin, allowed } => print_origin(origin.as_deref(), &allowed),
        command => run_backend_command(&cli.bucket, command).await,
    }
}

async fn run_backend_command(bucket: &str, command: Commands) -> Result<()> {
    if bucket.is_empty() {
        anyhow::bail!("--bucket (or FACEGATE_BUCKET) is required");
    }
    let aws = facegate_aws::AwsBackend::connect(bucket).await;
    tracing::info!(bucket, "connected to AWS backends");
    let detection = Arc::new(aws.detection);
    let gate: Arc<dyn AccessGate> = Arc::new(OwnerScopedGate);

    match command {
        Commands::CreateSession {
            owner,
            audit_images,
        } => {
            let owner = OwnerId::new(owner)?;
            let sessions = SessionManager::new(
                detection,
                SessionSettings {
                    bucket: bucket.to_string(),
                    audit_images_limit: audit_images,
                },
            );
            let session_id = sessions
                .create_session(&owner)
                .await
                .context("creating liveness session")?;
            tracing::info!(owner = %owner, session_id = %session_id, "session created");
            print_json(&serde_json::json!({ "sessionId": session_id }))?;
        }
        Commands::Results { session_id } => {
            let poller = ResultPoller::new(detection, gate);
            let session = poller
                .get_results(&SessionId::new(session_id)?)
                .await
                .context("reading session results")?;
            print_json(&session)?;
        }
        Commands::Wait {
            session_id,
            interval_ms,
            max_attempts,
        } => {
            let poller = ResultPoller::new(detection, gate);
            let policy = WaitPolicy {
                initial_interval: Duration::from_millis(interval_ms),
                max_attempts,
                ..WaitPolicy::default()
            };
            let session = poller
                .wait_for_terminal(&SessionId::new(session_id)?, &policy)
                .await
                .context("waiting for session")?;
            tracing::info!(status = %session.status, "session finished");
            print_json(&session)?;
        }
        Commands::Compare {
            owner,
            profile_key,
            liveness_key,
        } => {
            let comparator = FaceComparator::new(gate, Arc::new(aws.store), detection);
            let result = comparator
                .compare(&OwnerId::new(owner)?, &profile_key, &liveness_key)
                .await
                .context("comparing faces")?;
            print_json(&result)?;
        }
        Commands::Origin { origin, allowed } => print_origin(origin.as_deref(), &allowed)?,
    }

    Ok(())
}
