use anyhow::Result;
use clap::{Parser, Subcommand};
use identity_hub::{config::Config, server, telemetry};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "identity-hub", version, about = "User directory, credential service and HTTP gateway")]
struct Cli {
    #[command(subcommand)]
    role: Role,
}

#[derive(Debug, Subcommand)]
enum Role {
    /// Serve the user directory over gRPC (needs DATABASE_URL)
    Users {
        /// Overrides GRPC_PORT (default 50051)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Serve login, registration and token refresh over gRPC (needs JWT_SECRET)
    Auth {
        /// Overrides GRPC_PORT (default 50052)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Serve the HTTP gateway
    Gateway {
        /// Overrides HTTP_PORT
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let mut config = Config::from_env()?;
    let prometheus = telemetry::init(&config.telemetry)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Identity Hub");

    match cli.role {
        Role::Users { port } => {
            if let Some(port) = port {
                config.grpc_port = Some(port);
            }
            server::run_users(config, prometheus).await
        }
        Role::Auth { port } => {
            if let Some(port) = port {
                config.grpc_port = Some(port);
            }
            server::run_auth(config, prometheus).await
        }
        Role::Gateway { port } => {
            if let Some(port) = port {
                config.http_port = port;
            }
            server::run_gateway(config, prometheus).await
        }
    }
}
