use std::{
    io::Read,
    net::SocketAddr,
    path::{Path, PathBuf},
};

use clap::Parser;
use portcullis::{
    AppState,
    auth::{SecretDeriver, TokenIssuer},
    authz::{Authorizer, AuthorizerRequest, DecisionError},
    build_app,
    config::AuthorizerConfig,
    observability,
};
use serde_json::json;

/// CLI arguments for the Portcullis authorizer
#[derive(Parser, Debug)]
#[command(version, about = "Portcullis request authorizer", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "portcullis.toml")]
    config: PathBuf,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the HTTP authorizer (default)
    Serve,
    /// Mint an access token for local testing
    Issue {
        /// Client id the token is issued to (its audience and secret selector)
        client_id: String,
        /// Subject claim, used as the principal id
        #[arg(short, long)]
        subject: String,
        /// Lifetime in seconds (defaults to auth.access_token_ttl_secs)
        #[arg(long)]
        ttl: Option<u64>,
    },
    /// Decide a single request event and print the result
    Decide {
        /// Event JSON file (defaults to stdin)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = load_config(&args.config);

    match args.command {
        Some(Command::Issue {
            client_id,
            subject,
            ttl,
        }) => run_issue(config, &client_id, &subject, ttl),
        Some(Command::Decide { input }) => run_decide(config, input.as_deref()).await,
        Some(Command::Serve) | None => run_server(config).await,
    }
}

fn load_config(path: &Path) -> AuthorizerConfig {
    match AuthorizerConfig::from_file(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn run_issue(mut config: AuthorizerConfig, client_id: &str, subject: &str, ttl: Option<u64>) {
    if let Some(ttl) = ttl {
        if ttl == 0 {
            eprintln!("Error: --ttl must be greater than zero");
            std::process::exit(1);
        }
        config.auth.access_token_ttl_secs = ttl;
    }

    let issuer = TokenIssuer::new(SecretDeriver::new(&config.auth.salt), &config.auth);
    match issuer.issue(client_id, subject) {
        Ok(token) => println!("{token}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

async fn run_decide(config: AuthorizerConfig, input: Option<&Path>) {
    let raw = match input {
        Some(path) => std::fs::read_to_string(path),
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).map(|_| buf)
        }
    };
    let raw = match raw {
        Ok(raw) => raw,
        Err(e) => {
            eprintln!("Error: failed to read event: {e}");
            std::process::exit(1);
        }
    };

    let request: AuthorizerRequest = match serde_json::from_str(&raw) {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Error: invalid event JSON: {e}");
            std::process::exit(1);
        }
    };

    let authorizer = Authorizer::from_config(&config);
    let (output, ok) = match authorizer.decide(&request).await {
        Ok(decision) => (json!(decision), true),
        Err(DecisionError::Fail { code, message }) => {
            (json!({ "error": "Fail", "code": code, "message": message }), false)
        }
        Err(DecisionError::Unauthorized) => (json!({ "error": "Unauthorized" }), false),
    };

    match serde_json::to_string_pretty(&output) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("Error: {e}"),
    }
    if !ok {
        std::process::exit(1);
    }
}

async fn run_server(config: AuthorizerConfig) {
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    if config.policy.grants.is_empty() {
        tracing::warn!("No grants configured; every decision is an implicit deny");
    }

    let bind_addr = SocketAddr::new(config.server.host, config.server.port);
    let app = build_app(AppState::new(config));

    let listener = match tokio::net::TcpListener::bind(bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_addr, error = %e, "Failed to bind");
            eprintln!("Error: failed to bind to {bind_addr}: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("Authorizer listening on http://{}", bind_addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining in-flight requests");
}
