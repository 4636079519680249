//! lineroute - A Line-Protocol Request Router
//!
//! This is the composition root: it parses the command line, sets up
//! logging, builds the store and the router, and runs the accept loop.

use lineroute::config::{Config, Invocation};
use lineroute::connection::{serve, ConnectionStats};
use lineroute::router::Router;
use lineroute::users::{register_routes, InMemoryUserStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn print_help() {
    println!(
        r#"
lineroute - A Line-Protocol Request Router

USAGE:
    lineroute [OPTIONS]

OPTIONS:
    -h, --host <HOST>         Host to bind to (default: 127.0.0.1)
    -p, --port <PORT>         Port to listen on (default: 7878)
    -l, --log-level <FILTER>  Log filter when RUST_LOG is unset (default: info)
        --seed                Start with a few demo users
    -v, --version             Print version information
        --help                Print this help message

EXAMPLES:
    lineroute                        # Start on 127.0.0.1:7878
    lineroute --port 9000 --seed     # Port 9000, demo data loaded

CONNECTING:
    Any line-oriented client works:
    $ nc 127.0.0.1 7878
    GET /users/1
    OK {{"id":"1","name":"ariz","email":"ariz@example.com"}}
    POST /users
    ERR INVALID_ARGUMENT expected <name> <email>, got 0 argument(s)
"#
    );
}

fn print_banner(config: &Config, router: &Router) {
    println!(
        r#"
lineroute v{}
──────────────────────────────────────────────────────────────
Server started on {}
{} routes registered. Ready to accept connections.

Use Ctrl+C to shutdown gracefully.
"#,
        lineroute::VERSION,
        config.bind_address(),
        router.len()
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let config = match Config::from_args(std::env::args().skip(1)) {
        Ok(Invocation::Run(config)) => config,
        Ok(Invocation::Help) => {
            print_help();
            return Ok(());
        }
        Ok(Invocation::Version) => {
            println!("lineroute version {}", lineroute::VERSION);
            return Ok(());
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            std::process::exit(1);
        }
    };

    // Set up logging; RUST_LOG wins over --log-level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    // Create the store (shared across all connections)
    let store = Arc::new(InMemoryUserStore::new());
    if config.seed {
        store.seed_demo()?;
        info!("Seeded demo users");
    }

    // Register every route before serving; the router is frozen afterwards
    let mut router = Router::new();
    register_routes(&mut router, store)?;
    for (verb, pattern) in router.routes() {
        info!(verb, pattern, "Route");
    }
    let router = Arc::new(router);

    print_banner(&config, &router);

    // Create connection statistics
    let stats = Arc::new(ConnectionStats::new());

    // Bind the TCP listener
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("Listening on {}", config.bind_address());

    // Set up graceful shutdown
    let shutdown = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received, stopping server...");
    };

    // Main accept loop
    tokio::select! {
        _ = serve(listener, router, Arc::clone(&stats)) => {}
        _ = shutdown => {}
    }

    info!(
        connections = stats.connections_accepted.load(std::sync::atomic::Ordering::Relaxed),
        requests = stats.requests_processed.load(std::sync::atomic::Ordering::Relaxed),
        "Server shutdown complete"
    );
    Ok(())
}
