use std::path::PathBuf;
use std::sync::Arc;

use axum::http::Method;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use endpoint_mediator::config::load_config;
use endpoint_mediator::endpoint::{EndpointId, EndpointKind, EndpointRegistry};
use endpoint_mediator::lifecycle::{build_dispatcher, signals, Shutdown};
use endpoint_mediator::observability::{logging, metrics};
use endpoint_mediator::uri::{QUERY_PARAM_PREFIX, URI_VARIABLE_PREFIX};
use endpoint_mediator::{MediatorServer, RequestContext};

#[derive(Parser)]
#[command(name = "endpoint-mediator")]
#[command(about = "Mediation engine for HTTP, failover and load-balance endpoints", long_about = None)]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(short, long, default_value = "mediator.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate the configuration, then print the endpoint tree
    Validate,
    /// Resolve the address an endpoint would send to
    Resolve {
        endpoint: String,
        /// Binding as key=value; bare keys are taken as uri.var.<key>
        #[arg(long = "var", value_parser = parse_binding)]
        vars: Vec<(String, String)>,
    },
    /// Dispatch one request through a root endpoint
    Send {
        endpoint: String,
        #[arg(short, long, default_value = "GET")]
        method: Method,
        #[arg(long = "var", value_parser = parse_binding)]
        vars: Vec<(String, String)>,
        /// Request body
        #[arg(short, long)]
        data: Option<String>,
    },
    /// Run the mediation server and admin API
    Serve,
}

fn parse_binding(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }
    let key = if key.starts_with(URI_VARIABLE_PREFIX) || key.starts_with(QUERY_PARAM_PREFIX) {
        key.to_string()
    } else {
        format!("{URI_VARIABLE_PREFIX}{key}")
    };
    Ok((key, value.to_string()))
}

fn request_with(method: Method, vars: &[(String, String)]) -> RequestContext {
    let mut request = RequestContext::new(method);
    for (key, value) in vars {
        request.set_property(key.clone(), value.clone());
    }
    request
}

fn print_tree(registry: &EndpointRegistry, id: EndpointId, depth: usize) {
    let endpoint = registry.get(id);
    let template = endpoint
        .definition()
        .uri_template
        .as_ref()
        .map(|t| format!(" {}", t.raw()))
        .unwrap_or_default();
    println!("{}{} ({}){}", "  ".repeat(depth), endpoint.name(), endpoint.kind().type_label(), template);
    for child in endpoint.kind().children() {
        print_tree(registry, *child, depth + 1);
    }
}

fn print_resolved(registry: &EndpointRegistry, id: EndpointId, request: &RequestContext) {
    let endpoint = registry.get(id);
    match endpoint.kind() {
        EndpointKind::Http => {
            if let Some(address) = endpoint.resolve_address(request) {
                println!("{}\t{}", endpoint.name(), address);
            }
        }
        kind => {
            for child in kind.children() {
                print_resolved(registry, *child, request);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(
        path = %cli.config.display(),
        endpoints = config.endpoints.len(),
        "Configuration loaded"
    );

    match cli.command {
        Commands::Validate => {
            let registry = EndpointRegistry::from_config(&config)?;
            for root in registry.roots() {
                print_tree(&registry, root, 0);
            }
        }
        Commands::Resolve { endpoint, vars } => {
            let registry = EndpointRegistry::from_config(&config)?;
            let id = registry
                .lookup(&endpoint)
                .ok_or_else(|| format!("unknown endpoint '{endpoint}'"))?;
            let request = request_with(Method::GET, &vars);
            print_resolved(&registry, id, &request);
        }
        Commands::Send {
            endpoint,
            method,
            vars,
            data,
        } => {
            let dispatcher = build_dispatcher(&config)?;
            let id = dispatcher
                .registry()
                .lookup(&endpoint)
                .ok_or_else(|| format!("unknown endpoint '{endpoint}'"))?;
            if !dispatcher.registry().is_root(id) {
                return Err(format!("endpoint '{endpoint}' is not a root endpoint; send through its parent").into());
            }
            let mut request = request_with(method, &vars);
            if let Some(data) = data {
                request.set_payload(data.into_bytes());
            }

            let leaf = dispatcher.dispatch(id, &mut request).await?;
            let name = dispatcher.registry().get(leaf).name();
            match request.take_response() {
                Some(response) => {
                    eprintln!("{} -> {} {}", name, request.to().unwrap_or_default(), response.status);
                    println!("{}", String::from_utf8_lossy(&response.body));
                }
                None => eprintln!("{} -> {}", name, request.to().unwrap_or_default()),
            }
        }
        Commands::Serve => {
            if config.observability.metrics_enabled {
                match config.observability.metrics_address.parse() {
                    Ok(addr) => {
                        if let Err(e) = metrics::init_metrics(addr) {
                            tracing::error!(error = %e, "Failed to start metrics exporter");
                        }
                    }
                    Err(_) => tracing::error!(
                        metrics_address = %config.observability.metrics_address,
                        "Failed to parse metrics address"
                    ),
                }
            }

            let dispatcher = build_dispatcher(&config)?;
            let listener = TcpListener::bind(&config.admin.bind_address).await?;
            tracing::info!(address = %listener.local_addr()?, "Listening for connections");

            let shutdown = Arc::new(Shutdown::new());
            let server_shutdown = shutdown.subscribe();
            signals::spawn_signal_handler(shutdown.clone());

            MediatorServer::new(dispatcher).run(listener, server_shutdown).await?;
            tracing::info!("Shutdown complete");
        }
    }

    Ok(())
}
