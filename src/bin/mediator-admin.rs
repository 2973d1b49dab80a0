use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "mediator-admin")]
#[command(about = "Admin CLI for a running endpoint mediator", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8280")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check mediator status
    Status,
    /// List every endpoint with its health
    Endpoints,
    /// Show one endpoint
    Endpoint { name: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let path = match &cli.command {
        Commands::Status => "/admin/status".to_string(),
        Commands::Endpoints => "/admin/endpoints".to_string(),
        Commands::Endpoint { name } => format!("/admin/endpoints/{name}"),
    };
    let res = client.get(format!("{}{}", cli.url.trim_end_matches('/'), path)).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
