use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "proxy-cli")]
#[command(about = "Management CLI for the lb-proxy admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:8081")]
    url: String,

    #[arg(short, long, env = "LB_PROXY_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check proxy system status
    Status,
    /// List backends and their health, in rotation order
    Backends,
    /// Replace the whole backend list
    Replace {
        /// Backend addresses, e.g. http://10.0.0.1:8080
        #[arg(required = true)]
        backends: Vec<String>,
    },
    /// Mark a backend healthy or unhealthy
    Health {
        address: String,
        #[arg(long, conflicts_with = "unhealthy", required_unless_present = "unhealthy")]
        healthy: bool,
        #[arg(long)]
        unhealthy: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let request = match cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Backends => client.get(format!("{}/admin/backends", cli.url)),
        Commands::Replace { backends } => client
            .put(format!("{}/admin/backends", cli.url))
            .json(&json!({ "backends": backends })),
        Commands::Health { address, healthy, .. } => client
            .post(format!("{}/admin/backends/health", cli.url))
            .json(&json!({ "address": address, "healthy": healthy })),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
