use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "bridge-cli")]
#[command(about = "Command line client for the upstream bridge", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show connection state and statistics
    Status,
    /// Submit an operation to the upstream
    Submit {
        method: String,
        /// Parameters as a JSON document
        #[arg(default_value = "{}")]
        params: String,
        /// Retry transient failures
        #[arg(long)]
        idempotent: bool,
    },
    /// Request a quote
    Quote {
        send_asset: String,
        recv_asset: String,
        send_amount: u64,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let res = match cli.command {
        Commands::Status => client.get(format!("{}/status", cli.url)).send().await?,
        Commands::Submit {
            method,
            params,
            idempotent,
        } => {
            let params: Value = serde_json::from_str(&params)?;
            client
                .post(format!("{}/api/v1/operations", cli.url))
                .json(&json!({ "method": method, "params": params, "idempotent": idempotent }))
                .send()
                .await?
        }
        Commands::Quote {
            send_asset,
            recv_asset,
            send_amount,
        } => {
            client
                .post(format!("{}/api/v1/quote", cli.url))
                .json(&json!({
                    "send_asset": send_asset,
                    "recv_asset": recv_asset,
                    "send_amount": send_amount,
                }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    let body = serde_json::from_str::<Value>(&text)
        .map(|json| serde_json::to_string_pretty(&json))
        .unwrap_or_else(|_| Ok(text.clone()))?;

    if status.is_success() {
        println!("{body}");
    } else {
        eprintln!("Error: bridge returned status {status}");
        eprintln!("{body}");
        std::process::exit(1);
    }
    Ok(())
}
