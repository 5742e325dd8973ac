use clap::{Parser, Subcommand};
use futures_util::{SinkExt, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Management and test client for the WebSocket relay", long_about = None)]
struct Cli {
    /// Base URL of the relay's HTTP listener.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API key.
    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check relay status
    Status,
    /// List clients connected to the broadcast endpoint
    Clients,
    /// List open chat rooms
    Rooms,
    /// Connect to a WebSocket endpoint and print everything received
    Listen {
        /// WebSocket URL, e.g. ws://localhost:8080/ws
        ws_url: String,
    },
    /// Connect, send one text message and disconnect
    Send {
        /// WebSocket URL, e.g. ws://localhost:8080/ws
        ws_url: String,
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Status => admin_get(&cli.url, &cli.key, "status").await?,
        Commands::Clients => admin_get(&cli.url, &cli.key, "clients").await?,
        Commands::Rooms => admin_get(&cli.url, &cli.key, "rooms").await?,
        Commands::Listen { ws_url } => listen(&ws_url).await?,
        Commands::Send { ws_url, message } => send(&ws_url, message).await?,
    }

    Ok(())
}

async fn admin_get(base: &str, key: &str, resource: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {}", key))?);

    let res = reqwest::Client::new()
        .get(format!("{}/admin/{}", base.trim_end_matches('/'), resource))
        .headers(headers)
        .send()
        .await?;
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

async fn listen(ws_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (mut socket, _) = connect_async(ws_url).await?;
    eprintln!("Connected to {}", ws_url);

    while let Some(msg) = socket.next().await {
        match msg? {
            Message::Text(text) => println!("{}", text.as_str()),
            Message::Binary(data) => println!("<{} bytes binary>", data.len()),
            Message::Close(frame) => {
                eprintln!("Closed by server: {:?}", frame);
                break;
            }
            _ => {}
        }
    }
    Ok(())
}

async fn send(ws_url: &str, message: String) -> Result<(), Box<dyn std::error::Error>> {
    let (mut socket, _) = connect_async(ws_url).await?;
    socket.send(Message::text(message)).await?;
    socket.close(None).await?;
    Ok(())
}
