use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the market-data gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:6999")]
    url: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status
    Status,
    /// Show per-server health and idle pool sizes
    Pool,
    /// Register an upstream server
    Add(ServerArgs),
    /// Pin a server as primary, registering it if needed
    Primary(ServerArgs),
    /// Open and close a test connection to a server
    Test(ServerArgs),
    /// Close idle connections of one server, or all servers
    Reset {
        /// host:port of the server; omit to reset every pool
        server: Option<String>,
    },
}

#[derive(clap::Args)]
struct ServerArgs {
    host: String,
    port: u16,
    #[arg(short, long)]
    name: Option<String>,
}

impl ServerArgs {
    fn body(&self) -> Value {
        json!({ "host": self.host, "port": self.port, "name": self.name })
    }
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

    let request = match &cli.command {
        Commands::Status => client.get(format!("{}/admin/status", cli.url)),
        Commands::Pool => client.get(format!("{}/admin/pool", cli.url)),
        Commands::Add(server) => client
            .post(format!("{}/admin/servers", cli.url))
            .json(&server.body()),
        Commands::Primary(server) => client
            .post(format!("{}/admin/servers/primary", cli.url))
            .json(&server.body()),
        Commands::Test(server) => client
            .post(format!("{}/admin/servers/test", cli.url))
            .json(&server.body()),
        Commands::Reset { server } => {
            let body = match server {
                Some(address) => json!({ "server": parse_address(address)? }),
                None => json!({}),
            };
            client
                .post(format!("{}/admin/pool/reset", cli.url))
                .json(&body)
        }
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

fn parse_address(address: &str) -> Result<Value, Box<dyn std::error::Error>> {
    let (host, port) = address
        .rsplit_once(':')
        .ok_or("server must be given as host:port")?;
    let port: u16 = port.parse()?;
    Ok(json!({ "host": host, "port": port }))
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
