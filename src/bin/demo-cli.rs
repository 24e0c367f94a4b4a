use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "demo-cli")]
#[command(about = "Smoke-test CLI for the tailnet demo service", long_about = None)]
struct Cli {
    #[arg(short, long, env = "TEST_API_URL", default_value = "http://localhost:8080")]
    url: String,

    /// Per-request timeout in seconds
    #[arg(short, long, default_value_t = 2)]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show service and dependency health
    Health,
    /// Show who the service thinks you are
    User,
    /// List the most recent products
    Products,
    /// Wait for the service, then validate every endpoint
    Check {
        /// Seconds to wait for /health to answer
        #[arg(long, default_value_t = 10)]
        wait: u64,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(cli.timeout))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let base = cli.url.trim_end_matches('/');

    let result = match cli.command {
        Commands::Health => show(&client, base, "/health").await,
        Commands::User => show(&client, base, "/api/user").await,
        Commands::Products => show(&client, base, "/api/products").await,
        Commands::Check { wait } => check(&client, base, Duration::from_secs(wait)).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn show(client: &reqwest::Client, base: &str, path: &str) -> Result<(), String> {
    let (status, json) = get_json(client, base, path).await?;
    if !status.is_success() {
        eprintln!("{} returned status {}", path, status);
    }
    println!("{}", serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?);
    Ok(())
}

async fn get_json(
    client: &reqwest::Client,
    base: &str,
    path: &str,
) -> Result<(reqwest::StatusCode, Value), String> {
    let res = client
        .get(format!("{}{}", base, path))
        .send()
        .await
        .map_err(|e| format!("failed to call {}: {}", path, e))?;
    let status = res.status();
    let json = res
        .json::<Value>()
        .await
        .map_err(|e| format!("failed to decode {} response: {}", path, e))?;
    Ok((status, json))
}

async fn check(client: &reqwest::Client, base: &str, wait: Duration) -> Result<(), String> {
    wait_for_server(client, base, wait).await?;
    println!("ok    server ready at {}", base);

    let mut failures = Vec::new();

    let (status, health) = get_json(client, base, "/health").await?;
    report(&mut failures, "health", check_health(status, &health));

    let (status, user) = get_json(client, base, "/api/user").await?;
    report(&mut failures, "user", check_user(status, &user));

    let (status, products) = get_json(client, base, "/api/products").await?;
    report(&mut failures, "products", check_products(status, &products));

    if failures.is_empty() {
        Ok(())
    } else {
        Err(format!("{} check(s) failed: {}", failures.len(), failures.join(", ")))
    }
}

async fn wait_for_server(client: &reqwest::Client, base: &str, wait: Duration) -> Result<(), String> {
    let deadline = Instant::now() + wait;
    loop {
        if let Ok(res) = client.get(format!("{}/health", base)).send().await {
            if res.status().is_success() {
                return Ok(());
            }
        }
        if Instant::now() >= deadline {
            return Err(format!("{} not ready after {:?}", base, wait));
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }
}

fn report(failures: &mut Vec<&'static str>, name: &'static str, result: Result<String, String>) {
    match result {
        Ok(detail) => println!("ok    {:<9} {}", name, detail),
        Err(detail) => {
            println!("FAIL  {:<9} {}", name, detail);
            failures.push(name);
        }
    }
}

fn check_health(status: reqwest::StatusCode, body: &Value) -> Result<String, String> {
    if !status.is_success() {
        return Err(format!("status {}", status));
    }
    match (body["status"].as_str(), body["database"].as_str()) {
        (Some("ok"), Some("connected")) => Ok(format!("network={}", body["network"])),
        (Some("ok"), database) => Err(format!("database {:?}", database.unwrap_or("missing"))),
        (other, _) => Err(format!("status {:?}", other.unwrap_or("missing"))),
    }
}

fn check_user(status: reqwest::StatusCode, body: &Value) -> Result<String, String> {
    if !status.is_success() {
        return Err(format!("status {}", status));
    }
    match body["connected"].as_bool() {
        Some(true) => Ok(format!("login={}", body["login_name"])),
        Some(false) => Ok(format!("not connected ({})", body["error"])),
        None => Err("missing 'connected'".to_string()),
    }
}

fn check_products(status: reqwest::StatusCode, body: &Value) -> Result<String, String> {
    if !status.is_success() {
        return Err(format!("status {}: {}", status, body["error"]));
    }
    let rows = body.as_array().ok_or("expected a JSON array")?;
    if rows.len() > 100 {
        return Err(format!("{} rows, expected at most 100", rows.len()));
    }
    for (i, row) in rows.iter().enumerate() {
        for field in ["id", "name", "price", "created_at"] {
            if row.get(field).is_none() {
                return Err(format!("row {} missing '{}'", i, field));
            }
        }
    }
    Ok(format!("{} rows", rows.len()))
}
