use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "planectl")]
#[command(about = "Management CLI for the control plane admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show monitor state and availability counts
    Status,
    /// List every service with its health and override
    Services,
    /// Set an operator override (none, force_enable, force_disable)
    Override { service: String, mode: String },
    /// Run a health check cycle now
    Check,
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
        Commands::Services => client.get(format!("{}/admin/services", cli.url)),
        Commands::Override { service, mode } => client
            .put(format!("{}/admin/services/{}/override", cli.url, service))
            .json(&json!({ "mode": mode })),
        Commands::Check => client.post(format!("{}/admin/health/check", cli.url)),
    };

    let res = request.headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Err(format!("admin API returned status {}", status).into());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &'static str) -> reqwest::Response {
        let res = axum::http::Response::builder().status(status).body(body).unwrap();
        reqwest::Response::from(res)
    }

    #[tokio::test]
    async fn test_error_status_fails_the_command() {
        let err = print_response(response(401, "")).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_success_body_is_printed() {
        assert!(print_response(response(200, r#"{"available":6}"#)).await.is_ok());
    }
}
