//! Sends signed sample webhooks to a running server and logs each response.

use anyhow::Context;
use autopay_core::security::signature::{sign, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use clap::{Parser, ValueEnum};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "mock_sender")]
#[command(about = "Send signed sample payment webhooks", long_about = None)]
struct Args {
    /// Webhook endpoint
    #[arg(long, default_value = "http://localhost:3000/webhook")]
    url: String,

    /// Scenario to run
    #[arg(long, value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    All,
    Valid,
    Duplicate,
    TamperedBody,
    SameAccounts,
    MissingTimestamp,
    Stale,
}

struct Sender {
    client: reqwest::Client,
    url: String,
    secret: String,
}

impl Sender {
    async fn send(&self, label: &str, body: &str, timestamp: Option<i64>, signature: Option<String>) {
        let mut request = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_string());

        if let Some(ts) = timestamp {
            request = request.header(TIMESTAMP_HEADER, ts.to_string());
        }
        if let Some(sig) = signature {
            request = request.header(SIGNATURE_HEADER, sig);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                let text = response.text().await.unwrap_or_default();
                tracing::info!(scenario = label, status = status.as_u16(), response = %text, "Webhook sent");
            }
            Err(e) => tracing::error!(scenario = label, error = %e, "Request failed"),
        }
    }

    async fn send_signed(&self, label: &str, payload: &Value) -> anyhow::Result<()> {
        let body = serde_json::to_string(payload)?;
        let ts = now();
        let signature = sign(self.secret.as_bytes(), &ts.to_string(), body.as_bytes());
        self.send(label, &body, Some(ts), Some(signature)).await;
        Ok(())
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

fn sample_payload() -> Value {
    let seed = Uuid::new_v4();
    let cents = seed.as_u128() % 10_000 + 1;
    let hex = seed.simple().to_string();

    json!({
        "tx_id": format!("tx_{}", &hex[..12]),
        "amount": format!("{}.{:02}", cents / 100, cents % 100),
        "currency": "USD",
        "sender_account": format!("ACC{}", hex[12..20].to_uppercase()),
        "receiver_account": format!("ACC{}", hex[20..28].to_uppercase()),
        "description": format!("Payment for order #{}", hex[..10].to_uppercase()),
    })
}

async fn run(sender: &Sender, scenario: Scenario) -> anyhow::Result<()> {
    let run_all = scenario == Scenario::All;
    let first = sample_payload();

    if run_all || scenario == Scenario::Valid {
        sender.send_signed("valid", &first).await?;
    }

    if run_all || scenario == Scenario::Duplicate {
        if !run_all {
            sender.send_signed("valid", &first).await?;
        }
        sender.send_signed("duplicate", &first).await?;
    }

    if run_all || scenario == Scenario::TamperedBody {
        let payload = sample_payload();
        let body = serde_json::to_string(&payload)?;
        let ts = now();
        let signature = sign(sender.secret.as_bytes(), &ts.to_string(), body.as_bytes());

        let mut tampered = payload;
        tampered["amount"] = json!("99999.99");
        let tampered_body = serde_json::to_string(&tampered)?;
        sender
            .send("tampered_body", &tampered_body, Some(ts), Some(signature))
            .await;
    }

    if run_all || scenario == Scenario::SameAccounts {
        let mut payload = sample_payload();
        payload["receiver_account"] = payload["sender_account"].clone();
        sender.send_signed("same_accounts", &payload).await?;
    }

    if run_all || scenario == Scenario::MissingTimestamp {
        let body = serde_json::to_string(&sample_payload())?;
        let signature = sign(sender.secret.as_bytes(), &now().to_string(), body.as_bytes());
        sender
            .send("missing_timestamp", &body, None, Some(signature))
            .await;
    }

    if run_all || scenario == Scenario::Stale {
        let body = serde_json::to_string(&sample_payload())?;
        let ts = now() - 3600;
        let signature = sign(sender.secret.as_bytes(), &ts.to_string(), body.as_bytes());
        sender.send("stale", &body, Some(ts), Some(signature)).await;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();
    let secret = std::env::var("HMAC_SECRET_KEY")
        .ok()
        .filter(|s| !s.is_empty())
        .context("HMAC_SECRET_KEY is required but not set")?;
    tracing::info!("HMAC_SECRET_KEY loaded (length: {})", secret.len());

    let sender = Sender {
        client: reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?,
        url: args.url,
        secret,
    };

    run(&sender, args.scenario).await
}
