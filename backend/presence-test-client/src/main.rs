// src/main.rs

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::error::Error;

// Response types
#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    role: Option<String>,
    snapshot: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridSummary {
    title: String,
    rows: Vec<Value>,
    totals: Value,
}

async fn print_grid(client: &Client, url: &str) -> Result<(), Box<dyn Error>> {
    let response = client.get(url).send().await?;
    println!("Status: {}", response.status());

    if response.status().is_success() {
        let grid = response.json::<GridSummary>().await?;
        println!("{}: {} rows, totals {}", grid.title, grid.rows.len(), grid.totals);
    } else {
        println!("Request failed: {}", response.text().await?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let base_url = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("PRESENCE_BASE_URL").ok())
        .unwrap_or_else(|| "http://localhost:3000".to_string());
    let base_url = base_url.trim_end_matches('/');
    let client = Client::new();

    // Test 1: Health check
    println!("\n🔍 Testing health check endpoint...");
    let health = client
        .get(format!("{}/health", base_url))
        .send()
        .await?
        .json::<HealthResponse>()
        .await?;
    println!("Health: status={}, role={:?}", health.status, health.role);
    println!("Snapshot: {}", health.snapshot);

    if health.role.is_none() {
        println!("\n⚠️ The service has no session with the attendance API.");
        println!("Set PRESENCE_API_EMAIL/PRESENCE_API_PASSWORD or PRESENCE_API_TOKEN and restart it.");
        return Ok(());
    }

    // Test 2: Day grid
    println!("\n🔍 Testing day presence grid...");
    print_grid(&client, &format!("{}/api/presence/day", base_url)).await?;

    // Test 3: Week grid
    println!("\n🔍 Testing week presence grid...");
    print_grid(&client, &format!("{}/api/presence/week", base_url)).await?;

    // Test 4: Filter enumerations
    println!("\n🔍 Testing segment and shift lists...");
    for path in ["/api/segments", "/api/shifts"] {
        let response = client.get(format!("{}{}", base_url, path)).send().await?;
        println!("{} -> {}: {}", path, response.status(), response.text().await?);
    }

    // Test 5: Manual refresh
    println!("\n🔍 Testing manual refresh...");
    let refresh = client
        .post(format!("{}/api/refresh", base_url))
        .send()
        .await?;
    println!("Refresh status: {}", refresh.status());

    println!("\n✅ Smoke test finished");
    Ok(())
}
