//! Search example for the Mailosaur Rust client.
//!
//! Required environment variables (available in the API tab of a server):
//! - MAILOSAUR_API_KEY
//! - MAILOSAUR_SERVER_ID
//! - MAILOSAUR_SERVER_DOMAIN
//!
//! Run with:
//! ```bash
//! cargo run --example demo
//! ```

use mailosaur_client::{Client, SearchCriteria, SearchOptions};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("mailosaur_client=debug")
        .init();

    let server_id = std::env::var("MAILOSAUR_SERVER_ID")?;
    let server_domain = std::env::var("MAILOSAUR_SERVER_DOMAIN")?;

    let client = Client::from_env()?;
    println!("✅ Client ready for {}", client.base_url());

    let criteria = SearchCriteria::new().with_sent_to(format!("anything@{server_domain}"));
    let options = SearchOptions::new().with_timeout(Duration::from_secs(30));

    println!("\n⏳ Waiting for a message to anything@{server_domain} (30s max)...");
    let message = client.search(&server_id, &criteria, &options).await?;

    println!("\nSubject: {}", message.subject);
    println!("From: {}", message.sender_email().unwrap_or("<unknown>"));
    println!("Body (text): {}", message.text_body().unwrap_or(""));
    println!("Total links: {}", message.links().len());
    if let Some(link) = message.first_link() {
        println!(
            "First link: {} ({})",
            link.text.as_deref().unwrap_or(""),
            link.href.as_deref().unwrap_or("")
        );
    }
    println!("Total attachments: {}", message.attachments.len());
    for attachment in &message.attachments {
        println!(
            "   - {} ({}, {} bytes)",
            attachment.file_name.as_deref().unwrap_or("<unnamed>"),
            attachment.content_type.as_deref().unwrap_or("unknown"),
            attachment.length.unwrap_or(0)
        );
    }

    Ok(())
}
