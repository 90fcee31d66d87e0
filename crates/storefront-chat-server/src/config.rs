//! Command-line and environment configuration.

use clap::Parser;
use std::path::PathBuf;
use storefront_chat::config::DEFAULT_SITE;
use storefront_chat::{AssistantSettings, FetcherConfig};

/// Origins allowed when `ALLOWED_ORIGINS` is not set.
pub const DEFAULT_ALLOWED_ORIGINS: &[&str] = &[
    "https://www.hottiebodyjewelry.com",
    "https://hottiebodyjewelry.com",
    "http://localhost:3001",
    "http://localhost:5173",
    "http://127.0.0.1:5173",
];

#[derive(Parser, Debug, Clone)]
#[command(
    name = "storefront-chat-server",
    about = "Chat widget backend: answers shopper questions from the live storefront",
    version
)]
pub struct Cli {
    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Rules file (FAQs, aliases, promoted products, course override).
    #[arg(long, env = "RULES_FILE", default_value = "rules.json")]
    pub rules: PathBuf,

    /// Informational pages to ingest at startup.
    #[arg(long, env = "PAGES_FILE", default_value = "pages.json")]
    pub pages: PathBuf,

    /// Storefront origin to scrape.
    #[arg(long, env = "SITE", default_value = DEFAULT_SITE)]
    pub site: String,

    /// Comma-separated CORS allow-list.
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Upstream request timeout in milliseconds.
    #[arg(long, env = "TIMEOUT_MS", default_value_t = 15_000)]
    pub timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    /// The CORS allow-list, falling back to the storefront and dev origins.
    pub fn origins(&self) -> Vec<String> {
        let configured: Vec<String> = self
            .allowed_origins
            .iter()
            .map(|o| o.trim().trim_end_matches('/').to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if configured.is_empty() {
            DEFAULT_ALLOWED_ORIGINS.iter().map(|o| o.to_string()).collect()
        } else {
            configured
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn fetcher_config(&self) -> FetcherConfig {
        FetcherConfig {
            timeout_ms: self.timeout_ms,
            ..FetcherConfig::default()
        }
    }

    pub fn assistant_settings(&self) -> AssistantSettings {
        AssistantSettings::default()
    }
}
