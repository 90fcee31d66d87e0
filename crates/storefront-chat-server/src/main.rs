//! Storefront chat server entry point.

use std::sync::Arc;

use clap::Parser;

use storefront_chat::{Assistant, HttpFetcher, PagesConfig, RulesConfig, SiteLinks};
use storefront_chat_server::{router, start, AppState, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let rules = RulesConfig::load_or_default(&cli.rules);
    let pages = PagesConfig::load_or_default(&cli.pages);

    let fetcher = Arc::new(HttpFetcher::new(cli.fetcher_config()));
    let assistant = Arc::new(Assistant::new(
        fetcher,
        SiteLinks::for_site(&cli.site),
        rules,
        cli.assistant_settings(),
    ));

    let docs = assistant.load_documents(&pages).await;
    tracing::info!(
        version = storefront_chat::VERSION,
        docs,
        site = %cli.site,
        "storefront chat booted"
    );

    let app = router(AppState::new(assistant), &cli.origins());
    start(&cli.bind_addr(), app).await
}
