use mail_assist::config::Config;
use mail_assist::llm::GeminiClient;
use mail_assist::mail::{ImapFetcher, SmtpSender};
use mail_assist::pipeline;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // All error paths are logged and swallowed — the process always exits 0.
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Startup failed: {e}");
            return Ok(());
        }
    };

    eprintln!("📬 Mail Assist v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Account: {}", config.account);
    eprintln!("   IMAP: {}:{}", config.imap_host, config.imap_port);
    eprintln!("   SMTP: {}:{}", config.smtp_host, config.smtp_port);
    eprintln!("   Model: {}\n", config.model);

    let fetcher = ImapFetcher::new(&config);
    let generator = GeminiClient::new(&config);
    let sender = SmtpSender::new(&config);

    if let Err(e) = pipeline::run_once(&fetcher, &generator, &sender, config.dedup).await {
        tracing::error!("Fetch failed: {e}");
    }

    Ok(())
}
