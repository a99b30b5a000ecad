use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use telecare_bot::bot;
use telecare_bot::carrier::CarrierClient;
use telecare_bot::config::{ConnectionType, Settings};
use telecare_bot::engine::App;
use telecare_bot::storage::R2AccountStore;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::update_listeners::webhooks;
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting credentials before they reach the log
/// stream.
struct RedactionPatterns {
    token_url: Regex,
    token_bare: Regex,
    bearer: Regex,
    r2_access: Regex,
    r2_secret: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token_url: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token_bare: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            bearer: Regex::new(r"(?i)(bearer\s+)[A-Za-z0-9._=-]+")?,
            r2_access: Regex::new(r"R2_ACCESS_KEY_ID=[^\s&]+")?,
            r2_secret: Regex::new(r"R2_SECRET_ACCESS_KEY=[^\s&]+")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token_url
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token_bare
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .bearer
            .replace_all(&output, "$1[SESSION_TOKEN]")
            .to_string();
        output = self
            .r2_access
            .replace_all(&output, "R2_ACCESS_KEY_ID=[MASKED]")
            .to_string();
        output = self
            .r2_secret
            .replace_all(&output, "R2_SECRET_ACCESS_KEY=[MASKED]")
            .to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // We return the original buffer length to satisfy the contract,
        // even if the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    init_logging(patterns);

    info!("Starting telecare bot...");

    let settings = init_settings();
    let store = init_storage(&settings).await;
    let carrier = init_carrier(&settings);

    let app = Arc::new(App::new(
        store,
        carrier,
        Duration::from_secs(settings.wizard_ttl_secs),
    ));

    let bot = Bot::new(settings.telegram_token.clone());
    let handler = setup_handler();

    let mut dispatcher = Dispatcher::builder(bot.clone(), handler)
        .dependencies(dptree::deps![app])
        .enable_ctrlc_handler()
        .build();

    match settings.connection_type {
        ConnectionType::Polling => {
            info!("Bot is running (long polling)...");
            dispatcher.dispatch().await;
        }
        ConnectionType::Webhook => {
            let url = settings.webhook_url()?.parse()?;
            let address = ([0, 0, 0, 0], settings.webhook_port).into();
            info!("Bot is running (webhook on port {})...", settings.webhook_port);
            let listener = webhooks::axum(bot, webhooks::Options::new(address, url)).await?;
            dispatcher
                .dispatch_with_listener(
                    listener,
                    LoggingErrorHandler::with_custom_text("Webhook listener error"),
                )
                .await;
        }
    }

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

async fn init_storage(settings: &Settings) -> Arc<R2AccountStore> {
    match R2AccountStore::new(settings).await {
        Ok(s) => {
            if let Err(e) = s.check_connection().await {
                error!("R2 store connection check returned error: {e}");
            }
            Arc::new(s)
        }
        Err(e) => {
            error!("Failed to initialize R2 store: {}", e);
            std::process::exit(1);
        }
    }
}

fn init_carrier(settings: &Settings) -> Arc<CarrierClient> {
    match CarrierClient::new(settings) {
        Ok(c) => {
            info!("Carrier client initialized.");
            Arc::new(c)
        }
        Err(e) => {
            error!("Failed to initialize carrier client: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(Update::filter_message().endpoint(handle_message))
}

async fn handle_message(
    bot: Bot,
    msg: Message,
    app: Arc<App>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_message(bot, msg, app).await {
        error!("Message handler error: {}", e);
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    app: Arc<App>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_callback(bot, q, app).await {
        error!("Callback handler error: {}", e);
    }
    respond(())
}
