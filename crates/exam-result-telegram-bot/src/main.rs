use dotenvy::dotenv;
use exam_result_core::config::ResultSettings;
use exam_result_transport_telegram::config::{BotSettings, TelegramSettings};
use exam_result_transport_telegram::runner::run_bot;
use regex::Regex;
use std::error::Error;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Secrets this bot holds, as (pattern, replacement) pairs applied in order
const SECRET_RULES: &[(&str, &str)] = &[
    // Bot API URLs embed the token in the path
    (r"(/bot)[0-9]{6,12}:[A-Za-z0-9_-]{20,}", "$1[TELEGRAM_TOKEN]"),
    (r"\b[0-9]{8,10}:[A-Za-z0-9_-]{35}\b", "[TELEGRAM_TOKEN]"),
    (r"(TELEGRAM_TOKEN=)[^\s&]+", "$1[MASKED]"),
    (r"(PROXY_API_KEY=)[^\s&]+", "$1[MASKED]"),
    (r"(R2_ACCESS_KEY_ID=)[^\s&]+", "$1[MASKED]"),
    (r"(R2_SECRET_ACCESS_KEY=)[^\s&]+", "$1[MASKED]"),
];

const DEFAULT_FILTER: &str = "exam_result_core=info,exam_result_transport_telegram=info,\
exam_result_telegram_bot=info,teloxide=warn,aws_config=warn,hyper=warn,reqwest=warn";

/// Masks bot tokens, the proxy key and R2 credentials in log output
struct SecretMask {
    rules: Vec<(Regex, &'static str)>,
}

impl SecretMask {
    fn new() -> Result<Self, regex::Error> {
        let rules = SECRET_RULES
            .iter()
            .map(|(pattern, replacement)| Ok((Regex::new(pattern)?, *replacement)))
            .collect::<Result<_, regex::Error>>()?;
        Ok(Self { rules })
    }

    fn apply(&self, line: &str) -> String {
        self.rules
            .iter()
            .fold(line.to_string(), |text, (pattern, replacement)| {
                pattern.replace_all(&text, *replacement).into_owned()
            })
    }
}

/// Stderr writer that masks every log line before it leaves the process
#[derive(Clone)]
struct MaskedStderr {
    mask: Arc<SecretMask>,
}

struct MaskedLine {
    mask: Arc<SecretMask>,
}

impl Write for MaskedLine {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let masked = self.mask.apply(&String::from_utf8_lossy(buf));
        io::stderr().write_all(masked.as_bytes())?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()
    }
}

impl<'a> MakeWriter<'a> for MaskedStderr {
    type Writer = MaskedLine;

    fn make_writer(&'a self) -> Self::Writer {
        MaskedLine {
            mask: Arc::clone(&self.mask),
        }
    }
}

fn init_logging(mask: Arc<SecretMask>) {
    let debug_mode = std::env::var("DEBUG_MODE").is_ok_and(|v| v == "true" || v == "1");
    let fallback = if debug_mode { "debug" } else { DEFAULT_FILTER };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(MaskedStderr { mask }))
        .init();
}

/// Loads both settings layers and rejects a bot that could not reach anyone
fn load_settings() -> Result<BotSettings, Box<dyn Error>> {
    let results = ResultSettings::new()?;
    let telegram = TelegramSettings::new()?;

    if telegram.telegram_token.trim().is_empty() {
        return Err("TELEGRAM_TOKEN is not set".into());
    }
    if telegram.channel_id.trim().is_empty() {
        return Err("CHANNEL_ID is not set".into());
    }

    info!(
        channel = %telegram.channel_id,
        admins = results.admin_ids().len(),
        r2 = results.has_r2(),
        "Configuration loaded."
    );
    Ok(BotSettings::new(results, telegram))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    let mask = Arc::new(SecretMask::new().inspect_err(|e| {
        eprintln!("Invalid secret mask pattern: {e}");
    })?);
    init_logging(mask);

    info!("Starting exam result bot...");
    let settings = match load_settings() {
        Ok(settings) => Arc::new(settings),
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    run_bot(settings).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bot_token_is_masked_in_api_urls() -> Result<(), regex::Error> {
        let mask = SecretMask::new()?;

        let line = mask.apply(
            "GET https://api.telegram.org/bot123456789:AAbbCCddEEffGGhhIIjjKKllMMnnOOppQQr/getMe",
        );

        assert_eq!(line, "GET https://api.telegram.org/bot[TELEGRAM_TOKEN]/getMe");
        Ok(())
    }

    #[test]
    fn test_env_style_secrets_are_masked() -> Result<(), regex::Error> {
        let mask = SecretMask::new()?;

        let line = mask.apply("PROXY_API_KEY=abc123 R2_ACCESS_KEY_ID=id R2_SECRET_ACCESS_KEY=xyz&x=1");

        assert_eq!(
            line,
            "PROXY_API_KEY=[MASKED] R2_ACCESS_KEY_ID=[MASKED] R2_SECRET_ACCESS_KEY=[MASKED]&x=1"
        );
        Ok(())
    }

    #[test]
    fn test_unrelated_numbers_pass_through() -> Result<(), regex::Error> {
        let mask = SecretMask::new()?;
        let line = "Lookup finished for registration 1234567 in 320 ms";
        assert_eq!(mask.apply(line), line);
        Ok(())
    }
}
