use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{error, info, warn};

use afya_ai::{ClientManager, Conversation, Message, OperationCategory};
use afya_core::AfyaConfig;
use afya_core::logging;

const VERSION: &str = env!("CARGO_PKG_VERSION");

const USAGE: &str = "usage: afya [--timeout SECS] <category> <question...>\n\
categories: system | query | interactive | chat | report | analysis | visualization";

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
struct Args {
    category: OperationCategory,
    question: String,
    timeout: Option<Duration>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut args = args.into_iter().peekable();
    let mut timeout = None;

    if args.peek().map(String::as_str) == Some("--timeout") {
        args.next();
        let secs: u64 = args
            .next()
            .context("--timeout needs a value")?
            .parse()
            .context("--timeout must be a whole number of seconds")?;
        timeout = Some(Duration::from_secs(secs));
    }

    let Some(tag) = args.next() else {
        bail!("{USAGE}");
    };
    let question = args.collect::<Vec<_>>().join(" ");
    if question.trim().is_empty() {
        bail!("{USAGE}");
    }

    Ok(Args {
        category: OperationCategory::from_tag(&tag),
        question,
        timeout,
    })
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(std::env::args().skip(1))?;

    // The subscriber needs `log_level`, so the config is read first and its
    // origin is logged once logging is up.
    let (config, origin) = AfyaConfig::load()?;

    let _log_guard =
        logging::init_logging(&config.log_level).context("Failed to initialize logging")?;
    info!("Starting Afya v{VERSION}");
    info!("{origin}");

    let manager = match ClientManager::new(&config) {
        Ok(manager) => manager,
        Err(e) => {
            error!("Client manager init failed: {e}");
            bail!("{}", e.user_message());
        }
    };

    let conversation = Conversation::new(vec![Message::user(args.question)]);
    let result = manager
        .complete(args.category, &conversation, args.timeout)
        .await;

    if result.degraded {
        warn!("Answer served by the offline responder");
    }
    println!("{}", result.text);

    let snapshot = manager.shutdown();
    let report = serde_json::json!({
        "category": args.category,
        "provider_used": result.provider_used,
        "degraded": result.degraded,
        "snapshot": snapshot,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn category_and_question() {
        let parsed = args(&["chat", "Show", "total", "CHWs"]).unwrap();
        assert_eq!(parsed.category, OperationCategory::Interactive);
        assert_eq!(parsed.question, "Show total CHWs");
        assert_eq!(parsed.timeout, None);
    }

    #[test]
    fn timeout_flag() {
        let parsed = args(&["--timeout", "30", "system", "init"]).unwrap();
        assert_eq!(parsed.timeout, Some(Duration::from_secs(30)));
        assert_eq!(parsed.category, OperationCategory::System);
    }

    #[test]
    fn unknown_category_routes_to_default() {
        let parsed = args(&["whatever", "hello"]).unwrap();
        assert_eq!(parsed.category, OperationCategory::Default);
    }

    #[test]
    fn missing_question_is_an_error() {
        assert!(args(&[]).is_err());
        assert!(args(&["report"]).is_err());
        assert!(args(&["--timeout", "x", "report", "q"]).is_err());
    }
}
