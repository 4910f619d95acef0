mod app;
mod config;
mod dashboard;
mod data;
mod engine;
mod lead;
mod prices;
mod report;
mod tui;
mod ui;
mod webui;

use app::App;
use clap::Parser;
use config::{AppConfig, ProviderKind};
use data::CachedProvider;
use std::io;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "BIST-30 portfolio dashboard: compare a hand-picked basket against the top performers and XU030",
    after_help = "EXAMPLES:
    # Terminal dashboard with two stocks preselected
    cargo run --release -- --symbols THYAO.IS,ASELS.IS

    # One-off returns / volatility / correlation report
    cargo run --release -- --report

    # Web dashboard on port 8080 using offline sample data
    cargo run --release -- --webui --provider fixture"
)]
struct Args {
    /// Print the one-year returns, volatility and correlation report, then exit
    #[arg(long)]
    report: bool,

    /// Launch in WebUI mode
    #[arg(long)]
    webui: bool,

    /// WebUI server port
    #[arg(long, default_value_t = 8080)]
    webui_port: u16,

    /// Comma-separated symbols to preselect (e.g., THYAO.IS,ASELS.IS)
    #[arg(long)]
    symbols: Option<String>,

    /// Price source: yahoo | fixture. Overrides BIST_DATA_PROVIDER.
    #[arg(long, value_parser = ["yahoo", "fixture"])]
    provider: Option<String>,
}

fn default_log_filter(args: &Args) -> &'static str {
    if args.report || args.webui {
        "bist_portfolio=info"
    } else {
        "off"
    }
}

#[tokio::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    // The terminal dashboard owns the screen; it only logs when RUST_LOG asks.
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(&args)));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let mut config = AppConfig::from_env();
    if let Some(raw) = &args.provider {
        match ProviderKind::parse(raw) {
            Some(kind) => config.provider = kind,
            None => {
                error!("Unknown --provider {}. Allowed values: yahoo | fixture", raw);
                return Ok(());
            }
        }
    }
    info!("Using {} price provider", config.provider.as_str());

    let provider = Arc::new(CachedProvider::new(data::build_provider(&config)));

    if args.report {
        report::run_report(provider.as_ref(), &config).await;
        return Ok(());
    }

    if args.webui {
        match webui::run_webui_server(args.webui_port, config, provider).await {
            Ok(_) => info!("WebUI exited."),
            Err(e) => error!("WebUI failed: {}", e),
        }
        return Ok(());
    }

    let preselected: Vec<String> = args
        .symbols
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    let mut app = App::new(config, provider);
    app.preselect(preselected.as_slice());

    let mut terminal = tui::init()?;
    let res = app.run(&mut terminal).await;

    tui::restore()?;
    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_dashboard_is_silent_by_default() {
        let tui = Args::parse_from(["bist-portfolio", "--symbols", "THYAO.IS"]);
        assert_eq!(default_log_filter(&tui), "off");

        let report = Args::parse_from(["bist-portfolio", "--report"]);
        assert_eq!(default_log_filter(&report), "bist_portfolio=info");

        let web = Args::parse_from(["bist-portfolio", "--webui", "--webui-port", "9000"]);
        assert_eq!(default_log_filter(&web), "bist_portfolio=info");
        assert_eq!(web.webui_port, 9000);

        assert!(Args::try_parse_from(["bist-portfolio", "--provider", "bloomberg"]).is_err());
    }
}
