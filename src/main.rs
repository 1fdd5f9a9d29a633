use chrono::{DateTime, FixedOffset, Utc};
use cointbot::config::PairTradeConfig;
use cointbot::execution_alert::init_execution_alerts;
use cointbot::pairtrade::PairTradeEngine;
use cointbot::ports::replay_feed::ReplayFeed;
use cointbot::trade::execution::gateway_box::GatewayBox;
use env_logger::Builder;
use log::LevelFilter;
use std::env;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Initialize logging with local timezone
    let offset_seconds = env::var("TIMEZONE_OFFSET")
        .unwrap_or_else(|_| "3600".to_string())
        .parse::<i32>()
        .expect("Invalid TIMEZONE_OFFSET");
    let offset = FixedOffset::east_opt(offset_seconds).expect("Invalid offset");
    Builder::from_default_env()
        .format(move |buf, record| {
            let utc_now: DateTime<Utc> = Utc::now();
            let local_now = utc_now.with_timezone(&offset);
            writeln!(
                buf,
                "{} [{}] - {}",
                local_now.format("%Y-%m-%dT%H:%M:%S%z"),
                record.level(),
                record.args()
            )
        })
        .filter(
            None,
            LevelFilter::from_str(&env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
                .unwrap_or(LevelFilter::Debug),
        )
        .init();

    let git_hash = option_env!("COINTBOT_GIT_HASH").unwrap_or("unknown");
    log::info!("cointbot git: {}", git_hash);
    log::info!("Starting pair-trade backtest...");

    let cfg = PairTradeConfig::from_env_or_yaml().expect("invalid pair trade config");
    init_execution_alerts(cfg.agent_name.as_deref());
    let backtest_file = cfg
        .backtest_file
        .clone()
        .expect("BACKTEST_FILE (or backtest_file in the YAML config) is required");
    let mut feed = ReplayFeed::new(&backtest_file).expect("failed to load replay data");
    let gateway =
        GatewayBox::create(&cfg.gateway, cfg.dry_run).expect("failed to create order gateway");

    let mut engine = PairTradeEngine::new(cfg, Arc::new(gateway));
    engine
        .run(&mut feed)
        .await
        .map(|_| ())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
}
