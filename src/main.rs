use anyhow::{bail, Context};
use binanceapi::core::kernel::WsSession;
use binanceapi::{BinanceStreams, ExchangeConfig, ExchangeError};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "usage:
    binanceapi stream <name>            print raw frames of one stream, e.g. bnbbtc@aggTrade
    binanceapi combined <name>...       print decoded messages of a combined stream";

fn init_tracing() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("binanceapi=info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Market data needs no credentials. `BINANCE_TESTNET` and
/// `BINANCE_STREAM_URL` are honoured when set.
fn stream_config() -> ExchangeConfig {
    let testnet = env::var("BINANCE_TESTNET")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    let config = ExchangeConfig::read_only().testnet(testnet);
    match env::var("BINANCE_STREAM_URL") {
        Ok(url) => config.stream_url(url),
        Err(_) => config,
    }
}

async fn print_raw_stream(streams: &BinanceStreams, name: &str) -> anyhow::Result<()> {
    let mut ws = streams
        .open_raw_stream(name)
        .await
        .with_context(|| format!("failed to open stream {}", name))?;
    info!(url = ws.url(), "connected");

    loop {
        match ws.next_raw().await {
            Ok(frame) => println!("{}", String::from_utf8_lossy(&frame)),
            Err(ExchangeError::ConnectionClosed) => {
                info!("stream closed");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }
}

async fn print_combined_stream(streams: &BinanceStreams, names: &[String]) -> anyhow::Result<()> {
    let builder = names
        .iter()
        .fold(streams.combined(), |builder, name| builder.subscribe(name.as_str()));

    let mut ws = builder
        .connect()
        .await
        .context("failed to open combined stream")?;
    info!(url = ws.url(), "connected");

    loop {
        match ws.next_message().await {
            Ok(message) => println!("{}", serde_json::to_string(&message)?),
            Err(ExchangeError::UnknownStreamType(stream)) => {
                warn!(%stream, "no decoder for stream, skipping");
            }
            Err(ExchangeError::ConnectionClosed) => {
                info!("stream closed");
                return Ok(());
            }
            Err(e) if e.is_terminal() => return Err(e.into()),
            Err(e) => warn!(error = %e, "skipping undecodable message"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let streams = BinanceStreams::from_config(&stream_config());

    match args.split_first() {
        Some((command, rest)) if command == "stream" && rest.len() == 1 => {
            print_raw_stream(&streams, &rest[0]).await
        }
        Some((command, rest)) if command == "combined" && !rest.is_empty() => {
            print_combined_stream(&streams, rest).await
        }
        _ => {
            eprintln!("{}", USAGE);
            bail!("invalid arguments")
        }
    }
}
