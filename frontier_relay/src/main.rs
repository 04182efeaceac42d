// CLI entry point for the Frontier relay.
//
// Starts a standalone relay that game clients connect to. The relay batches
// intents into turns and broadcasts them; it never runs the sim. See
// `server.rs` for the networking architecture and `session.rs` for the
// session state.
//
// Usage:
//   relay [OPTIONS]
//     --host <HOST>              Bind address (default: 127.0.0.1)
//     --port <PORT>              Listen port (default: 7878)
//     --game-id <ID>             Game id, 8 alphanumerics (default: Frontier)
//     --turn-interval-ms <MS>    Turn cadence (default: 100)
//     --config <PATH>            JSON game config sent to clients in `start`
//     --idle-timeout-secs <S>    Close silent connections; 0 disables (default: 30)
//
// Logging goes through `env_logger`; set `RUST_LOG=debug` for per-message
// detail.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use frontier_protocol::GameId;
use frontier_relay::server::{RelayConfig, start_relay};
use log::{error, info};

#[derive(Parser, Debug)]
#[command(name = "relay", about = "Frontier turn relay")]
struct Args {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 7878)]
    port: u16,

    #[arg(long, default_value = "Frontier")]
    game_id: String,

    #[arg(long, default_value_t = 100)]
    turn_interval_ms: u64,

    /// JSON file with the game config; clients fall back to defaults without one.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seconds of silence before a connection is closed. 0 disables.
    #[arg(long, default_value_t = 30)]
    idle_timeout_secs: u64,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let game_config = match &args.config {
        Some(path) => match load_game_config(path) {
            Ok(value) => value,
            Err(e) => {
                error!("failed to read config {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => serde_json::Value::Null,
    };

    let config = RelayConfig {
        host: args.host,
        port: args.port,
        game_id: GameId::new(args.game_id),
        turn_interval: Duration::from_millis(args.turn_interval_ms),
        game_config,
        idle_timeout: (args.idle_timeout_secs > 0)
            .then_some(Duration::from_secs(args.idle_timeout_secs)),
    };

    let (handle, addr) = match start_relay(config) {
        Ok(result) => result,
        Err(e) => {
            error!("failed to start relay: {e}");
            std::process::exit(1);
        }
    };

    info!("relay listening on {addr}; stop with Ctrl+C");
    handle.wait();
}

fn load_game_config(path: &PathBuf) -> Result<serde_json::Value, Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}
