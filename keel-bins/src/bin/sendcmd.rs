//! keel-cmd: push commands into a running engine's intake, the way a
//! strategy process would. Useful for smoke tests and manual cancels.
//!
//! ```bash
//! keel-cmd new-order --ticker-index 0 --direction buy --offset open \
//!     --volume 1 --price 71000
//! keel-cmd cancel-all
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use keel_core::core::protocol::{CmdOrderReq, PROTOCOL_VERSION};
use keel_core::core::types::StrategyId;
use keel_core::ipc::{ShmCommandQueue, TopicCommandClient};
use keel_core::utils::init_logger;
use keel_core::{Config, TraderCommand};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the TOML configuration (for transport settings)
    #[arg(short, long, default_value = "keel.toml")]
    config: PathBuf,

    /// Strategy tag stamped on the command
    #[arg(short, long, default_value = "keel-cmd")]
    strategy: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Submit a new order
    NewOrder {
        #[arg(long)]
        ticker_index: u32,
        #[arg(long, value_enum)]
        direction: DirectionArg,
        #[arg(long, value_enum, default_value = "open")]
        offset: OffsetArg,
        #[arg(long, value_enum, default_value = "limit")]
        order_type: OrderTypeArg,
        #[arg(long)]
        volume: i32,
        #[arg(long, default_value_t = 0.0)]
        price: f64,
        #[arg(long, default_value_t = 0)]
        user_order_id: u32,
        /// Bypass the risk gate (emergency use)
        #[arg(long)]
        without_check: bool,
    },
    /// Cancel one order by its gateway order id
    Cancel {
        #[arg(long)]
        order_id: u64,
    },
    /// Cancel every order on one instrument
    CancelTicker {
        #[arg(long)]
        ticker_index: u32,
    },
    /// Cancel everything
    CancelAll,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum DirectionArg {
    Buy,
    Sell,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OffsetArg {
    Open,
    Close,
    CloseToday,
    CloseYesterday,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OrderTypeArg {
    Limit,
    Market,
    Fak,
    Fok,
}

fn build_command(args: &Args) -> TraderCommand {
    let strategy = StrategyId::from_name(&args.strategy);
    match args.command {
        Command::NewOrder {
            ticker_index,
            direction,
            offset,
            order_type,
            volume,
            price,
            user_order_id,
            without_check,
        } => TraderCommand::new_order(
            strategy,
            CmdOrderReq {
                user_order_id,
                ticker_index,
                direction: match direction {
                    DirectionArg::Buy => 1,
                    DirectionArg::Sell => 2,
                },
                offset: match offset {
                    OffsetArg::Open => 1,
                    OffsetArg::Close => 2,
                    OffsetArg::CloseToday => 4,
                    OffsetArg::CloseYesterday => 8,
                },
                order_type: match order_type {
                    OrderTypeArg::Limit => 1,
                    OrderTypeArg::Market => 2,
                    OrderTypeArg::Fak => 3,
                    OrderTypeArg::Fok => 4,
                },
                volume,
                price,
                flags: 0,
                without_check: without_check as u8,
            },
        ),
        Command::Cancel { order_id } => TraderCommand::cancel_order(strategy, order_id),
        Command::CancelTicker { ticker_index } => {
            TraderCommand::cancel_ticker(strategy, ticker_index)
        }
        Command::CancelAll => TraderCommand::cancel_all(strategy),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    init_logger("info", false);

    let cmd = build_command(&args);
    let engine_cfg = &config.engine;

    if engine_cfg.cmd_queue_key > 0 {
        let mut queue = ShmCommandQueue::attach(
            Path::new(&engine_cfg.shm_dir),
            engine_cfg.cmd_queue_key,
            PROTOCOL_VERSION,
        )?;
        if !queue.push(&cmd) {
            anyhow::bail!("command ring is full");
        }
        tracing::info!("command queued on shm ring {:#x}", engine_cfg.cmd_queue_key);
    } else {
        let mut client =
            TopicCommandClient::connect(Path::new(&engine_cfg.topic_dir), engine_cfg.account_id)?;
        client.send(&cmd)?;
        tracing::info!("command sent to topic for account {}", engine_cfg.account_id);
    }

    Ok(())
}
