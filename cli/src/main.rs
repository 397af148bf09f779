//! tokenomics-emulator CLI - run an emulation from a JSON configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokenomics_emulator_core_rs::{
    Configuration, Consumer, ConsumerFactory, Emulator, OrderingAgentCommand, OrderingAgentView,
    Product, ProducingAgentCommand, ProducingAgentView, RandomConsumer, SequentialIdGenerator,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "tokenomics-emulator")]
#[command(about = "Deterministic emulator of a tokenized production economy")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cycles with random consumers and automatic bidding
    Run {
        /// Path to the JSON configuration
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Number of cycles to run
        #[arg(short, long, default_value_t = 10)]
        cycles: u64,

        /// Number of random consumers
        #[arg(long, default_value_t = 4)]
        consumers: u64,

        /// Seed of the first consumer; the others use the following seeds
        #[arg(short, long, default_value_t = 42)]
        seed: u64,

        /// Expected requests per consumer and cycle
        #[arg(long, default_value_t = 1.0)]
        rate: f64,

        /// Start a restoration when capacity falls below this percent of max
        #[arg(long, default_value_t = 90)]
        restore_below: u64,

        /// Write every event as one JSON object per line to this file
        #[arg(long, value_name = "PATH")]
        events: Option<PathBuf>,
    },
    /// Validate a configuration and print its fingerprint
    Validate {
        #[arg(value_name = "CONFIG")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            cycles,
            consumers,
            seed,
            rate,
            restore_below,
            events,
        } => {
            let config = Configuration::load(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            let mut sink = match events {
                Some(path) => Some(BufWriter::new(
                    File::create(&path).with_context(|| format!("creating {}", path.display()))?,
                )),
                None => None,
            };

            let products = demand_products(&config);
            info!(consumers, products = products.len(), seed, "Building emulator");
            let factory: ConsumerFactory = Box::new(move || {
                (0..consumers)
                    .map(|i| {
                        Box::new(RandomConsumer::new(
                            format!("consumer-{}", i).into(),
                            seed.wrapping_add(i),
                            products.clone(),
                            rate,
                        )) as Box<dyn Consumer>
                    })
                    .collect()
            });
            let emulator = Emulator::new(config, Arc::new(SequentialIdGenerator::new()), factory)?;

            let mut total_score = 0u64;
            for _ in 0..cycles {
                invest(&emulator, restore_below)?;
                emulator.start_ordering()?;
                bid(&emulator)?;
                let result = emulator.complete_cycle()?;
                total_score += u64::from(result.score);
                info!(
                    cycle = result.cycle,
                    score = result.score,
                    completed = result.completed,
                    rejected = result.rejected,
                    "Cycle completed"
                );

                // Drain every cycle, with or without a sink
                let drained = emulator.drain_events();
                if let Some(out) = sink.as_mut() {
                    for event in drained {
                        serde_json::to_writer(&mut *out, &event)?;
                        out.write_all(b"\n")?;
                    }
                }
            }
            if let Some(mut out) = sink {
                out.flush()?;
            }

            let info = emulator.system_info();
            info!(cycles, total_score, fund = info.investment_fund, "Run finished");
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::Validate { config } => {
            let config = Configuration::load(&config)
                .with_context(|| format!("validating {}", config.display()))?;
            info!(
                products = config.process_sheets.len(),
                producers = config.producer_configs.len(),
                "Configuration is valid"
            );
            println!("{}", config.fingerprint()?);
        }
    }

    Ok(())
}

/// Products consumers may request: every product that is not an investment
/// product, or every product when all of them are
fn demand_products(config: &Configuration) -> Vec<Product> {
    let investment: BTreeSet<Product> = config
        .producer_configs
        .iter()
        .flat_map(|p| [p.restoration.product, p.upgrade.product])
        .collect();
    let products: Vec<Product> = config
        .process_sheets
        .iter()
        .map(|s| s.product)
        .filter(|p| !investment.contains(p))
        .collect();
    if products.is_empty() {
        return config.process_sheets.iter().map(|s| s.product).collect();
    }
    products
}

/// Restore worn-down producers and upgrade overbooked ones
fn invest(emulator: &Emulator, restore_below: u64) -> Result<()> {
    for id in emulator.producer_infos().into_keys() {
        let view = emulator.producing_agent_view(&id)?;
        let cmd = investment_command(&view, restore_below);
        if !(cmd.do_upgrade || cmd.do_restoration) {
            continue;
        }
        let orders = emulator.producing_agent_action(&id, cmd)?;
        info!(producer = %id, orders = orders.len(), "Investment requested");
    }
    Ok(())
}

fn investment_command(view: &ProducingAgentView, restore_below: u64) -> ProducingAgentCommand {
    let worn = u128::from(view.capacity) * 100 < u128::from(view.max_capacity) * u128::from(restore_below);
    ProducingAgentCommand {
        do_upgrade: !view.upgrade_running && view.requested_capacity > view.capacity,
        do_restoration: !view.restoration_running && worn,
    }
}

/// Submit a command for every requester with open orders
fn bid(emulator: &Emulator) -> Result<()> {
    for agent in emulator.ordering_agent_infos() {
        if agent.open_orders == 0 {
            continue;
        }
        let view = emulator.ordering_agent_view(&agent.id)?;
        let Some(cmd) = bidding_command(&view) else {
            warn!(agent = %agent.id, "No producer for a required capacity type");
            continue;
        };
        emulator.ordering_agent_action(&agent.id, &cmd)?;
    }
    Ok(())
}

/// Split each order's tokens evenly over its required parts, the remainder
/// going to the last part, and bid each part at the largest producer of
/// its type
fn bidding_command(view: &OrderingAgentView) -> Option<OrderingAgentCommand> {
    let mut cmd = OrderingAgentCommand::default();
    for (order_id, order) in &view.orders {
        let parts = order.required.len() as u64;
        let share = order.tokens / parts.max(1);
        let mut left = order.tokens;
        for (i, capacity_type) in order.required.keys().enumerate() {
            let (producer_id, _) = view
                .producers
                .get(capacity_type)?
                .iter()
                .max_by_key(|(_, p)| p.capacity)?;
            let tokens = if i as u64 + 1 == parts { left } else { share };
            left -= tokens;
            cmd = cmd.bid(order_id.clone(), producer_id.clone(), tokens);
        }
    }
    Some(cmd)
}
