mod bots;
mod config;
mod events;
mod host;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::mpsc;

use config::ServerConfig;
use events::ServerEvent;
use skirmish::{ClientSession, HostSession, LinkSimulation, TickConfig, loopback};

#[derive(Parser)]
#[command(name = "skirmish-server")]
#[command(about = "Headless authoritative host with scripted bot clients")]
struct Args {
    #[arg(short, long, default_value_t = 10)]
    tick_rate: u32,

    #[arg(long, default_value_t = 60, help = "Physics steps per second to approximate")]
    animation_rate: u32,

    #[arg(long, default_value_t = 1.5, help = "Ticks the host clock trails the clients by")]
    start_delay_ticks: f64,

    #[arg(short, long, default_value_t = 2)]
    bots: usize,

    #[arg(short, long, default_value_t = 2)]
    npcs: usize,

    #[arg(short, long, default_value_t = 10, help = "Seconds to run, 0 runs until interrupted")]
    duration: u64,

    #[arg(long, help = "Enable packet loss simulation on every link")]
    simulate_packet_loss: bool,

    #[arg(long, default_value_t = 0.0, help = "Packet loss percentage (0-100)")]
    loss_percent: f32,

    #[arg(long, default_value_t = 0, help = "Minimum latency in ms")]
    min_latency: u32,

    #[arg(long, default_value_t = 0, help = "Maximum latency in ms")]
    max_latency: u32,

    #[arg(long, default_value_t = 0, help = "Jitter in ms")]
    jitter: u32,
}

impl Args {
    fn into_config(self) -> ServerConfig {
        let link = LinkSimulation {
            enabled: self.simulate_packet_loss,
            loss_percent: self.loss_percent,
            min_latency_ms: self.min_latency,
            max_latency_ms: self.max_latency,
            jitter_ms: self.jitter,
        };
        let run_for = if self.duration == 0 {
            Duration::MAX
        } else {
            Duration::from_secs(self.duration)
        };

        ServerConfig {
            tick: TickConfig {
                tick_rate: self.tick_rate,
                animation_rate: self.animation_rate,
                start_delay_ticks: self.start_delay_ticks,
                ..Default::default()
            },
            bots: self.bots,
            npcs: self.npcs,
            run_for,
            link,
            ..Default::default()
        }
    }
}

fn main() -> Result<()> {
    let config = Args::parse().into_config();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run(config))
}

async fn run(config: ServerConfig) -> Result<()> {
    let init = config.session_init();
    let players = init.player_ids();
    let (host_end, client_ends) = loopback(&players, config.link);

    let (events, mut inbox) = mpsc::unbounded_channel::<ServerEvent>();
    let logger = tokio::spawn(async move {
        while let Some(event) = inbox.recv().await {
            event.log();
        }
    });

    log::info!(
        "Hosting {} bots and {} npcs at {} Hz ({} steps per tick)",
        config.bots,
        config.npcs,
        config.tick.tick_rate,
        config.tick.steps_per_tick()
    );

    let running = Arc::new(AtomicBool::new(true));
    let mut bot_tasks = Vec::with_capacity(players.len());
    for (index, (player, end)) in players.iter().zip(client_ends).enumerate() {
        let session = ClientSession::new(&init, *player, end, config.client, config.entity)?;
        let pattern = bots::Pattern::for_bot(index);
        bot_tasks.push(bots::spawn(session, pattern, Arc::clone(&running), events.clone()));
    }

    let session = HostSession::new(&init, host_end, config.tick, config.entity)?;
    let host = host::spawn(session, config.tick.ms_per_tick(), events.clone());

    tokio::select! {
        _ = tokio::time::sleep(config.run_for) => {}
        _ = tokio::signal::ctrl_c() => log::info!("Interrupted"),
    }

    running.store(false, Ordering::SeqCst);
    for bot in bot_tasks {
        if let Err(err) = bot.await? {
            log::warn!("Bot ended with {err}");
        }
    }

    if host.is_finished() {
        log::warn!("Host stopped before shutdown");
    }
    let stats = host.stop().await?;
    log::info!("Server shutting down after {} ticks", stats.ticks);

    drop(events);
    logger.await?;
    Ok(())
}
