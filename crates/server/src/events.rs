use skirmish::EntityId;
use skirmish::net::{ClientStats, HostStats};

use crate::bots::Pattern;

#[derive(Debug, Clone)]
pub enum ServerEvent {
    BotJoined {
        player: EntityId,
        pattern: Pattern,
    },
    SessionStarted {
        players: usize,
    },
    BotFinished {
        player: EntityId,
        stats: ClientStats,
    },
    HostStopped {
        stats: HostStats,
        time: f64,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    pub fn log(&self) {
        match self {
            ServerEvent::BotJoined { player, pattern } => {
                log::info!("Bot {} joined ({})", player, pattern.as_str());
            }
            ServerEvent::SessionStarted { players } => {
                log::info!("Session started with {} players", players);
            }
            ServerEvent::BotFinished { player, stats } => {
                log::info!(
                    "Bot {} ran {} frames, {} snapshots, {} corrections, {} dropped",
                    player,
                    stats.frames,
                    stats.snapshots,
                    stats.corrections,
                    stats.dropped
                );
            }
            ServerEvent::HostStopped { stats, time } => {
                log::info!(
                    "Host stopped at {:.0} ms after {} ticks ({} snapshots, {} commands, {} dropped)",
                    time,
                    stats.ticks,
                    stats.snapshots,
                    stats.commands,
                    stats.dropped
                );
            }
            ServerEvent::Error { message } => {
                log::error!("{}", message);
            }
        }
    }
}
