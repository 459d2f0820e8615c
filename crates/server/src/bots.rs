//! Scripted clients that exercise the host over loopback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use glam::DVec2;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use skirmish::net::{ClientStats, InputSource, LoopbackClient};
use skirmish::{ClientSession, InputSample, SimError};

use crate::events::ServerEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Walks a circle and swings every two seconds.
    Circle,
    /// Walks back and forth, blocking on every turn.
    Patrol,
    Idle,
}

impl Pattern {
    pub fn for_bot(index: usize) -> Self {
        match index % 3 {
            0 => Pattern::Circle,
            1 => Pattern::Patrol,
            _ => Pattern::Idle,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Pattern::Circle => "circle",
            Pattern::Patrol => "patrol",
            Pattern::Idle => "idle",
        }
    }
}

impl InputSource for Pattern {
    fn sample(&mut self, time: f64) -> InputSample {
        match self {
            Pattern::Circle => {
                let angle = time / 1000.0;
                let heading = DVec2::from_angle(angle);
                InputSample {
                    direction: heading,
                    movement: heading,
                    attack: time % 2000.0 < 100.0,
                    block: false,
                }
            }
            Pattern::Patrol => {
                let leg = (time / 1000.0).floor() as i64;
                let heading = if leg % 2 == 0 { DVec2::X } else { DVec2::NEG_X };
                InputSample {
                    direction: heading,
                    movement: heading,
                    attack: false,
                    block: time % 1000.0 < 50.0,
                }
            }
            Pattern::Idle => InputSample::default(),
        }
    }
}

/// Runs one bot at `frame_rate` until `running` is cleared.
pub fn spawn(
    mut session: ClientSession<LoopbackClient>,
    mut pattern: Pattern,
    running: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<ServerEvent>,
) -> JoinHandle<Result<ClientStats, SimError>> {
    let player = session.player();
    let frame = Duration::from_secs_f64(session.config().frame_ms() / 1000.0);
    let _ = events.send(ServerEvent::BotJoined { player, pattern });

    tokio::spawn(async move {
        let mut interval = time::interval(frame);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_frame = Instant::now();

        while running.load(Ordering::SeqCst) {
            interval.tick().await;
            let now = Instant::now();
            let dt = now.duration_since(last_frame).as_secs_f64() * 1000.0;
            last_frame = now;

            if let Err(err) = session.step(&mut pattern, dt) {
                let _ = events.send(ServerEvent::Error {
                    message: format!("bot {player} failed: {err}"),
                });
                return Err(err);
            }
        }

        let stats = session.stats();
        let _ = events.send(ServerEvent::BotFinished { player, stats });
        Ok(stats)
    })
}
