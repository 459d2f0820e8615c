use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use skirmish::net::{HostStats, LoopbackHost};
use skirmish::{HostSession, SimError};

use crate::events::ServerEvent;

pub struct HostHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<HostStats, SimError>>,
}

impl HostHandle {
    /// Cancels the tick timer and waits for the final tick to finish.
    pub async fn stop(mut self) -> Result<HostStats> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let stats = self.task.await??;
        Ok(stats)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Drives `session` on a fixed interval of `ms_per_tick`, feeding each tick
/// the wall time measured since the previous one.
pub fn spawn(
    mut session: HostSession<LoopbackHost>,
    ms_per_tick: f64,
    events: mpsc::UnboundedSender<ServerEvent>,
) -> HostHandle {
    let (stop, mut stopped) = oneshot::channel();

    let task = tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs_f64(ms_per_tick / 1000.0));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();

        loop {
            tokio::select! {
                _ = &mut stopped => break,
                _ = interval.tick() => {
                    let now = Instant::now();
                    let elapsed_ms = now.duration_since(last_tick).as_secs_f64() * 1000.0;
                    last_tick = now;

                    let was_started = session.scheduler().is_started();
                    if let Err(err) = session.pump(elapsed_ms) {
                        let _ = events.send(ServerEvent::Error {
                            message: format!("host tick failed: {err}"),
                        });
                        return Err(err);
                    }
                    if !was_started && session.scheduler().is_started() {
                        let players = session.simulation().player_ids().len();
                        let _ = events.send(ServerEvent::SessionStarted { players });
                    }
                }
            }
        }

        let stats = session.stats();
        let _ = events.send(ServerEvent::HostStopped {
            stats,
            time: session.simulation().time(),
        });
        Ok(stats)
    });

    HostHandle {
        stop: Some(stop),
        task,
    }
}
