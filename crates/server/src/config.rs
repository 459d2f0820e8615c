use std::time::Duration;

use skirmish::{ClientConfig, EntityConfig, LinkSimulation, MapBounds, SessionInit, TickConfig};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub tick: TickConfig,
    pub client: ClientConfig,
    pub entity: EntityConfig,
    pub bots: usize,
    pub npcs: usize,
    pub run_for: Duration,
    pub link: LinkSimulation,
    pub arena_size: [f64; 2],
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            tick: TickConfig::default(),
            client: ClientConfig::default(),
            entity: EntityConfig::default(),
            bots: 2,
            npcs: 2,
            run_for: Duration::from_secs(10),
            link: LinkSimulation::default(),
            arena_size: [1000.0, 600.0],
        }
    }
}

impl ServerConfig {
    pub fn session_init(&self) -> SessionInit {
        let [width, height] = self.arena_size;
        let map = MapBounds::rectangle(glam::DVec2::ZERO, glam::DVec2::new(width, height));

        let bots: Vec<String> = (0..self.bots).map(|i| format!("bot-{i}")).collect();
        let npcs: Vec<String> = (0..self.npcs).map(|i| format!("npc-{i}")).collect();
        let bots: Vec<&str> = bots.iter().map(String::as_str).collect();
        let npcs: Vec<&str> = npcs.iter().map(String::as_str).collect();

        SessionInit::ring(map.to_points(), &bots, &npcs)
    }
}
