use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use blaster_sync_server::config::ServerConfig;
use blaster_sync_server::game::bots::BotDriver;
use blaster_sync_server::game::command_buffer::CommandBufferError;
use blaster_sync_server::game::match_coordinator::MatchEvent;
use blaster_sync_server::game::observer::ObserverWorld;
use blaster_sync_server::game::session::{MatchSession, SessionEvent};
use blaster_sync_server::game::spawn::{default_points, RandomSpawnSelector};
use blaster_sync_server::game::weapon::{WeaponEffect, WeaponState};
use blaster_sync_server::metrics::{self, Metrics};
use blaster_sync_server::replication::link::SimulatedLink;

/// Authority session plus simulated observers behind their links
struct Simulation {
    config: ServerConfig,
    metrics: Arc<Metrics>,
    session: MatchSession,
    bots: BotDriver,
    observers: Vec<(SimulatedLink, ObserverWorld)>,
    generation: u64,
    /// Totals already reported for the current level
    reported: LevelTotals,
}

#[derive(Debug, Clone, Copy, Default)]
struct LevelTotals {
    delivered: u64,
    coalesced: u64,
    held: u64,
    stale: u64,
    rejected: u64,
}

impl Simulation {
    fn new(config: ServerConfig, metrics: Arc<Metrics>, now: f32) -> Self {
        let (session, bots, observers) = Self::start_level(&config, 0, now);
        metrics.sessions_started.fetch_add(1, Ordering::Relaxed);
        Self {
            config,
            metrics,
            session,
            bots,
            observers,
            generation: 0,
            reported: LevelTotals::default(),
        }
    }

    fn start_level(
        config: &ServerConfig,
        generation: u64,
        now: f32,
    ) -> (MatchSession, BotDriver, Vec<(SimulatedLink, ObserverWorld)>) {
        let seed = config.sim_seed.wrapping_add(generation.wrapping_mul(1000));
        let selector = RandomSpawnSelector::new(default_points(), seed);
        let mut session = MatchSession::new(config.session_config(), now, Box::new(selector));

        let mut bots = BotDriver::new(seed);
        let mut controllers = Vec::with_capacity(config.bot_count);
        for i in 0..config.bot_count {
            let controller = session.add_player(format!("Bot{}", i + 1), true);
            bots.add_bot(controller);
            controllers.push(controller);
        }

        // Each observer plays as one of the bots, so HUD binding is exercised
        let observers = (0..config.observer_count)
            .map(|i| {
                let link = SimulatedLink::new(config.link_conditions(), seed + i as u64 + 1);
                let local = controllers.get(i).copied();
                (link, ObserverWorld::new(local))
            })
            .collect();

        (session, bots, observers)
    }

    fn step(&mut self, now: f32, dt: f32) {
        let output = self.bots.update(&self.session, dt);
        let sender = self.session.command_sender();
        let mut dropped = 0u64;
        for (controller, command) in output.commands {
            match sender.try_send(controller, command) {
                Ok(()) => {}
                Err(CommandBufferError::Full) => dropped += 1,
                Err(e) => warn!(%controller, ?command, "Command not submitted: {}", e),
            }
        }
        if dropped > 0 {
            debug!(dropped, "Command buffer full, bot commands dropped");
            self.metrics
                .commands_dropped
                .fetch_add(dropped, Ordering::Relaxed);
        }

        let mut events = Vec::new();
        for (victim, attacker) in output.eliminations {
            events.extend(self.session.report_elimination(victim, Some(attacker), now));
        }
        events.extend(self.session.tick(now));
        self.record_events(&events);

        let packet = self.session.collect_packet();
        self.metrics
            .updates_sent
            .fetch_add(packet.updates.len() as u64, Ordering::Relaxed);
        match packet.encode() {
            Ok(bytes) => {
                self.metrics
                    .bytes_sent
                    .fetch_add((bytes.len() * self.observers.len()) as u64, Ordering::Relaxed);
            }
            Err(e) => warn!("Failed to encode replication packet: {}", e),
        }

        let tick = self.session.tick_count();
        let mut totals = LevelTotals::default();
        for (link, observer) in &mut self.observers {
            link.send(&packet);
            let arrived = link.deliver(tick);
            observer.apply(&arrived);

            let stats = link.stats();
            totals.delivered += stats.delivered;
            totals.coalesced += stats.coalesced;
            totals.held += stats.held;
            totals.stale += observer.stale_discarded();
        }
        totals.rejected = self.session.rejected_commands();
        if !packet.is_empty() {
            self.metrics
                .packets_sent
                .fetch_add(self.observers.len() as u64, Ordering::Relaxed);
        }

        self.update_gauges(now);
        self.report_replication(totals);

        if self.session.travel_requested() {
            self.generation += 1;
            info!(generation = self.generation, "Starting next level");
            let (session, bots, observers) = Self::start_level(&self.config, self.generation, now);
            self.session = session;
            self.bots = bots;
            self.observers = observers;
            self.reported = LevelTotals::default();
            self.metrics.sessions_started.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_events(&self, events: &[SessionEvent]) {
        for event in events {
            match event {
                SessionEvent::Weapon {
                    effect: WeaponEffect::Fired { .. },
                    ..
                } => {
                    self.metrics.shots_fired.fetch_add(1, Ordering::Relaxed);
                }
                SessionEvent::Match(MatchEvent::Eliminated { .. }) => {
                    self.metrics.eliminations.fetch_add(1, Ordering::Relaxed);
                }
                SessionEvent::Match(MatchEvent::Respawned { .. }) => {
                    self.metrics.respawns.fetch_add(1, Ordering::Relaxed);
                }
                SessionEvent::Match(MatchEvent::PhaseChanged { to, .. }) => {
                    self.metrics.set_phase(*to);
                }
                _ => {}
            }
        }
    }

    fn update_gauges(&self, now: f32) {
        let registry = self.session.registry();
        let m = &self.metrics;
        m.controllers
            .store(registry.controller_count() as u64, Ordering::Relaxed);
        m.bot_controllers.store(
            registry.controllers().filter(|c| c.is_bot).count() as u64,
            Ordering::Relaxed,
        );
        m.live_characters.store(
            registry.characters().filter(|c| !c.eliminated).count() as u64,
            Ordering::Relaxed,
        );
        m.weapons
            .store(self.session.weapons().count() as u64, Ordering::Relaxed);
        m.weapons_equipped.store(
            self.session
                .weapons()
                .filter(|w| w.state() == WeaponState::Equipped)
                .count() as u64,
            Ordering::Relaxed,
        );
        m.set_phase(self.session.coordinator().phase());
        m.countdown_seconds.store(
            self.session.coordinator().countdown_time(now).ceil() as u64,
            Ordering::Relaxed,
        );
        m.observers
            .store(self.observers.len() as u64, Ordering::Relaxed);
    }

    /// Link and session counters restart with every level; only the growth since the
    /// last report is added.
    fn report_replication(&mut self, totals: LevelTotals) {
        let m = &self.metrics;
        let last = self.reported;
        m.updates_delivered
            .fetch_add(totals.delivered.saturating_sub(last.delivered), Ordering::Relaxed);
        m.updates_coalesced
            .fetch_add(totals.coalesced.saturating_sub(last.coalesced), Ordering::Relaxed);
        m.updates_held
            .fetch_add(totals.held.saturating_sub(last.held), Ordering::Relaxed);
        m.stale_discarded
            .fetch_add(totals.stale.saturating_sub(last.stale), Ordering::Relaxed);
        m.commands_rejected
            .fetch_add(totals.rejected.saturating_sub(last.rejected), Ordering::Relaxed);
        self.reported = totals;
    }
}

async fn run(config: ServerConfig, metrics: Arc<Metrics>) -> anyhow::Result<()> {
    let clock = Instant::now();
    let dt = config.tick_interval_secs();
    let mut simulation = Simulation::new(config, metrics.clone(), 0.0);

    let mut ticker = interval(Duration::from_secs_f32(dt));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let started = Instant::now();
        let now = clock.elapsed().as_secs_f32();
        simulation.step(now, dt);
        metrics.record_tick_time(started.elapsed());
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("Blaster Sync Server v{}", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load_or_default();
    config.validate().map_err(anyhow::Error::msg)?;
    info!(
        "Configuration loaded: tick_rate={}, bots={}, observers={}, weapons={}, hold_probability={}",
        config.tick_rate,
        config.bot_count,
        config.observer_count,
        config.weapon_count,
        config.link_hold_probability
    );

    let metrics = Arc::new(Metrics::new());

    let metrics_clone = metrics.clone();
    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_clone, metrics_port).await {
            error!("Metrics server error: {}", e);
        }
    });

    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received");
    };

    tokio::select! {
        result = run(config, metrics.clone()) => {
            if let Err(e) = result {
                error!("Simulation error: {}", e);
            }
        }
        _ = shutdown => {
            info!("Shutting down...");
        }
    }

    info!(
        ticks = metrics.tick_count.load(Ordering::Relaxed),
        shots = metrics.shots_fired.load(Ordering::Relaxed),
        eliminations = metrics.eliminations.load(Ordering::Relaxed),
        "Server stopped"
    );
    Ok(())
}
