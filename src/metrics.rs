//! Prometheus-compatible metrics endpoint
//!
//! Exposes server and replication metrics in Prometheus format.
//! Default endpoint: http://localhost:9090/metrics

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::game::match_coordinator::MatchPhase;

const TICK_HISTORY: usize = 1000;

#[derive(Debug)]
pub struct Metrics {
    // Actors
    pub controllers: AtomicU64,
    pub bot_controllers: AtomicU64,
    pub live_characters: AtomicU64,
    pub weapons: AtomicU64,
    pub weapons_equipped: AtomicU64,

    // Match
    pub match_phase: AtomicU64,
    pub countdown_seconds: AtomicU64,
    pub eliminations: AtomicU64,
    pub respawns: AtomicU64,
    pub sessions_started: AtomicU64,

    // Tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    // Replication
    pub observers: AtomicU64,
    pub packets_sent: AtomicU64,
    pub bytes_sent: AtomicU64,
    pub updates_sent: AtomicU64,
    pub updates_delivered: AtomicU64,
    pub updates_coalesced: AtomicU64,
    pub updates_held: AtomicU64,
    pub stale_discarded: AtomicU64,
    pub shots_fired: AtomicU64,
    pub commands_rejected: AtomicU64,
    /// Commands lost to a full command buffer
    pub commands_dropped: AtomicU64,

    start_time: Instant,
    tick_history: RwLock<VecDeque<u64>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            controllers: AtomicU64::new(0),
            bot_controllers: AtomicU64::new(0),
            live_characters: AtomicU64::new(0),
            weapons: AtomicU64::new(0),
            weapons_equipped: AtomicU64::new(0),
            match_phase: AtomicU64::new(0),
            countdown_seconds: AtomicU64::new(0),
            eliminations: AtomicU64::new(0),
            respawns: AtomicU64::new(0),
            sessions_started: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            observers: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            updates_sent: AtomicU64::new(0),
            updates_delivered: AtomicU64::new(0),
            updates_coalesced: AtomicU64::new(0),
            updates_held: AtomicU64::new(0),
            stale_discarded: AtomicU64::new(0),
            shots_fired: AtomicU64::new(0),
            commands_rejected: AtomicU64::new(0),
            commands_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Record a tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us
                .store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us
                .store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us
                .store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    pub fn set_phase(&self, phase: MatchPhase) {
        self.match_phase.store(phase_code(phase), Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("blaster_sync_controllers", "Connected controllers", "gauge",
            self.controllers.load(Ordering::Relaxed));
        metric!("blaster_sync_controllers_bot", "Bot controllers", "gauge",
            self.bot_controllers.load(Ordering::Relaxed));
        metric!("blaster_sync_characters_live", "Characters not eliminated", "gauge",
            self.live_characters.load(Ordering::Relaxed));
        metric!("blaster_sync_weapons", "Weapons in the level", "gauge",
            self.weapons.load(Ordering::Relaxed));
        metric!("blaster_sync_weapons_equipped", "Weapons currently held", "gauge",
            self.weapons_equipped.load(Ordering::Relaxed));

        metric!("blaster_sync_match_phase", "Match phase (0=waiting, 1=in progress, 2=cooldown)", "gauge",
            self.match_phase.load(Ordering::Relaxed));
        output.push_str(&format!(
            "# HELP blaster_sync_match_state Human-readable match phase\n# TYPE blaster_sync_match_state gauge\nblaster_sync_match_state{{phase=\"{}\"}} 1\n",
            phase_name(self.match_phase.load(Ordering::Relaxed))
        ));
        metric!("blaster_sync_countdown_seconds", "Seconds left in the current phase", "gauge",
            self.countdown_seconds.load(Ordering::Relaxed));
        metric!("blaster_sync_eliminations_total", "Eliminations recorded", "counter",
            self.eliminations.load(Ordering::Relaxed));
        metric!("blaster_sync_respawns_total", "Characters respawned", "counter",
            self.respawns.load(Ordering::Relaxed));
        metric!("blaster_sync_sessions_total", "Match sessions started", "counter",
            self.sessions_started.load(Ordering::Relaxed));

        metric!("blaster_sync_tick_time_microseconds", "Current tick time in microseconds", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("blaster_sync_tick_time_p95_microseconds", "95th percentile tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("blaster_sync_tick_time_p99_microseconds", "99th percentile tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("blaster_sync_tick_time_max_microseconds", "Maximum tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("blaster_sync_tick_count", "Total ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));

        metric!("blaster_sync_observers", "Simulated observers", "gauge",
            self.observers.load(Ordering::Relaxed));
        metric!("blaster_sync_packets_sent_total", "Replication packets sent", "counter",
            self.packets_sent.load(Ordering::Relaxed));
        metric!("blaster_sync_bytes_sent_total", "Encoded replication bytes", "counter",
            self.bytes_sent.load(Ordering::Relaxed));
        metric!("blaster_sync_updates_sent_total", "Attribute updates sent", "counter",
            self.updates_sent.load(Ordering::Relaxed));
        metric!("blaster_sync_updates_delivered_total", "Attribute updates delivered", "counter",
            self.updates_delivered.load(Ordering::Relaxed));
        metric!("blaster_sync_updates_coalesced_total", "Attribute updates superseded in flight", "counter",
            self.updates_coalesced.load(Ordering::Relaxed));
        metric!("blaster_sync_updates_held_total", "Attribute updates held back by the link", "counter",
            self.updates_held.load(Ordering::Relaxed));
        metric!("blaster_sync_stale_discarded_total", "Stale deliveries discarded by observers", "counter",
            self.stale_discarded.load(Ordering::Relaxed));
        metric!("blaster_sync_shots_fired_total", "Shots fired", "counter",
            self.shots_fired.load(Ordering::Relaxed));
        metric!("blaster_sync_commands_rejected_total", "Player commands rejected", "counter",
            self.commands_rejected.load(Ordering::Relaxed));
        metric!("blaster_sync_commands_dropped_total", "Player commands dropped by a full buffer", "counter",
            self.commands_dropped.load(Ordering::Relaxed));
        metric!("blaster_sync_uptime_seconds", "Server uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    pub fn to_json(&self) -> String {
        format!(r#"{{
  "actors": {{
    "controllers": {},
    "bots": {},
    "live_characters": {},
    "weapons": {},
    "weapons_equipped": {}
  }},
  "match": {{
    "phase": "{}",
    "countdown_seconds": {},
    "eliminations": {},
    "respawns": {},
    "sessions": {}
  }},
  "performance": {{
    "tick_time_us": {},
    "tick_time_p95_us": {},
    "tick_time_p99_us": {},
    "tick_time_max_us": {},
    "tick_count": {}
  }},
  "replication": {{
    "observers": {},
    "packets_sent": {},
    "bytes_sent": {},
    "updates_sent": {},
    "updates_delivered": {},
    "updates_coalesced": {},
    "updates_held": {},
    "stale_discarded": {}
  }},
  "uptime_seconds": {}
}}"#,
            self.controllers.load(Ordering::Relaxed),
            self.bot_controllers.load(Ordering::Relaxed),
            self.live_characters.load(Ordering::Relaxed),
            self.weapons.load(Ordering::Relaxed),
            self.weapons_equipped.load(Ordering::Relaxed),
            phase_name(self.match_phase.load(Ordering::Relaxed)),
            self.countdown_seconds.load(Ordering::Relaxed),
            self.eliminations.load(Ordering::Relaxed),
            self.respawns.load(Ordering::Relaxed),
            self.sessions_started.load(Ordering::Relaxed),
            self.tick_time_us.load(Ordering::Relaxed),
            self.tick_time_p95_us.load(Ordering::Relaxed),
            self.tick_time_p99_us.load(Ordering::Relaxed),
            self.tick_time_max_us.load(Ordering::Relaxed),
            self.tick_count.load(Ordering::Relaxed),
            self.observers.load(Ordering::Relaxed),
            self.packets_sent.load(Ordering::Relaxed),
            self.bytes_sent.load(Ordering::Relaxed),
            self.updates_sent.load(Ordering::Relaxed),
            self.updates_delivered.load(Ordering::Relaxed),
            self.updates_coalesced.load(Ordering::Relaxed),
            self.updates_held.load(Ordering::Relaxed),
            self.stale_discarded.load(Ordering::Relaxed),
            self.uptime_seconds(),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn phase_code(phase: MatchPhase) -> u64 {
    match phase {
        MatchPhase::WaitingToStart => 0,
        MatchPhase::InProgress => 1,
        MatchPhase::Cooldown => 2,
    }
}

fn phase_name(code: u64) -> &'static str {
    match code {
        0 => "waiting_to_start",
        1 => "in_progress",
        _ => "cooldown",
    }
}

fn http_response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    )
}

fn route(metrics: &Metrics, request: &str) -> String {
    if request.starts_with("GET /metrics/json") {
        http_response("200 OK", "application/json", &metrics.to_json())
    } else if request.starts_with("GET /metrics") {
        http_response("200 OK", "text/plain; version=0.0.4", &metrics.to_prometheus())
    } else if request.starts_with("GET /health") {
        http_response("200 OK", "text/plain", "OK")
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
    }
}

/// Start the metrics HTTP server
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = route(&metrics, &request);
                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
