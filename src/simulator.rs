//! Stand-in for the sensor firmware, for exercising the dashboard without hardware.
//!
//! Mirrors the device's power cycle: the probe is off for a few seconds, warms
//! up, then measures until the on-time runs out. Readings are synthesized from
//! elapsed time so a run is reproducible.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::net::UdpSocket;
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::frame;
use crate::messages::DisplayState;

const OFF_TIME: Duration = Duration::from_secs(5);
const WARMUP_TIME: Duration = Duration::from_secs(20);
/// Total powered time, warm-up included.
const ON_TIME: Duration = Duration::from_secs(180);

const FILTER_ALPHA: f64 = 0.10;
/// L/min below which the still-water TDS model applies.
const FLOW_THRESHOLD: f64 = 0.400;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Off,
    Warmup,
    Measure,
}

#[derive(Clone, Copy, Debug)]
pub struct SensorCycle {
    off: Duration,
    warmup: Duration,
    measure: Duration,
}

impl Default for SensorCycle {
    fn default() -> Self {
        SensorCycle {
            off: OFF_TIME,
            warmup: WARMUP_TIME,
            measure: ON_TIME - WARMUP_TIME,
        }
    }
}

impl SensorCycle {
    pub fn period(&self) -> Duration {
        self.off + self.warmup + self.measure
    }

    pub fn phase_at(&self, elapsed: Duration) -> Phase {
        let offset = elapsed.as_nanos() % self.period().as_nanos();
        if offset < self.off.as_nanos() {
            Phase::Off
        } else if offset < (self.off + self.warmup).as_nanos() {
            Phase::Warmup
        } else {
            Phase::Measure
        }
    }
}

/// Exponential moving average, seeded with the first reading.
#[derive(Debug, Default)]
pub struct FrequencyFilter {
    value: Option<f64>,
}

impl FrequencyFilter {
    pub fn push(&mut self, raw: f64) -> f64 {
        let next = match self.value {
            None => raw,
            Some(prev) => FILTER_ALPHA * raw + (1.0 - FILTER_ALPHA) * prev,
        };
        self.value = Some(next);
        next
    }
}

/// Adaptive TDS model: a quadratic fit for still water, a linear one once
/// flow is above the threshold. Never negative.
pub fn calculate_tds(freq: f64, flow: f64) -> f64 {
    let tds = if flow < FLOW_THRESHOLD {
        9e-7 * freq * freq + 0.0683 * freq + 3.5733
    } else {
        0.0901 * freq + 501.9 * flow - 266.8
    };
    tds.max(0.0)
}

pub struct Simulator {
    socket: UdpSocket,
    target: SocketAddr,
    cycle: SensorCycle,
    filter: FrequencyFilter,
}

impl Simulator {
    pub async fn new(target: SocketAddr) -> std::io::Result<Self> {
        let any = if target.is_ipv4() {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V6(Ipv6Addr::UNSPECIFIED)
        };
        let socket = UdpSocket::bind(SocketAddr::new(any, 0)).await?;
        Ok(Simulator {
            socket,
            target,
            cycle: SensorCycle::default(),
            filter: FrequencyFilter::default(),
        })
    }

    pub fn state_at(&mut self, elapsed: Duration) -> DisplayState {
        match self.cycle.phase_at(elapsed) {
            Phase::Off => DisplayState::Off,
            Phase::Warmup => DisplayState::Warmup,
            Phase::Measure => {
                let t = elapsed.as_secs_f64();
                let raw = 1500.0 + 40.0 * (t / 7.0).sin() + 5.0 * (t * 1.3).sin();
                let filt = self.filter.push(raw);
                let flow = 0.4 + 0.35 * (t / 45.0).sin();
                DisplayState::Sample {
                    raw,
                    filt,
                    flow,
                    tds: calculate_tds(filt, flow),
                }
            }
        }
    }

    /// Sends one frame per `interval` until `shutdown` fires. Returns the frame count.
    pub async fn run(
        mut self,
        interval: Duration,
        mut shutdown: broadcast::Receiver<()>,
    ) -> u64 {
        info!("Simulating sensor, sending to {}", self.target);

        let started = Instant::now();
        let mut ticker = tokio::time::interval(interval);
        let mut sent = 0;

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                _ = ticker.tick() => {
                    let state = self.state_at(started.elapsed());
                    let payload = frame::encode(&state);
                    match self.socket.send_to(payload.as_bytes(), self.target).await {
                        Ok(_) => {
                            sent += 1;
                            debug!("Sent {}", payload.trim_end());
                        }
                        Err(err) => warn!("Error sending frame to {}: {}", self.target, err),
                    }
                }
            }
        }

        info!("Simulator stopped after {} frames", sent);
        sent
    }
}
