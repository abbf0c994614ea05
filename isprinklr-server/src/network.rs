//! Network connectivity monitor.
//!
//! Interface bring-up is left to the host. The monitor only observes whether
//! an outbound route exists and reports edges to registered observers.

use crate::config::{ConfigError, FixedIp, NetworkConfig, NetworkMode};
use parking_lot::RwLock;
use serde::Serialize;
use std::net::{IpAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Receives link up/down edges. Called synchronously from [`NetworkMonitor::check`].
pub trait LinkObserver: Send + Sync {
    fn on_link_up(&self, status: &NetworkStatus);
    fn on_link_down(&self);
}

/// Logs link transitions.
pub struct LoggingObserver;

impl LinkObserver for LoggingObserver {
    fn on_link_up(&self, status: &NetworkStatus) {
        match status.ip {
            Some(ip) => tracing::info!("Network up via {} ({})", status.network_type, ip),
            None => tracing::info!("Network up via {}", status.network_type),
        }
    }

    fn on_link_down(&self) {
        tracing::warn!("Network connection lost");
    }
}

/// Determines the local address used for outbound traffic.
pub type Probe = Box<dyn Fn() -> Option<IpAddr> + Send + Sync>;

/// Snapshot reported by `/api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkStatus {
    pub connected: bool,
    pub network_type: &'static str,
    pub mode: NetworkMode,
    pub ip: Option<IpAddr>,
    pub ssid: Option<String>,
    pub fixed_ip: Option<FixedIp>,
}

/// Tracks network reachability.
pub struct NetworkMonitor {
    config: NetworkConfig,
    fixed_ip: Option<FixedIp>,
    probe: Probe,
    connected: AtomicBool,
    ip: RwLock<Option<IpAddr>>,
    observers: RwLock<Vec<Arc<dyn LinkObserver>>>,
    shutdown: AtomicBool,
    notify: Notify,
}

impl NetworkMonitor {
    pub fn new(config: NetworkConfig) -> Result<Self, ConfigError> {
        let fixed_ip = config.fixed_ip()?;
        Ok(Self {
            config,
            fixed_ip,
            probe: Box::new(outbound_ip),
            connected: AtomicBool::new(false),
            ip: RwLock::new(None),
            observers: RwLock::new(Vec::new()),
            shutdown: AtomicBool::new(false),
            notify: Notify::new(),
        })
    }

    /// Replaces the reachability probe.
    pub fn with_probe(mut self, probe: Probe) -> Self {
        self.probe = probe;
        self
    }

    pub fn add_observer(&self, observer: Arc<dyn LinkObserver>) {
        self.observers.write().push(observer);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn local_ip(&self) -> Option<IpAddr> {
        *self.ip.read()
    }

    /// `"Ethernet"`, `"WiFi"` or `"Disconnected"`.
    pub fn network_type(&self) -> &'static str {
        if self.is_connected() {
            self.config.mode.label()
        } else {
            "Disconnected"
        }
    }

    pub fn status(&self) -> NetworkStatus {
        NetworkStatus {
            connected: self.is_connected(),
            network_type: self.network_type(),
            mode: self.config.mode,
            ip: self.local_ip(),
            ssid: match self.config.mode {
                NetworkMode::Wifi => self.config.wifi_ssid.clone(),
                NetworkMode::Ethernet => None,
            },
            fixed_ip: self.fixed_ip,
        }
    }

    /// Probes connectivity once, notifying observers on a change.
    pub fn check(&self) -> bool {
        let ip = (self.probe)();
        let connected = ip.is_some();
        *self.ip.write() = ip;
        let was_connected = self.connected.swap(connected, Ordering::SeqCst);

        if connected == was_connected {
            return connected;
        }

        if connected {
            if let (Some(fixed), Some(IpAddr::V4(actual))) = (self.fixed_ip, ip) {
                if fixed.ip != actual {
                    tracing::warn!(
                        "Configured fixed IP {} but outbound address is {}",
                        fixed.ip,
                        actual
                    );
                }
            }
            let status = self.status();
            for observer in self.observers.read().iter() {
                observer.on_link_up(&status);
            }
        } else {
            for observer in self.observers.read().iter() {
                observer.on_link_down();
            }
        }
        connected
    }

    /// Runs the periodic check loop (call from a background task).
    pub async fn run(&self) {
        let interval = self.config.check_interval();
        tracing::info!(
            "Network monitor started (mode={}, interval={}s)",
            self.config.mode.label(),
            interval.as_secs()
        );

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            self.check();

            tokio::select! {
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(interval) => {}
            }
        }

        tracing::info!("Network monitor stopped");
    }

    /// Signals the monitor loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.notify.notify_one();
    }
}

/// Uses a connected UDP socket to find the outbound interface address. No
/// packet is sent.
fn outbound_ip() -> Option<IpAddr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect("8.8.8.8:80").ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() || ip.is_loopback() {
        None
    } else {
        Some(ip)
    }
}
