//! Prometheus metrics for the isprinklr daemon.
//!
//! The registry is exposed on the HTTP API at `/metrics`.

use prometheus::{Counter, CounterVec, Encoder, Gauge, Opts, Registry, TextEncoder};

/// Prometheus metrics for the link driver and HTTP API.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    /// Complete or partial blocks read from the link.
    pub frames_received_total: Counter,
    /// Frames dropped without a reply, by reason.
    pub frames_dropped_total: CounterVec,
    /// Responses written to the link, by reply.
    pub responses_total: CounterVec,
    /// Completed handshakes.
    pub handshakes_total: Counter,
    /// Actuator calls by operation and result.
    pub actuator_calls_total: CounterVec,
    /// HTTP requests by route and status.
    pub http_requests_total: CounterVec,
    /// 1 while a link session is connected.
    pub link_connected: Gauge,
}

impl Metrics {
    /// Creates a new Metrics instance with all metrics registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let frames_received_total = Counter::with_opts(Opts::new(
            "isprinklr_frames_received_total",
            "Total number of blocks read from the serial link",
        ))?;
        registry.register(Box::new(frames_received_total.clone()))?;

        let frames_dropped_total = CounterVec::new(
            Opts::new(
                "isprinklr_frames_dropped_total",
                "Frames dropped without a reply by reason",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(frames_dropped_total.clone()))?;

        let responses_total = CounterVec::new(
            Opts::new("isprinklr_responses_total", "Responses sent by reply"),
            &["reply"],
        )?;
        registry.register(Box::new(responses_total.clone()))?;

        let handshakes_total = Counter::with_opts(Opts::new(
            "isprinklr_handshakes_total",
            "Total number of completed link handshakes",
        ))?;
        registry.register(Box::new(handshakes_total.clone()))?;

        let actuator_calls_total = CounterVec::new(
            Opts::new(
                "isprinklr_actuator_calls_total",
                "Actuator calls by operation and result",
            ),
            &["op", "result"],
        )?;
        registry.register(Box::new(actuator_calls_total.clone()))?;

        let http_requests_total = CounterVec::new(
            Opts::new(
                "isprinklr_http_requests_total",
                "HTTP API requests by route and status",
            ),
            &["route", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let link_connected = Gauge::with_opts(Opts::new(
            "isprinklr_link_connected",
            "Whether a serial link session is connected",
        ))?;
        registry.register(Box::new(link_connected.clone()))?;

        Ok(Self {
            registry,
            frames_received_total,
            frames_dropped_total,
            responses_total,
            handshakes_total,
            actuator_calls_total,
            http_requests_total,
            link_connected,
        })
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }

    /// Returns a reference to the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_actuator_call(&self, op: &str, ok: bool) {
        let result = if ok { "ok" } else { "error" };
        self.actuator_calls_total
            .with_label_values(&[op, result])
            .inc();
    }
}
