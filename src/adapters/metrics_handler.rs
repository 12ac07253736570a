use prometheus::{
    CounterVec, Encoder, Gauge, Histogram, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

// Agent turns run from sub-second to several minutes.
const STREAM_DURATION_BUCKETS: [f64; 10] = [0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0, 300.0];

pub struct MetricsCollector {
    registry: Registry,

    // Request metrics
    pub requests_total: CounterVec,
    pub request_duration: HistogramVec,

    // Stream metrics
    pub streams_in_flight: Gauge,
    pub streams_total: CounterVec,
    pub events_total: CounterVec,
    pub upstream_dropped_total: CounterVec,
    pub stream_duration: Histogram,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Request metrics
        let requests_total = CounterVec::new(
            Opts::new("relay_requests_total", "Total number of HTTP requests"),
            &["method", "path", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "relay_request_duration_seconds",
                "Time until response headers were sent",
            ),
            &["method", "path"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        // Stream metrics
        let streams_in_flight = Gauge::new(
            "relay_streams_in_flight",
            "Number of agent streams currently being relayed",
        )?;
        registry.register(Box::new(streams_in_flight.clone()))?;

        let streams_total = CounterVec::new(
            Opts::new("relay_streams_total", "Finished agent streams by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(streams_total.clone()))?;

        let events_total = CounterVec::new(
            Opts::new("relay_events_total", "Events written to clients by type"),
            &["type"],
        )?;
        registry.register(Box::new(events_total.clone()))?;

        let upstream_dropped_total = CounterVec::new(
            Opts::new(
                "relay_upstream_dropped_total",
                "Upstream records that produced no client event",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(upstream_dropped_total.clone()))?;

        let stream_duration = Histogram::with_opts(
            HistogramOpts::new(
                "relay_stream_duration_seconds",
                "Time from start event to terminal event or cancellation",
            )
            .buckets(STREAM_DURATION_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(stream_duration.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
            streams_in_flight,
            streams_total,
            events_total,
            upstream_dropped_total,
            stream_duration,
        })
    }

    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

pub struct MetricsHandler {
    collector: Arc<MetricsCollector>,
}

impl MetricsHandler {
    pub fn new(collector: Arc<MetricsCollector>) -> Self {
        Self { collector }
    }

    pub async fn metrics(&self) -> String {
        self.collector.encode().unwrap_or_else(|e| {
            tracing::error!("Failed to encode metrics: {}", e);
            String::from("# Error encoding metrics\n")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new();
        assert!(collector.is_ok());
    }

    #[test]
    fn test_metrics_encoding() {
        let collector = MetricsCollector::new().unwrap();

        collector
            .requests_total
            .with_label_values(&["POST", "/api/agent/stream", "200"])
            .inc();
        collector.streams_total.with_label_values(&["completed"]).inc();
        collector.stream_duration.observe(3.2);

        let metrics_text = collector.encode().unwrap();
        assert!(metrics_text.contains("relay_requests_total"));
        assert!(metrics_text.contains("outcome=\"completed\""));
        assert!(metrics_text.contains("relay_stream_duration_seconds_bucket"));
    }

    #[test]
    fn test_collectors_are_independent() {
        let first = MetricsCollector::new().unwrap();
        let second = MetricsCollector::new().unwrap();

        first.streams_in_flight.inc();
        assert_eq!(first.streams_in_flight.get(), 1.0);
        assert_eq!(second.streams_in_flight.get(), 0.0);
    }

    #[tokio::test]
    async fn test_metrics_handler() {
        let collector = Arc::new(MetricsCollector::new().unwrap());
        let handler = MetricsHandler::new(collector.clone());

        collector.events_total.with_label_values(&["chunk"]).inc();

        let metrics = handler.metrics().await;
        assert!(metrics.contains("relay_events_total{type=\"chunk\"} 1"));
    }
}
