// Decision: Every flag can also come from the environment so the collector
// runs unchanged from a shell, a .env file, or a container spec.

use anyhow::Result;
use clap::Parser;
use std::time::Duration;

/// Default MQTT port when the broker URL has none
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Sensor data collector: subscribes to device events and records them
#[derive(Parser, Debug, Clone)]
#[command(name = "sensorlog-collector")]
#[command(about = "Sensor data collector")]
#[command(version)]
pub struct CollectorConfig {
    /// MQTT broker URI (tcp://host:port, mqtt://host:port or host[:port])
    #[arg(short, long, env = "MQTT_BROKER", default_value = "tcp://localhost:1883")]
    pub broker: String,

    /// MQTT client ID
    #[arg(
        short = 'i',
        long,
        env = "MQTT_CLIENT_ID",
        default_value = "sensor-data-collector"
    )]
    pub client_id: String,

    /// MQTT topic wildcard
    #[arg(short, long, env = "MQTT_TOPIC", default_value = "res/rfbridge/device/#")]
    pub topic: String,

    /// Postgres connection URL
    #[arg(short, long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Seconds to wait for the broker handshake before giving up
    #[arg(long, env = "MQTT_CONNECT_TIMEOUT_SECS", default_value_t = 10)]
    pub connect_timeout_secs: u64,

    /// MQTT keep-alive interval in seconds
    #[arg(long, env = "MQTT_KEEP_ALIVE_SECS", default_value_t = 30)]
    pub keep_alive_secs: u64,

    /// Maximum number of messages being written concurrently
    #[arg(long, env = "COLLECTOR_MAX_IN_FLIGHT", default_value_t = 16)]
    pub max_in_flight: usize,

    /// Upper bound in seconds on each store write (registry upsert, event insert)
    #[arg(long, env = "COLLECTOR_STORE_TIMEOUT_SECS", default_value_t = 30)]
    pub store_timeout_secs: u64,
}

impl CollectorConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    /// Host and port of the configured broker
    pub fn broker_address(&self) -> Result<(String, u16)> {
        parse_broker_url(&self.broker)
    }
}

/// Parse broker URL in format mqtt://host:port or tcp://host:port or host:port
pub fn parse_broker_url(url: &str) -> Result<(String, u16)> {
    let url = url.trim_start_matches("mqtt://");
    let url = url.trim_start_matches("tcp://");
    let url = url.trim_end_matches('/');

    let parts: Vec<&str> = url.split(':').collect();
    match parts.as_slice() {
        [host] if !host.is_empty() => Ok((host.to_string(), DEFAULT_MQTT_PORT)),
        [host, port] if !host.is_empty() => {
            let port = port
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("Invalid port in broker URL: {}", port))?;
            Ok((host.to_string(), port))
        }
        _ => anyhow::bail!("Invalid broker URL format: {}", url),
    }
}
