//! MQTT telemetry bus.
//!
//! Each `table/key` channel is a retained MQTT topic carrying the value as
//! UTF-8 text. Role selection follows `ntmode`:
//! - server: this device hosts the hub; publish to the co-located broker
//! - client: join the robot network's broker at the team address `10.TE.AM.2`

use anyhow::{anyhow, Context, Result};
use rumqttc::v5::{mqttbytes::QoS, Client, Connection, Event, MqttOptions};
use std::time::Duration;

use super::TelemetryBus;
use crate::config::NtMode;

pub const DEFAULT_BROKER_PORT: u16 = 1883;
pub const LOCAL_BROKER_ADDR: &str = "127.0.0.1:1883";
pub const AVAILABILITY_TOPIC: &str = "vision/status";
const PAYLOAD_ONLINE: &str = "online";
const PAYLOAD_OFFLINE: &str = "offline";
const REQUEST_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerEndpoint {
    pub host: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct MqttBusOptions {
    pub endpoint: BrokerEndpoint,
    pub client_id: String,
    pub availability_topic: String,
}

impl MqttBusOptions {
    /// Broker selection for a telemetry role. `override_addr` wins when set.
    pub fn for_role(mode: NtMode, team: u32, override_addr: Option<&str>) -> Result<Self> {
        let addr = match (override_addr, mode) {
            (Some(addr), _) => addr.to_string(),
            (None, NtMode::Server) => LOCAL_BROKER_ADDR.to_string(),
            (None, NtMode::Client) => team_broker_addr(team)?,
        };
        Ok(Self {
            endpoint: parse_broker_endpoint(&addr)?,
            client_id: format!("visiond-{}", team),
            availability_topic: AVAILABILITY_TOPIC.to_string(),
        })
    }
}

/// Robot network broker address for a team number (`10.TE.AM.2`).
pub fn team_broker_addr(team: u32) -> Result<String> {
    let high = team / 100;
    if high > 255 {
        return Err(anyhow!("team number {} has no robot network address", team));
    }
    Ok(format!("10.{}.{}.2:{}", high, team % 100, DEFAULT_BROKER_PORT))
}

/// Parse `host:port`, `[v6]:port` or `mqtt://host:port`. A bare host gets
/// the default port.
pub fn parse_broker_endpoint(addr: &str) -> Result<BrokerEndpoint> {
    let mut remainder = addr.trim();
    if let Some((scheme, rest)) = remainder.split_once("://") {
        match scheme {
            "mqtt" | "tcp" => {}
            other => return Err(anyhow!("unsupported MQTT scheme: {}", other)),
        }
        remainder = rest;
    }
    if remainder.is_empty() {
        return Err(anyhow!("empty MQTT broker address"));
    }

    if let Some(rest) = remainder.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| anyhow!("invalid MQTT address: {}", addr))?;
        let port = match rest.strip_prefix(':') {
            Some(port) => port.parse().context("invalid MQTT port")?,
            None => DEFAULT_BROKER_PORT,
        };
        return Ok(BrokerEndpoint {
            host: host.to_string(),
            port,
        });
    }

    match remainder.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => Ok(BrokerEndpoint {
            host: host.to_string(),
            port: port.parse().context("invalid MQTT port")?,
        }),
        _ => Ok(BrokerEndpoint {
            host: remainder.to_string(),
            port: DEFAULT_BROKER_PORT,
        }),
    }
}

/// MQTT-backed telemetry bus.
pub struct MqttBus {
    client: Client,
}

impl MqttBus {
    /// Create the client, start its network thread and announce availability.
    pub fn connect(options: &MqttBusOptions) -> Result<Self> {
        let mut mqtt = MqttOptions::new(
            &options.client_id,
            &options.endpoint.host,
            options.endpoint.port,
        );
        mqtt.set_keep_alive(Duration::from_secs(5));
        mqtt.set_clean_start(true);
        let will = rumqttc::v5::mqttbytes::v5::LastWill::new(
            &options.availability_topic,
            PAYLOAD_OFFLINE.as_bytes().to_vec(),
            QoS::AtLeastOnce,
            true,
            None,
        );
        mqtt.set_last_will(will);

        let (client, connection) = Client::new(mqtt, REQUEST_CAPACITY);
        std::thread::Builder::new()
            .name("telemetry-net".to_string())
            .spawn(move || drive_connection(connection))
            .context("spawn telemetry network thread")?;

        let bus = Self { client };
        bus.publish(&options.availability_topic, PAYLOAD_ONLINE)?;
        log::info!(
            "telemetry bus targeting {}:{} as {}",
            options.endpoint.host,
            options.endpoint.port,
            options.client_id
        );
        Ok(bus)
    }

    fn publish(&self, topic: &str, payload: &str) -> Result<()> {
        self.client
            .try_publish(topic, QoS::AtLeastOnce, true, payload.as_bytes().to_vec())
            .with_context(|| format!("publish {}", topic))?;
        Ok(())
    }
}

impl TelemetryBus for MqttBus {
    fn put_number(&mut self, table: &str, key: &str, value: f64) -> Result<()> {
        self.publish(&channel_topic(table, key), &value.to_string())
    }

    fn put_string(&mut self, table: &str, key: &str, value: &str) -> Result<()> {
        self.publish(&channel_topic(table, key), value)
    }
}

fn channel_topic(table: &str, key: &str) -> String {
    format!("{}/{}", table, key)
}

/// Poll the connection for the life of the client. Errors are logged and
/// polling continues, which makes rumqttc reconnect.
fn drive_connection(mut connection: Connection) {
    let mut connected = false;
    for event in connection.iter() {
        match event {
            Ok(Event::Incoming(_)) | Ok(Event::Outgoing(_)) => {
                if !connected {
                    log::info!("telemetry bus connected");
                    connected = true;
                }
            }
            Err(rumqttc::v5::ConnectionError::RequestsDone) => break,
            Err(e) => {
                if connected {
                    log::warn!("telemetry bus connection error: {}", e);
                } else {
                    log::debug!("telemetry bus not reachable yet: {}", e);
                }
                connected = false;
                std::thread::sleep(Duration::from_secs(1));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_address_splits_number() {
        assert_eq!(team_broker_addr(1234).unwrap(), "10.12.34.2:1883");
        assert_eq!(team_broker_addr(254).unwrap(), "10.2.54.2:1883");
        assert_eq!(team_broker_addr(7).unwrap(), "10.0.7.2:1883");
        assert!(team_broker_addr(30000).is_err());
    }

    #[test]
    fn role_selects_broker() {
        let client = MqttBusOptions::for_role(NtMode::Client, 1234, None).unwrap();
        assert_eq!(client.endpoint.host, "10.12.34.2");
        assert_eq!(client.client_id, "visiond-1234");

        let server = MqttBusOptions::for_role(NtMode::Server, 1234, None).unwrap();
        assert_eq!(server.endpoint.host, "127.0.0.1");

        let overridden =
            MqttBusOptions::for_role(NtMode::Client, 1234, Some("mqtt://broker.local:1884"))
                .unwrap();
        assert_eq!(overridden.endpoint.host, "broker.local");
        assert_eq!(overridden.endpoint.port, 1884);
    }

    #[test]
    fn parses_broker_forms() {
        let ep = parse_broker_endpoint("localhost").unwrap();
        assert_eq!((ep.host.as_str(), ep.port), ("localhost", 1883));
        let ep = parse_broker_endpoint("[::1]:1999").unwrap();
        assert_eq!((ep.host.as_str(), ep.port), ("::1", 1999));
        let ep = parse_broker_endpoint("tcp://10.0.0.2:1883").unwrap();
        assert_eq!(ep.host, "10.0.0.2");
        assert!(parse_broker_endpoint("ws://x:1").is_err());
        assert!(parse_broker_endpoint("host:notaport").is_err());
        assert!(parse_broker_endpoint("").is_err());
    }

    #[test]
    fn topics_join_table_and_key() {
        assert_eq!(
            channel_topic("videoInfo", "Avg. Distance"),
            "videoInfo/Avg. Distance"
        );
    }
}
