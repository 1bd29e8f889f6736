use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use tracing::warn;

const DEFAULT_PORT: u16 = 1935;
const DEFAULT_RECORDER: &str = "rtmpdump";
const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: IpAddr,
    pub port: u16,
    /// Program spawned to record each requested stream.
    pub recorder: String,
    pub handshake_timeout: Duration,
    pub logger_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            recorder: DEFAULT_RECORDER.to_string(),
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            logger_level: "info".to_string(),
        }
    }
}

/// Builds the config from `RTMP_CAPTURE_*` environment variables, falling
/// back to defaults for anything unset or unparsable.
pub fn read_config() -> Config {
    let mut config = Config::default();

    if let Some(address) = parsed_var("RTMP_CAPTURE_BIND") {
        config.bind_address = address;
    }
    if let Some(port) = parsed_var("RTMP_CAPTURE_PORT") {
        config.port = port;
    }
    if let Ok(recorder) = env::var("RTMP_CAPTURE_RECORDER")
        && !recorder.is_empty()
    {
        config.recorder = recorder;
    }
    if let Some(secs) = parsed_var::<u64>("RTMP_CAPTURE_HANDSHAKE_TIMEOUT_SECS") {
        config.handshake_timeout = Duration::from_secs(secs);
    }
    if let Ok(level) = env::var("RTMP_CAPTURE_LOGGER_LEVEL")
        && !level.is_empty()
    {
        config.logger_level = level;
    }

    config
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    let value = env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(%name, %value, "ignoring unparsable environment variable");
            None
        }
    }
}
