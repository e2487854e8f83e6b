//! Container configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::error::Error;

const HOST_VAR: &str = "HITCH_HOST";
const PORT_VAR: &str = "HITCH_PORT";
const SHUTDOWN_VAR: &str = "HITCH_SHUTDOWN_TIMEOUT";

/// Matches the default Kubernetes termination grace period.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a [`Container`](crate::Container) listens, and how long it drains.
///
/// Defaults to `0.0.0.0:8080`. Port `0` asks the OS for a free port; read
/// the real one from [`Running::local_addr`](crate::Running::local_addr).
///
/// `shutdown_timeout` caps how long a shutdown waits for in-flight requests
/// (30 s by default). Connections still open at the deadline are aborted.
/// `None` waits as long as it takes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub shutdown_timeout: Option<Duration>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            shutdown_timeout: Some(DEFAULT_SHUTDOWN_TIMEOUT),
        }
    }
}

impl ContainerConfig {
    /// Default host, given port.
    pub fn new(port: u16) -> Self {
        Self { port, ..Self::default() }
    }

    /// Reads `HITCH_HOST`, `HITCH_PORT` and `HITCH_SHUTDOWN_TIMEOUT` (whole
    /// seconds), falling back to the defaults for unset variables.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let mut config = Self::default();
        if let Some(value) = lookup(HOST_VAR) {
            config.host = value.trim().parse()
                .map_err(|_| Error::Config { key: HOST_VAR, value })?;
        }
        if let Some(value) = lookup(PORT_VAR) {
            config.port = value.trim().parse()
                .map_err(|_| Error::Config { key: PORT_VAR, value })?;
        }
        if let Some(value) = lookup(SHUTDOWN_VAR) {
            let secs: u64 = value.trim().parse()
                .map_err(|_| Error::Config { key: SHUTDOWN_VAR, value })?;
            config.shutdown_timeout = Some(Duration::from_secs(secs));
        }
        Ok(config)
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ContainerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ContainerConfig::default());
        assert_eq!(config.addr().to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn reads_host_and_port() {
        let config = ContainerConfig::from_lookup(lookup(&[
            ("HITCH_HOST", "127.0.0.1"),
            ("HITCH_PORT", " 9000 "),
        ]))
        .unwrap();
        assert_eq!(config.addr().to_string(), "127.0.0.1:9000");
        assert_eq!(config.shutdown_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn reads_shutdown_timeout_in_seconds() {
        let config = ContainerConfig::from_lookup(lookup(&[("HITCH_SHUTDOWN_TIMEOUT", "5")])).unwrap();
        assert_eq!(config.shutdown_timeout, Some(Duration::from_secs(5)));

        let err = ContainerConfig::from_lookup(lookup(&[("HITCH_SHUTDOWN_TIMEOUT", "5s")])).unwrap_err();
        assert!(matches!(err, Error::Config { key: "HITCH_SHUTDOWN_TIMEOUT", .. }));
    }

    #[test]
    fn rejects_bad_port() {
        let err = ContainerConfig::from_lookup(lookup(&[("HITCH_PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, Error::Config { key: "HITCH_PORT", .. }));
        assert_eq!(err.to_string(), r#"invalid config value for `HITCH_PORT`: "eighty""#);
    }
}
