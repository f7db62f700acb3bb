use std::time::Duration;

/// Connection settings for the simulator link.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub host: String,
    pub port: u16,
    /// Applies to the initial connection only; established links block
    /// for as long as the server takes.
    pub connect_timeout: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 2000,
            connect_timeout: Duration::from_secs_f32(2.0),
        }
    }
}

impl SimConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_local_server() {
        let cfg = SimConfig::default();
        assert_eq!(cfg.addr(), "127.0.0.1:2000");
        assert_eq!(cfg.connect_timeout, Duration::from_millis(2000));
    }
}
