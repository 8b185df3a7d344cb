//! Registry configuration

/// Which connections a call message is fanned out to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Every live connection, regardless of display or room
    #[default]
    All,
    /// Only connections whose display or room matches the message
    Scoped,
}

impl std::str::FromStr for DeliveryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(DeliveryMode::All),
            "scoped" => Ok(DeliveryMode::Scoped),
            other => Err(format!("unknown delivery mode: {}", other)),
        }
    }
}

/// Connection registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Outbound frames buffered per connection before it counts as a failed write
    pub connection_buffer: usize,

    /// Fan-out policy used by the broadcast router
    pub delivery_mode: DeliveryMode,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            connection_buffer: 64,
            delivery_mode: DeliveryMode::All,
        }
    }
}

impl RegistryConfig {
    /// Set the per-connection buffer size
    pub fn connection_buffer(mut self, size: usize) -> Self {
        self.connection_buffer = size.max(1);
        self
    }

    /// Set the delivery mode
    pub fn delivery_mode(mut self, mode: DeliveryMode) -> Self {
        self.delivery_mode = mode;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RegistryConfig::default();
        assert_eq!(config.connection_buffer, 64);
        assert_eq!(config.delivery_mode, DeliveryMode::All);
    }

    #[test]
    fn test_buffer_never_zero() {
        let config = RegistryConfig::default().connection_buffer(0);
        assert_eq!(config.connection_buffer, 1);
    }

    #[test]
    fn test_parse_delivery_mode() {
        assert_eq!("scoped".parse::<DeliveryMode>(), Ok(DeliveryMode::Scoped));
        assert_eq!("ALL".parse::<DeliveryMode>(), Ok(DeliveryMode::All));
        assert!("nearest".parse::<DeliveryMode>().is_err());
    }
}
