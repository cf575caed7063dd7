use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;

// ============================================================================
// Application Configuration
// ============================================================================
//
// Loaded from the TOML file named by ORDER_LIFECYCLE_CONFIG, or built from
// defaults when the variable is unset. HTTP_PORT overrides [http].port.
//
// Example:
//
//   [http]
//   host = "0.0.0.0"
//   port = 8080
//
//   [lifecycle]
//   cancellation_window_secs = 300
//
//   [promoter]
//   interval_secs = 60
//   stale_after_secs = 300
//
//   [[products]]
//   id = "PROD-1"
//   name = "Wireless Mouse"
//   price = "25.00"
//   stock = 100
//
// ============================================================================

pub const CONFIG_PATH_ENV: &str = "ORDER_LIFECYCLE_CONFIG";
pub const HTTP_PORT_ENV: &str = "HTTP_PORT";

/// Upper bound for every duration setting (one week).
pub const MAX_DURATION_SECS: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Validation(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub lifecycle: LifecycleConfig,
    pub promoter: PromoterConfig,
    pub products: Vec<ProductSeed>,
}

/// Defaults carry the demo catalog.
impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            lifecycle: LifecycleConfig::default(),
            promoter: PromoterConfig::default(),
            products: default_products(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    pub cancellation_window_secs: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self { cancellation_window_secs: 300 }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PromoterConfig {
    pub interval_secs: u64,
    pub stale_after_secs: u64,
}

impl Default for PromoterConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            stale_after_secs: 300,
        }
    }
}

/// One catalog entry plus its opening stock.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProductSeed {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub stock: u32,
}

impl ProductSeed {
    fn new(id: &str, name: &str, price: Decimal, stock: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            price,
            stock,
        }
    }
}

fn default_products() -> Vec<ProductSeed> {
    vec![
        ProductSeed::new("PROD-1", "Wireless Mouse", Decimal::new(2500, 2), 100),
        ProductSeed::new("PROD-2", "Mechanical Keyboard", Decimal::new(15000, 2), 50),
        ProductSeed::new("PROD-3", "iPhone 15", Decimal::new(99900, 2), 2),
    ]
}

fn check_duration(name: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 || secs > MAX_DURATION_SECS {
        return Err(ConfigError::Validation(format!(
            "{name} must be between 1 and {MAX_DURATION_SECS}, got {secs}"
        )));
    }
    Ok(())
}

impl AppConfig {
    /// Resolve configuration from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                tracing::info!(path = %path, "Loading configuration file");
                Self::from_file(&path)?
            }
            Err(_) => Self::default(),
        };

        config.apply_port_override(std::env::var(HTTP_PORT_ENV).ok().as_deref())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn apply_port_override(&mut self, port: Option<&str>) -> Result<(), ConfigError> {
        if let Some(raw) = port {
            self.http.port = raw.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("{HTTP_PORT_ENV} is not a valid port: {raw}"))
            })?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.host.trim().is_empty() {
            return Err(ConfigError::Validation("http.host must not be empty".into()));
        }
        check_duration(
            "lifecycle.cancellation_window_secs",
            self.lifecycle.cancellation_window_secs,
        )?;
        check_duration("promoter.interval_secs", self.promoter.interval_secs)?;
        check_duration("promoter.stale_after_secs", self.promoter.stale_after_secs)?;

        // The promoter must never take an order its customer may still cancel.
        if self.promoter.stale_after_secs < self.lifecycle.cancellation_window_secs {
            return Err(ConfigError::Validation(format!(
                "promoter.stale_after_secs ({}) must not be shorter than \
                 lifecycle.cancellation_window_secs ({})",
                self.promoter.stale_after_secs, self.lifecycle.cancellation_window_secs
            )));
        }

        let mut seen = HashSet::new();
        for product in &self.products {
            if product.id.trim().is_empty() {
                return Err(ConfigError::Validation("product id must not be empty".into()));
            }
            if product.price.is_sign_negative() {
                return Err(ConfigError::Validation(format!(
                    "product {} has a negative price",
                    product.id
                )));
            }
            if !seen.insert(product.id.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate product id: {}",
                    product.id
                )));
            }
        }

        Ok(())
    }

    pub fn cancellation_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lifecycle.cancellation_window_secs.min(MAX_DURATION_SECS) as i64)
    }

    pub fn promoter_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.promoter.interval_secs)
    }

    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.promoter.stale_after_secs.min(MAX_DURATION_SECS) as i64)
    }
}
