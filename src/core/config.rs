use std::env;
use std::str::FromStr;

use anyhow::{bail, Result};

use crate::market::finnhub::DEFAULT_FINNHUB_WS_URL;
use crate::market::polygon::DEFAULT_POLYGON_WS_URL;
use crate::stats::window::WindowConfig;
use crate::streaming::broker::BrokerConfig;
use crate::view::{DEFAULT_MAX_TRADES, DEFAULT_REFRESH_MS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Finnhub,
    Polygon,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "finnhub" => Ok(ProviderKind::Finnhub),
            "polygon" => Ok(ProviderKind::Polygon),
            other => bail!("unknown provider '{other}', expected finnhub or polygon"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FinnhubConfig {
    pub token: String,
    pub ws_url: String,
}

#[derive(Debug, Clone)]
pub struct PolygonConfig {
    pub api_key: String,
    pub ws_url: String,
}

#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub max_trades: usize,
    pub refresh_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub provider: ProviderKind,
    pub finnhub: FinnhubConfig,
    pub polygon: PolygonConfig,
    pub symbols: Vec<String>,
    pub broker: BrokerConfig,
    pub window: WindowConfig,
    pub view: ViewConfig,
    pub enhanced_metrics: bool,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let provider = env::var("MARKET_DATA_PROVIDER")
            .unwrap_or_else(|_| "finnhub".to_string())
            .parse::<ProviderKind>()?;

        let symbols = env::var("SYMBOLS")
            .map(|raw| split_symbols(&raw))
            .unwrap_or_else(|_| vec!["AAPL".to_string(), "MSFT".to_string(), "GOOGL".to_string()]);

        Ok(Config {
            provider,
            finnhub: FinnhubConfig {
                token: env::var("FINNHUB_TOKEN").unwrap_or_default(),
                ws_url: env::var("FINNHUB_WS_URL")
                    .unwrap_or_else(|_| DEFAULT_FINNHUB_WS_URL.to_string()),
            },
            polygon: PolygonConfig {
                api_key: env::var("POLYGON_API_KEY").unwrap_or_default(),
                ws_url: env::var("POLYGON_WS_URL")
                    .unwrap_or_else(|_| DEFAULT_POLYGON_WS_URL.to_string()),
            },
            symbols,
            broker: BrokerConfig::default(),
            window: WindowConfig::event_based(50).expect("default window size is valid"),
            view: ViewConfig {
                max_trades: DEFAULT_MAX_TRADES,
                refresh_ms: DEFAULT_REFRESH_MS,
            },
            enhanced_metrics: false,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Merge command-line overrides over the environment-derived config.
    pub fn apply_cli(
        &mut self,
        provider: Option<&str>,
        token: Option<&str>,
        symbols: &[String],
        url: Option<&str>,
        max_trades: Option<usize>,
        window_size: Option<usize>,
        enhanced_metrics: bool,
    ) -> Result<()> {
        if let Some(provider) = provider {
            self.provider = provider.parse()?;
        }
        if let Some(token) = token {
            match self.provider {
                ProviderKind::Finnhub => self.finnhub.token = token.to_string(),
                ProviderKind::Polygon => self.polygon.api_key = token.to_string(),
            }
        }
        if !symbols.is_empty() {
            self.symbols = symbols.to_vec();
        }
        if let Some(url) = url {
            match self.provider {
                ProviderKind::Finnhub => self.finnhub.ws_url = url.to_string(),
                ProviderKind::Polygon => self.polygon.ws_url = url.to_string(),
            }
        }
        if let Some(max_trades) = max_trades {
            self.view.max_trades = max_trades;
        }
        if let Some(size) = window_size {
            self.window = WindowConfig::event_based(size)?;
        }
        if enhanced_metrics {
            self.enhanced_metrics = true;
        }
        Ok(())
    }

    /// The credential for the active provider, used to fail fast at startup.
    pub fn active_token(&self) -> &str {
        match self.provider {
            ProviderKind::Finnhub => &self.finnhub.token,
            ProviderKind::Polygon => &self.polygon.api_key,
        }
    }
}

fn split_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("finnhub".parse::<ProviderKind>().unwrap(), ProviderKind::Finnhub);
        assert_eq!("Polygon".parse::<ProviderKind>().unwrap(), ProviderKind::Polygon);
        assert!("alpaca".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn test_split_symbols_trims_and_drops_empties() {
        assert_eq!(
            split_symbols("AAPL, MSFT,,GOOGL "),
            vec!["AAPL", "MSFT", "GOOGL"]
        );
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = Config::from_env().unwrap();
        config
            .apply_cli(
                Some("polygon"),
                Some("secret"),
                &["TSLA".to_string()],
                Some("wss://example.test"),
                Some(5),
                Some(7),
                true,
            )
            .unwrap();

        assert_eq!(config.provider, ProviderKind::Polygon);
        assert_eq!(config.polygon.api_key, "secret");
        assert_eq!(config.polygon.ws_url, "wss://example.test");
        assert_eq!(config.symbols, vec!["TSLA"]);
        assert_eq!(config.view.max_trades, 5);
        assert_eq!(config.window, WindowConfig::EventBased { size: 7 });
        assert!(config.enhanced_metrics);
        assert_eq!(config.active_token(), "secret");
    }

    #[test]
    fn test_invalid_window_size_is_rejected() {
        let mut config = Config::from_env().unwrap();
        assert!(config
            .apply_cli(None, None, &[], None, None, Some(0), false)
            .is_err());
    }
}
