use std::time::Duration;

use clap::Parser;
use serde::Deserialize;

use grid_engine::{Columns, ControllerConfig, Currency};

use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config/grid.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub show_account: bool,
    pub show_category: bool,
    pub show_zero_in_deposit: bool,
    pub currency: String,
    pub settle_delay_ms: u64,
    pub default_account: Option<String>,
    /// JSON ledger seeding the store; demo data when unset or missing.
    pub ledger_path: Option<String>,
    /// Where the split expansion layout is remembered between runs.
    pub state_path: String,
    pub log_path: String,
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            show_account: true,
            show_category: true,
            show_zero_in_deposit: false,
            currency: "EUR".to_string(),
            settle_delay_ms: 250,
            default_account: None,
            ledger_path: None,
            state_path: "config/grid_state.json".to_string(),
            log_path: "grid_tui.log".to_string(),
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn controller_config(&self) -> Result<ControllerConfig> {
        let currency = Currency::try_from(self.currency.as_str())?;
        Ok(ControllerConfig {
            columns: Columns {
                show_account: self.show_account,
                show_category: self.show_category,
            },
            currency,
            show_zero_in_deposit: self.show_zero_in_deposit,
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            default_account: self.default_account.clone(),
        })
    }
}

#[derive(Debug, Parser)]
#[command(name = "grid_tui", disable_version_flag = true)]
struct Args {
    /// Optional config file path (TOML).
    #[arg(long)]
    config: Option<String>,
    /// Override the ledger file (JSON).
    #[arg(long)]
    ledger: Option<String>,
    /// Override the expansion state file.
    #[arg(long)]
    state: Option<String>,
    /// Override currency code (EUR, USD, GBP, JPY).
    #[arg(long)]
    currency: Option<String>,
    /// Account used for new drafts.
    #[arg(long)]
    account: Option<String>,
    /// Override log level.
    #[arg(long)]
    level: Option<String>,
    #[arg(long)]
    hide_account: bool,
    #[arg(long)]
    hide_category: bool,
}

pub fn load() -> Result<AppConfig> {
    let args = Args::parse();

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("GRID_TUI"));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(ledger) = args.ledger {
        settings.ledger_path = Some(ledger);
    }
    if let Some(state) = args.state {
        settings.state_path = state;
    }
    if let Some(currency) = args.currency {
        settings.currency = currency;
    }
    if let Some(account) = args.account {
        settings.default_account = Some(account);
    }
    if let Some(level) = args.level {
        settings.level = level;
    }
    if args.hide_account {
        settings.show_account = false;
    }
    if args.hide_category {
        settings.show_category = false;
    }

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn builds_controller_config() {
        let settings = AppConfig {
            currency: "jpy".to_string(),
            show_category: false,
            settle_delay_ms: 40,
            ..AppConfig::default()
        };
        let config = settings.controller_config().unwrap();
        assert_eq!(config.currency, Currency::Jpy);
        assert!(config.columns.show_account);
        assert!(!config.columns.show_category);
        assert_eq!(config.settle_delay, Duration::from_millis(40));
    }

    #[test]
    fn rejects_unknown_currency() {
        let settings = AppConfig {
            currency: "XYZ".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            settings.controller_config(),
            Err(AppError::Engine(_))
        ));
    }
}
