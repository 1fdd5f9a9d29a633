use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::env;
use std::fmt;
use std::fs::File;
use std::num::{ParseFloatError, ParseIntError};
use std::path::Path;
use std::str::FromStr;

use crate::stats::MIN_COINT_OBSERVATIONS;

const DEFAULT_UNIVERSE: [&str; 20] = [
    "ING", "TBC", "BMA", "PB", "FBC", "STL", "FCF", "PFS", "BOH", "SCNB", "BK", "CMA", "AF",
    "PNC", "KB", "SHG", "BSAC", "CIB", "BBD", "BSBR",
];
// Three months of one-minute session bars.
const DEFAULT_MAX_BARS: usize = 390 * 21 * 3;
const DEFAULT_MIN_READY_BARS: usize = 390 * 21;
const DEFAULT_RESAMPLE_INTERVAL: usize = 10;
const DEFAULT_MIN_OVERLAP: usize = 30;
const DEFAULT_MAX_ACTIVE_PAIRS: usize = 10;
const DEFAULT_TOTAL_LEVERAGE: f64 = 1.0;
const DEFAULT_MIN_CORR_THRESHOLD: f64 = 0.9;
const DEFAULT_COINT_P_THRESHOLD: f64 = 0.05;
const DEFAULT_STATIONARY_P_THRESHOLD: f64 = 0.05;
const DEFAULT_OPEN_SIZE: f64 = 2.32;
const DEFAULT_CLOSE_SIZE: f64 = 0.5;
const DEFAULT_STOP_LOSS_SIZE: f64 = 6.0;
const DEFAULT_REGENERATE_INTERVAL_DAYS: u64 = 5;
const DEFAULT_EQUITY_USD: i64 = 50_000;
const DEFAULT_GATEWAY: &str = "paper";

#[derive(Debug)]
pub enum ConfigError {
    ParseIntError(ParseIntError),
    ParseFloatError(ParseFloatError),
    DecimalParseError(rust_decimal::Error),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::ParseIntError(e) => write!(f, "Parse int error: {}", e),
            ConfigError::ParseFloatError(e) => write!(f, "Parse float error: {}", e),
            ConfigError::DecimalParseError(e) => write!(f, "Decimal parse error: {}", e),
            ConfigError::Invalid(e) => write!(f, "Invalid config: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ParseIntError> for ConfigError {
    fn from(err: ParseIntError) -> ConfigError {
        ConfigError::ParseIntError(err)
    }
}

impl From<ParseFloatError> for ConfigError {
    fn from(err: ParseFloatError) -> ConfigError {
        ConfigError::ParseFloatError(err)
    }
}

impl From<rust_decimal::Error> for ConfigError {
    fn from(err: rust_decimal::Error) -> ConfigError {
        ConfigError::DecimalParseError(err)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
enum StringOrVec {
    String(String),
    Vec(Vec<String>),
}

impl StringOrVec {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringOrVec::String(value) => split_symbols(&value),
            StringOrVec::Vec(values) => values
                .into_iter()
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
struct PairTradeYaml {
    dry_run: Option<bool>,
    agent_name: Option<String>,
    gateway: Option<String>,
    universe_symbols: Option<StringOrVec>,
    max_bars: Option<usize>,
    min_ready_bars: Option<usize>,
    resample_interval: Option<usize>,
    min_overlap: Option<usize>,
    max_active_pairs: Option<usize>,
    total_leverage: Option<f64>,
    min_corr_threshold: Option<f64>,
    coint_p_threshold: Option<f64>,
    stationary_p_threshold: Option<f64>,
    open_size: Option<f64>,
    close_size: Option<f64>,
    stop_loss_size: Option<f64>,
    regenerate_interval_days: Option<u64>,
    equity_usd: Option<Decimal>,
    size_decimals: Option<u32>,
    backtest_file: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PairTradeConfig {
    pub dry_run: bool,
    pub agent_name: Option<String>,
    pub gateway: String,
    pub universe: Vec<String>,
    pub max_bars: usize,
    pub min_ready_bars: usize,
    pub resample_interval: usize,
    pub min_overlap: usize,
    pub max_active_pairs: usize,
    pub total_leverage: f64,
    pub min_corr_threshold: f64,
    pub coint_p_threshold: f64,
    pub stationary_p_threshold: f64,
    pub open_size: f64,
    pub close_size: f64,
    pub stop_loss_size: f64,
    pub regenerate_interval_days: u64,
    pub equity_usd: Decimal,
    pub size_decimals: u32,
    pub backtest_file: Option<String>,
}

/// Entry, exit and stop-loss distances in units of residual std.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub open_size: f64,
    pub close_size: f64,
    pub stop_loss_size: f64,
}

impl Default for PairTradeConfig {
    fn default() -> Self {
        Self::from_yaml(PairTradeYaml::default())
    }
}

impl PairTradeConfig {
    pub fn from_env_or_yaml() -> Result<Self> {
        let config_path = env::var("PAIRTRADE_CONFIG_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let mut cfg = match config_path {
            Some(path) => Self::from_yaml_path(path)?,
            None => Self::default(),
        };
        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Loads a YAML file without env overrides. Missing keys take defaults.
    pub fn from_yaml_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref)
            .with_context(|| format!("failed to open PairTrade config {}", path_ref.display()))?;
        let yaml: PairTradeYaml = serde_yaml::from_reader(file)
            .with_context(|| format!("failed to parse PairTrade config {}", path_ref.display()))?;
        let cfg = Self::from_yaml(yaml);
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_yaml(yaml: PairTradeYaml) -> Self {
        let universe = yaml
            .universe_symbols
            .map(StringOrVec::into_vec)
            .unwrap_or_else(|| DEFAULT_UNIVERSE.iter().map(|s| s.to_string()).collect());
        Self {
            dry_run: yaml.dry_run.unwrap_or(true),
            agent_name: yaml.agent_name,
            gateway: yaml
                .gateway
                .unwrap_or_else(|| DEFAULT_GATEWAY.to_string()),
            universe,
            max_bars: yaml.max_bars.unwrap_or(DEFAULT_MAX_BARS),
            min_ready_bars: yaml.min_ready_bars.unwrap_or(DEFAULT_MIN_READY_BARS),
            resample_interval: yaml
                .resample_interval
                .unwrap_or(DEFAULT_RESAMPLE_INTERVAL),
            min_overlap: yaml.min_overlap.unwrap_or(DEFAULT_MIN_OVERLAP),
            max_active_pairs: yaml.max_active_pairs.unwrap_or(DEFAULT_MAX_ACTIVE_PAIRS),
            total_leverage: yaml.total_leverage.unwrap_or(DEFAULT_TOTAL_LEVERAGE),
            min_corr_threshold: yaml
                .min_corr_threshold
                .unwrap_or(DEFAULT_MIN_CORR_THRESHOLD),
            coint_p_threshold: yaml
                .coint_p_threshold
                .unwrap_or(DEFAULT_COINT_P_THRESHOLD),
            stationary_p_threshold: yaml
                .stationary_p_threshold
                .unwrap_or(DEFAULT_STATIONARY_P_THRESHOLD),
            open_size: yaml.open_size.unwrap_or(DEFAULT_OPEN_SIZE),
            close_size: yaml.close_size.unwrap_or(DEFAULT_CLOSE_SIZE),
            stop_loss_size: yaml.stop_loss_size.unwrap_or(DEFAULT_STOP_LOSS_SIZE),
            regenerate_interval_days: yaml
                .regenerate_interval_days
                .unwrap_or(DEFAULT_REGENERATE_INTERVAL_DAYS),
            equity_usd: yaml
                .equity_usd
                .unwrap_or_else(|| Decimal::from(DEFAULT_EQUITY_USD)),
            size_decimals: yaml.size_decimals.unwrap_or(0),
            backtest_file: yaml.backtest_file,
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = env::var("DRY_RUN") {
            self.dry_run = value.to_lowercase() == "true";
        }
        if let Some(value) = env_string("AGENT_NAME") {
            self.agent_name = Some(value);
        }
        if let Some(value) = env_string("GATEWAY") {
            self.gateway = value;
        }
        if let Some(value) = env_string("UNIVERSE_SYMBOLS") {
            self.universe = split_symbols(&value);
        }
        if let Some(value) = env_string("MAX_BARS") {
            self.max_bars = value.parse()?;
        }
        if let Some(value) = env_string("MIN_READY_BARS") {
            self.min_ready_bars = value.parse()?;
        }
        if let Some(value) = env_string("RESAMPLE_INTERVAL") {
            self.resample_interval = value.parse()?;
        }
        if let Some(value) = env_string("MIN_OVERLAP") {
            self.min_overlap = value.parse()?;
        }
        if let Some(value) = env_string("MAX_ACTIVE_PAIRS") {
            self.max_active_pairs = value.parse()?;
        }
        if let Some(value) = env_string("TOTAL_LEVERAGE") {
            self.total_leverage = value.parse()?;
        }
        if let Some(value) = env_string("MIN_CORR_THRESHOLD") {
            self.min_corr_threshold = value.parse()?;
        }
        if let Some(value) = env_string("COINT_P_THRESHOLD") {
            self.coint_p_threshold = value.parse()?;
        }
        if let Some(value) = env_string("STATIONARY_P_THRESHOLD") {
            self.stationary_p_threshold = value.parse()?;
        }
        if let Some(value) = env_string("OPEN_SIZE") {
            self.open_size = value.parse()?;
        }
        if let Some(value) = env_string("CLOSE_SIZE") {
            self.close_size = value.parse()?;
        }
        if let Some(value) = env_string("STOP_LOSS_SIZE") {
            self.stop_loss_size = value.parse()?;
        }
        if let Some(value) = env_string("REGENERATE_INTERVAL_DAYS") {
            self.regenerate_interval_days = value.parse()?;
        }
        if let Some(value) = env_string("EQUITY_USD") {
            self.equity_usd = Decimal::from_str(&value)?;
        }
        if let Some(value) = env_string("SIZE_DECIMALS") {
            self.size_decimals = value.parse()?;
        }
        if let Some(value) = env_string("BACKTEST_FILE") {
            self.backtest_file = Some(value);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));
        if !(self.close_size < self.open_size && self.open_size < self.stop_loss_size) {
            return invalid(format!(
                "bands must satisfy close_size < open_size < stop_loss_size (got {} / {} / {})",
                self.close_size, self.open_size, self.stop_loss_size
            ));
        }
        if self.close_size < 0.0 {
            return invalid(format!("close_size must be >= 0 (got {})", self.close_size));
        }
        if self.universe.len() < 2 {
            return invalid("universe needs at least two symbols".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = self.universe.iter().find(|s| !seen.insert(s.as_str())) {
            return invalid(format!("duplicate symbol {} in universe", dup));
        }
        if self.max_active_pairs == 0 {
            return invalid("max_active_pairs must be >= 1".to_string());
        }
        if self.max_bars == 0 || self.min_ready_bars > self.max_bars {
            return invalid(format!(
                "min_ready_bars ({}) must not exceed max_bars ({})",
                self.min_ready_bars, self.max_bars
            ));
        }
        if self.min_overlap < MIN_COINT_OBSERVATIONS {
            return invalid(format!(
                "min_overlap must be >= {} (got {})",
                MIN_COINT_OBSERVATIONS, self.min_overlap
            ));
        }
        if self.resample_interval == 0 {
            return invalid("resample_interval must be >= 1".to_string());
        }
        for (name, p) in [
            ("coint_p_threshold", self.coint_p_threshold),
            ("stationary_p_threshold", self.stationary_p_threshold),
        ] {
            if !(p > 0.0 && p <= 1.0) {
                return invalid(format!("{} must be in (0, 1] (got {})", name, p));
            }
        }
        if !(-1.0..=1.0).contains(&self.min_corr_threshold) {
            return invalid(format!(
                "min_corr_threshold must be in [-1, 1] (got {})",
                self.min_corr_threshold
            ));
        }
        if !(self.total_leverage > 0.0) {
            return invalid(format!(
                "total_leverage must be > 0 (got {})",
                self.total_leverage
            ));
        }
        if self.equity_usd <= Decimal::ZERO {
            return invalid(format!("equity_usd must be > 0 (got {})", self.equity_usd));
        }
        if self.regenerate_interval_days == 0 {
            return invalid("regenerate_interval_days must be >= 1".to_string());
        }
        Ok(())
    }

    pub fn bands(&self) -> Bands {
        Bands {
            open_size: self.open_size,
            close_size: self.close_size,
            stop_loss_size: self.stop_loss_size,
        }
    }

    pub fn regenerate_interval_ms(&self) -> i64 {
        (self.regenerate_interval_days as i64).saturating_mul(86_400_000)
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn write_yaml(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_match_reference_deployment() {
        let cfg = PairTradeConfig::default();
        assert_eq!(cfg.universe.len(), 20);
        assert_eq!(cfg.max_bars, 24_570);
        assert_eq!(cfg.max_active_pairs, 10);
        assert_eq!(cfg.equity_usd, dec!(50000));
        assert_eq!(
            cfg.bands(),
            Bands {
                open_size: 2.32,
                close_size: 0.5,
                stop_loss_size: 6.0
            }
        );
        assert_eq!(cfg.regenerate_interval_ms(), 5 * 86_400_000);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn yaml_overrides_defaults_and_accepts_symbol_string() {
        let file = write_yaml(
            "universe_symbols: \"AAA, BBB,CCC\"\nmax_active_pairs: 2\nopen_size: 2.0\nequity_usd: 1000\nagent_name: bank-pairs\n",
        );
        let cfg = PairTradeConfig::from_yaml_path(file.path()).unwrap();
        assert_eq!(cfg.universe, vec!["AAA", "BBB", "CCC"]);
        assert_eq!(cfg.max_active_pairs, 2);
        assert_eq!(cfg.open_size, 2.0);
        assert_eq!(cfg.equity_usd, dec!(1000));
        assert_eq!(cfg.close_size, 0.5);
        assert_eq!(cfg.agent_name.as_deref(), Some("bank-pairs"));
    }

    #[test]
    fn yaml_accepts_symbol_list() {
        let file = write_yaml("universe_symbols:\n  - XOM\n  - CVX\n");
        let cfg = PairTradeConfig::from_yaml_path(file.path()).unwrap();
        assert_eq!(cfg.universe, vec!["XOM", "CVX"]);
    }

    #[test]
    fn incoherent_bands_are_rejected() {
        let file = write_yaml("open_size: 7.0\n");
        let err = PairTradeConfig::from_yaml_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("close_size < open_size < stop_loss_size"));

        let mut cfg = PairTradeConfig::default();
        cfg.close_size = 2.32;
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn validate_rejects_bad_universe_and_windows() {
        let mut cfg = PairTradeConfig::default();
        cfg.universe = vec!["AAA".to_string()];
        assert!(cfg.validate().is_err());

        let mut cfg = PairTradeConfig::default();
        cfg.universe = vec!["AAA".to_string(), "AAA".to_string()];
        assert!(cfg.validate().is_err());

        let mut cfg = PairTradeConfig::default();
        cfg.min_ready_bars = cfg.max_bars + 1;
        assert!(cfg.validate().is_err());

        let mut cfg = PairTradeConfig::default();
        cfg.max_active_pairs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = PairTradeConfig::default();
        cfg.min_overlap = MIN_COINT_OBSERVATIONS - 1;
        assert!(cfg.validate().is_err());
        cfg.min_overlap = MIN_COINT_OBSERVATIONS;
        assert!(cfg.validate().is_ok());
    }
}
