use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable naming an alternative configuration file.
pub const CONFIG_ENV: &str = "DASHBOARD_CONFIG";
/// Looked up in the working directory when `DASHBOARD_CONFIG` is unset.
pub const DEFAULT_CONFIG_FILE: &str = "dashboard.json";

/// A categorical column offered as a multi-select filter.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FilterColumn {
    pub name: String,
    pub label: String,
}

impl FilterColumn {
    fn new(name: &str, label: &str) -> Self {
        Self {
            name: name.to_owned(),
            label: label.to_owned(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ChartConfig {
    pub dpi: u32,
    /// Figure width in inches.
    pub width_in: f64,
    /// Figure height in inches.
    pub height_in: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            width_in: 12.0,
            height_in: 5.0,
        }
    }
}

impl ChartConfig {
    /// Raster size in pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width_in * self.dpi as f64).round() as u32,
            (self.height_in * self.dpi as f64).round() as u32,
        )
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct DashboardConfig {
    /// Field separator tried first when parsing uploads.
    pub delimiter: char,
    /// Selection entry meaning "do not filter this column".
    pub wildcard_label: String,
    /// Categorical column whose distribution is compared.
    pub target_column: String,
    /// Numeric column filtered by an inclusive range.
    pub range_column: String,
    /// Membership filters, applied in this order after the range filter.
    pub filter_columns: Vec<FilterColumn>,
    /// Rows shown in the before/after previews.
    pub preview_rows: usize,
    /// Entries kept per memo cache.
    pub cache_capacity: usize,
    pub chart: ChartConfig,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            delimiter: ';',
            wildcard_label: "all".to_owned(),
            target_column: "y".to_owned(),
            range_column: "age".to_owned(),
            filter_columns: vec![
                FilterColumn::new("job", "Job"),
                FilterColumn::new("marital", "Marital status"),
                FilterColumn::new("default", "Default"),
                FilterColumn::new("housing", "Has housing loan?"),
                FilterColumn::new("loan", "Has personal loan?"),
                FilterColumn::new("contact", "Contact method"),
                FilterColumn::new("month", "Contact month"),
                FilterColumn::new("day_of_week", "Day of week"),
            ],
            preview_rows: 5,
            cache_capacity: 64,
            chart: ChartConfig::default(),
        }
    }
}

impl DashboardConfig {
    /// Read a JSON configuration file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `DASHBOARD_CONFIG` or `dashboard.json`, falling back to
    /// defaults when neither is usable.
    pub fn load_or_default() -> Self {
        let explicit = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let path = explicit
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        if explicit.is_none() && !path.exists() {
            log::debug!("no {DEFAULT_CONFIG_FILE}, using default configuration");
            return Self::default();
        }

        match Self::load(&path) {
            Ok(config) => {
                log::info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                log::warn!("Ignoring configuration: {e:#}");
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.delimiter.is_ascii(), "delimiter must be an ASCII character");
        anyhow::ensure!(!self.wildcard_label.is_empty(), "wildcard_label must not be empty");
        anyhow::ensure!(self.chart.dpi > 0, "chart.dpi must be positive");
        anyhow::ensure!(
            self.chart.width_in > 0.0 && self.chart.height_in > 0.0,
            "chart size must be positive"
        );
        Ok(())
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter as u8
    }

    /// Columns an upload must have to be accepted.
    pub fn required_columns(&self) -> Vec<String> {
        let mut cols = vec![self.range_column.clone()];
        cols.extend(self.filter_columns.iter().map(|c| c.name.clone()));
        cols.push(self.target_column.clone());
        cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_cover_the_marketing_layout() {
        let config = DashboardConfig::default();
        assert_eq!(
            config.required_columns(),
            vec![
                "age", "job", "marital", "default", "housing", "loan", "contact", "month",
                "day_of_week", "y"
            ]
        );
        assert_eq!(config.chart.pixel_size(), (3600, 1500));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "delimiter": ",", "chart": {{ "dpi": 100 }} }}"#).unwrap();

        let config = DashboardConfig::load(file.path()).unwrap();
        assert_eq!(config.delimiter, ',');
        assert_eq!(config.chart.dpi, 100);
        assert_eq!(config.chart.width_in, 12.0);
        assert_eq!(config.target_column, "y");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "chart": {{ "dpi": 0 }} }}"#).unwrap();
        assert!(DashboardConfig::load(file.path()).is_err());
    }
}
