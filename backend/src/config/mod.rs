//! Pipeline configuration.
//!
//! Every historical variant of the POST workbook is a subset of one
//! pipeline. A [`PipelineConfig`] says which stages run, which columns are
//! cleaned and summed, how the filter classifies rows and how the outputs are
//! named and styled.
//!
//! Configs are JSON; every field is optional and falls back to the
//! [`Profile::Full`] defaults.
//!
//! ```json
//! {
//!   "stages": { "computedSums": false },
//!   "beamBalanceColumns": ["IT"],
//!   "filter": { "keywords": ["BCY"] }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ConfigError, ConfigResult};
use crate::render::{ColumnStyle, StyleMap};
use crate::transform::filter::KeywordFilter;
use crate::transform::operations::DEFAULT_CODE_PATTERNS;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "POSTENRICH_CONFIG";

/// Environment variable naming a profile (`classic` or `full`).
pub const PROFILE_ENV: &str = "POSTENRICH_PROFILE";

/// Fill colour applied to computed sum columns.
pub const DEFAULT_SUM_FILL: &str = "FFF2CC";

/// Which enrichment stages run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StageToggles {
    pub code_count: bool,
    pub demand_merge: bool,
    /// Per-project order list and GB count (part of the Demand merge).
    pub project_orders: bool,
    pub numeric_cleanup: bool,
    pub computed_sums: bool,
    pub tubs_merge: bool,
    pub beam_balance_merge: bool,
    pub filter: bool,
}

impl Default for StageToggles {
    fn default() -> Self {
        Self {
            code_count: true,
            demand_merge: true,
            project_orders: true,
            numeric_cleanup: true,
            computed_sums: true,
            tubs_merge: true,
            beam_balance_merge: true,
            filter: true,
        }
    }
}

/// A measurement column cleaned by the numeric extractor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericColumn {
    pub column: String,
    pub decimals: u32,
    /// Font colour used when rendering this column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
}

impl NumericColumn {
    pub fn new(column: impl Into<String>, decimals: u32) -> Self {
        Self {
            column: column.into(),
            decimals,
            font_color: None,
        }
    }

    pub fn highlighted(mut self, color: impl Into<String>) -> Self {
        self.font_color = Some(color.into());
        self
    }
}

/// Two measurement columns summed into a new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SumPair {
    pub first: String,
    pub second: String,
    pub output: String,
}

impl SumPair {
    pub fn new(first: &str, second: &str, output: &str) -> Self {
        Self {
            first: first.to_string(),
            second: second.to_string(),
            output: output.to_string(),
        }
    }
}

/// Output file and sheet names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OutputNames {
    pub modified_file: String,
    pub modified_sheet: String,
    pub filtered_file: String,
    pub filtered_sheet: String,
}

impl Default for OutputNames {
    fn default() -> Self {
        Self {
            modified_file: "modified_post.xlsx".to_string(),
            modified_sheet: "ModifiedPost".to_string(),
            filtered_file: "filtered_post.xlsx".to_string(),
            filtered_sheet: "FilteredPost".to_string(),
        }
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PipelineConfig {
    pub stages: StageToggles,
    /// Substrings counted by the code-count column.
    pub code_patterns: Vec<String>,
    pub numeric_columns: Vec<NumericColumn>,
    pub sum_pairs: Vec<SumPair>,
    pub sum_fill_color: String,
    /// BeamBalance value columns merged per project, in output order.
    pub beam_balance_columns: Vec<String>,
    pub filter: KeywordFilter,
    /// Explicit style map; derived from the columns above when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub styles: Option<StyleMap>,
    pub output: OutputNames,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: StageToggles::default(),
            code_patterns: DEFAULT_CODE_PATTERNS.iter().map(|s| s.to_string()).collect(),
            numeric_columns: vec![
                NumericColumn::new("Beam Issue To PO", 2),
                NumericColumn::new("Weft Issue To PO", 2),
                NumericColumn::new("Action Qty Befor Post", 3).highlighted("FF0000"),
            ],
            sum_pairs: vec![
                SumPair::new("Beam Issue To PO", "Weft Issue To PO", "Total Issue To PO"),
                SumPair::new("Beam Balance Qty", "Weft Balance Qty", "Total Balance Qty"),
            ],
            sum_fill_color: DEFAULT_SUM_FILL.to_string(),
            beam_balance_columns: vec!["IT".to_string(), "Phy whs".to_string()],
            filter: KeywordFilter::default(),
            styles: None,
            output: OutputNames::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON config; missing fields take the defaults.
    /// Parse a config and check that its column styles render.
    pub fn from_json(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.style_map().validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn to_json(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Resolve the effective config.
    ///
    /// Order: explicit file, then `POSTENRICH_CONFIG`, then the given
    /// profile, then `POSTENRICH_PROFILE`, then [`Profile::Full`].
    pub fn load(path: Option<&Path>, profile: Option<Profile>) -> ConfigResult<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }
        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            if !env_path.trim().is_empty() {
                return Self::from_file(Path::new(env_path.trim()));
            }
        }
        let profile = match profile {
            Some(p) => p,
            None => match std::env::var(PROFILE_ENV) {
                Ok(name) if !name.trim().is_empty() => name.parse()?,
                _ => Profile::Full,
            },
        };
        Ok(profile.config())
    }

    /// Column styles used by the renderer.
    ///
    /// Numeric columns get their fixed-decimals format (and font colour),
    /// sum columns a `0.00` format with the sum fill.
    pub fn style_map(&self) -> StyleMap {
        if let Some(ref styles) = self.styles {
            return styles.clone();
        }

        let mut styles = StyleMap::new();
        for numeric in &self.numeric_columns {
            let mut style = ColumnStyle::decimals(numeric.decimals);
            if let Some(ref color) = numeric.font_color {
                style = style.with_font_color(color.as_str());
            }
            styles.insert(numeric.column.as_str(), style);
        }
        if self.stages.computed_sums {
            for pair in &self.sum_pairs {
                styles.insert(
                    pair.output.as_str(),
                    ColumnStyle::decimals(2).with_fill_color(self.sum_fill_color.as_str()),
                );
            }
        }
        styles
    }
}

/// Named presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// First shipped variant: count, Project, cleanup, TT_CODE, IT, filter.
    Classic,
    /// Every stage.
    Full,
}

impl Profile {
    pub fn config(&self) -> PipelineConfig {
        match self {
            Profile::Full => PipelineConfig::default(),
            Profile::Classic => {
                let mut config = PipelineConfig::default();
                config.stages.project_orders = false;
                config.stages.computed_sums = false;
                config.sum_pairs.clear();
                config.beam_balance_columns = vec!["IT".to_string()];
                config
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Profile::Classic => "classic",
            Profile::Full => "full",
        }
    }
}

impl FromStr for Profile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "classic" => Ok(Profile::Classic),
            "full" => Ok(Profile::Full),
            other => Err(ConfigError::UnknownProfile(other.to_string())),
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_full_profile_defaults() {
        let config = Profile::Full.config();
        assert!(config.stages.computed_sums);
        assert_eq!(config.sum_pairs.len(), 2);
        assert_eq!(config.beam_balance_columns, vec!["IT", "Phy whs"]);
        assert_eq!(config.output.modified_sheet, "ModifiedPost");
    }

    #[test]
    fn test_classic_profile_subset() {
        let config = Profile::Classic.config();
        assert!(!config.stages.project_orders);
        assert!(!config.stages.computed_sums);
        assert!(config.sum_pairs.is_empty());
        assert_eq!(config.beam_balance_columns, vec!["IT"]);
        assert!(config.stages.tubs_merge);
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!("Classic".parse::<Profile>().unwrap(), Profile::Classic);
        assert_eq!(" full ".parse::<Profile>().unwrap(), Profile::Full);
        assert!(matches!(
            "v3".parse::<Profile>(),
            Err(ConfigError::UnknownProfile(_))
        ));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json(
            r#"{ "stages": { "computedSums": false }, "filter": { "keywords": ["BCY"] } }"#,
        )
        .unwrap();
        assert!(!config.stages.computed_sums);
        assert!(config.stages.tubs_merge);
        assert_eq!(config.filter.keywords, vec!["BCY"]);
        assert_eq!(config.filter.sentinel, "Not Found");
        assert_eq!(config.numeric_columns.len(), 3);
    }

    #[test]
    fn test_style_map_derivation() {
        let styles = Profile::Full.config().style_map();
        let action = styles.get("Action Qty Befor Post").unwrap();
        assert_eq!(action.num_format.as_deref(), Some("0.000"));
        assert_eq!(action.font_color.as_deref(), Some("FF0000"));
        let total = styles.get("Total Issue To PO").unwrap();
        assert_eq!(total.fill_color.as_deref(), Some(DEFAULT_SUM_FILL));
        assert!(styles.validate().is_ok());

        let classic = Profile::Classic.config().style_map();
        assert!(classic.get("Total Issue To PO").is_none());
        assert_eq!(classic.len(), 3);
    }

    #[test]
    fn test_bad_colour_rejected_on_load() {
        let err = PipelineConfig::from_json(r#"{ "sumFillColor": "yellow" }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Style(_)));
        assert!(err.to_string().contains("yellow"));

        let styled = r##"{ "styles": { "Qty": { "fontColor": "#12345" } } }"##;
        assert!(matches!(PipelineConfig::from_json(styled), Err(ConfigError::Style(_))));
    }

    #[test]
    fn test_explicit_file_wins() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{ "beamBalanceColumns": ["Phy whs"] }}"#).unwrap();
        let config = PipelineConfig::load(Some(file.path()), Some(Profile::Classic)).unwrap();
        assert_eq!(config.beam_balance_columns, vec!["Phy whs"]);
    }

    #[test]
    fn test_json_round_trip_of_profile() {
        let config = Profile::Classic.config();
        let back = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
