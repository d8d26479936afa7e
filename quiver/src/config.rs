//! Configuration layer providing clean separation between CLI arguments and the
//! scoring configuration used by the analysis pipeline.
//!
//! - `ScoringConfig`: read-only pipeline settings (thresholds, input size, labels),
//!   loadable from TOML and validated once before any analysis runs
//! - `GlobalArgs` / `ScoreCommand`: clap argument structs
//! - `ScoreRunConfig`: what the batch runner needs, built from the CLI structs

use clap::Parser;
use clap_verbosity_flag::Verbosity;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::scoring::TargetSelection;
use crate::yolo_postprocessing::SuppressionScope;

pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_CONFIDENCE: f32 = 0.4;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.45;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{name} must be between 0.0 and 1.0, got {value}")]
    Probability { name: &'static str, value: f32 },
    #[error("input_size must be positive")]
    InputSize,
    #[error("{role} label '{label}' is not among the class labels")]
    MissingLabel { role: &'static str, label: String },
    #[error("label '{0}' is assigned to more than one class")]
    DuplicateLabel(String),
    #[error("target and miss labels must differ, both are '{0}'")]
    SharedReservedLabel(String),
}

/// Parse probability value (must be between 0.0 and 1.0)
pub fn parse_probability(s: &str) -> Result<f32, String> {
    let val = s
        .parse::<f32>()
        .map_err(|_| format!("Invalid number: '{s}'"))?;
    if !(0.0..=1.0).contains(&val) {
        return Err(format!("Must be between 0.0 and 1.0, got {val}"));
    }
    Ok(val)
}

fn check_probability(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Probability { name, value })
    }
}

/// Class id to label mapping, with the two reserved roles.
///
/// `names[i]` is the label of class `i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassLabels {
    pub names: Vec<String>,
    /// Label of the target-face class
    pub target: String,
    /// Label of the class marking a missed shot; never scored
    pub miss: String,
}

impl Default for ClassLabels {
    fn default() -> Self {
        Self {
            names: vec!["miss".into(), "arrow".into(), "target".into()],
            target: "target".into(),
            miss: "miss".into(),
        }
    }
}

impl ClassLabels {
    pub fn label_for(&self, class_id: u32) -> &str {
        self.names
            .get(class_id as usize)
            .map(String::as_str)
            .unwrap_or("unknown")
    }

    pub fn is_target(&self, label: &str) -> bool {
        label == self.target
    }

    pub fn is_miss(&self, label: &str) -> bool {
        label == self.miss
    }

    /// A configured label that is neither the target nor a miss.
    pub fn is_arrow(&self, label: &str) -> bool {
        !self.is_target(label) && !self.is_miss(label) && self.names.iter().any(|n| n == label)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, name) in self.names.iter().enumerate() {
            if self.names[..i].contains(name) {
                return Err(ConfigError::DuplicateLabel(name.clone()));
            }
        }
        if self.target == self.miss {
            return Err(ConfigError::SharedReservedLabel(self.target.clone()));
        }
        for (role, label) in [("target", &self.target), ("miss", &self.miss)] {
            if !self.names.contains(label) {
                return Err(ConfigError::MissingLabel {
                    role,
                    label: label.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Read-only settings for the analysis pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Side of the square model input, in pixels
    pub input_size: u32,
    /// Minimum best-class score for a prediction to be kept
    pub confidence: f32,
    /// IoU at or above which the weaker of two boxes is suppressed
    pub nms_threshold: f32,
    pub suppression: SuppressionScope,
    pub target_selection: TargetSelection,
    pub labels: ClassLabels,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            confidence: DEFAULT_CONFIDENCE,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            suppression: SuppressionScope::default(),
            target_selection: TargetSelection::default(),
            labels: ClassLabels::default(),
        }
    }
}

impl ScoringConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ScoringConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_probability("confidence", self.confidence)?;
        check_probability("nms_threshold", self.nms_threshold)?;
        if self.input_size == 0 {
            return Err(ConfigError::InputSize);
        }
        self.labels.validate()
    }
}

/// Global CLI arguments that apply to all quiver commands
#[derive(Parser, Debug, Clone)]
pub struct GlobalArgs {
    /// Global output directory (overrides default placement next to input)
    #[arg(long, global = true)]
    pub output_dir: Option<String>,

    /// Verbosity level (-q/--quiet, -v/-vv/-vvv/-vvvv for info/debug/trace)
    #[command(flatten)]
    pub verbosity: Verbosity,

    /// Use permissive mode for input validation (warn instead of error for unreadable captures)
    #[arg(long, global = true)]
    pub permissive: bool,

    /// Disable colored output (also respects NO_COLOR and QUIVER_NO_COLOR env vars)
    #[arg(long, global = true)]
    pub no_color: bool,
}

/// CLI command for scoring detector captures
#[derive(Parser, Debug, Clone)]
pub struct ScoreCommand {
    /// Capture files (JSON tensor dumps) or directories containing them
    #[arg(value_name = "CAPTURES", required = true)]
    pub sources: Vec<String>,

    /// TOML file with scoring configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Confidence threshold for detections (0.0-1.0)
    #[arg(short, long, value_parser = parse_probability)]
    pub confidence: Option<f32>,

    /// IoU threshold for non-maximum suppression (0.0-1.0)
    #[arg(long, value_parser = parse_probability)]
    pub iou_threshold: Option<f32>,

    /// Only suppress overlapping boxes of the same class
    #[arg(long)]
    pub per_class_nms: bool,

    /// How to choose between several target-face detections
    #[arg(long, value_enum)]
    pub target_selection: Option<TargetSelection>,
}

/// Configuration common to all batch commands
#[derive(Debug, Clone, Default, Serialize)]
pub struct BaseConfig {
    /// Input sources (files or directories)
    pub sources: Vec<String>,
    /// Optional output directory override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,
    /// Fail on unreadable inputs. Opposite of `--permissive`.
    pub strict: bool,
}

/// Internal configuration for the `score` command
#[derive(Debug, Clone, Serialize)]
pub struct ScoreRunConfig {
    #[serde(skip)]
    pub base: BaseConfig,
    pub scoring: ScoringConfig,
}

impl From<GlobalArgs> for BaseConfig {
    fn from(global: GlobalArgs) -> Self {
        Self {
            sources: Vec::new(), // Sources come from command, not global args
            output_dir: global.output_dir,
            strict: !global.permissive,
        }
    }
}

impl ScoreRunConfig {
    /// Create configuration from global args and command-specific args.
    /// Flags given on the command line override the config file.
    pub fn from_args(global: GlobalArgs, cmd: ScoreCommand) -> Result<Self, ConfigError> {
        let mut base: BaseConfig = global.into();
        base.sources = cmd.sources;

        let mut scoring = match &cmd.config {
            Some(path) => ScoringConfig::load(path)?,
            None => ScoringConfig::default(),
        };
        if let Some(confidence) = cmd.confidence {
            scoring.confidence = confidence;
        }
        if let Some(iou) = cmd.iou_threshold {
            scoring.nms_threshold = iou;
        }
        if cmd.per_class_nms {
            scoring.suppression = SuppressionScope::PerClass;
        }
        if let Some(selection) = cmd.target_selection {
            scoring.target_selection = selection;
        }
        scoring.validate()?;

        Ok(Self { base, scoring })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn global_args(permissive: bool) -> GlobalArgs {
        GlobalArgs {
            output_dir: Some("/tmp/out".to_string()),
            verbosity: Verbosity::new(0, 0),
            permissive,
            no_color: false,
        }
    }

    fn score_command() -> ScoreCommand {
        ScoreCommand {
            sources: vec!["capture.json".to_string()],
            config: None,
            confidence: None,
            iou_threshold: None,
            per_class_nms: false,
            target_selection: None,
        }
    }

    #[test]
    fn test_global_args_conversion() {
        let base: BaseConfig = global_args(true).into();

        assert!(base.sources.is_empty());
        assert_eq!(base.output_dir, Some("/tmp/out".to_string()));
        assert!(!base.strict); // permissive=true -> strict=false
    }

    #[test]
    fn test_score_command_defaults() {
        let config = ScoreRunConfig::from_args(global_args(false), score_command()).unwrap();

        assert_eq!(config.base.sources, vec!["capture.json"]);
        assert!(config.base.strict);
        assert_eq!(config.scoring, ScoringConfig::default());
    }

    #[test]
    fn test_score_command_overrides() {
        let cmd = ScoreCommand {
            confidence: Some(0.3),
            iou_threshold: Some(0.6),
            per_class_nms: true,
            target_selection: Some(TargetSelection::HighestConfidence),
            ..score_command()
        };

        let config = ScoreRunConfig::from_args(global_args(false), cmd).unwrap();

        assert_eq!(config.scoring.confidence, 0.3);
        assert_eq!(config.scoring.nms_threshold, 0.6);
        assert_eq!(config.scoring.suppression, SuppressionScope::PerClass);
        assert_eq!(
            config.scoring.target_selection,
            TargetSelection::HighestConfidence
        );
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config = ScoringConfig::from_toml_str("confidence = 0.35\n").unwrap();

        assert_eq!(config.confidence, 0.35);
        assert_eq!(config.input_size, DEFAULT_INPUT_SIZE);
        assert_eq!(config.nms_threshold, DEFAULT_NMS_THRESHOLD);
        assert_eq!(config.labels, ClassLabels::default());
    }

    #[test]
    fn test_full_toml() {
        let content = r#"
input_size = 416
confidence = 0.5
nms_threshold = 0.5
suppression = "per-class"
target_selection = "highest-confidence"

[labels]
names = ["no_hit", "hit", "face"]
target = "face"
miss = "no_hit"
"#;
        let config = ScoringConfig::from_toml_str(content).unwrap();

        assert_eq!(config.input_size, 416);
        assert_eq!(config.suppression, SuppressionScope::PerClass);
        assert_eq!(config.target_selection, TargetSelection::HighestConfidence);
        assert_eq!(config.labels.label_for(2), "face");
        assert_eq!(config.labels.label_for(7), "unknown");
        assert!(config.labels.is_arrow("hit"));
        assert!(!config.labels.is_arrow("face"));
        assert!(!config.labels.is_arrow("no_hit"));
        assert!(!config.labels.is_arrow("unknown"));
    }

    #[test]
    fn test_validation_errors() {
        let bad_confidence = ScoringConfig {
            confidence: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            bad_confidence.validate(),
            Err(ConfigError::Probability {
                name: "confidence",
                ..
            })
        ));

        let bad_size = ScoringConfig {
            input_size: 0,
            ..Default::default()
        };
        assert!(matches!(bad_size.validate(), Err(ConfigError::InputSize)));

        let mut missing_target = ScoringConfig::default();
        missing_target.labels.target = "bullseye".into();
        assert!(matches!(
            missing_target.validate(),
            Err(ConfigError::MissingLabel { role: "target", .. })
        ));

        let mut duplicate = ScoringConfig::default();
        duplicate.labels.names.push("arrow".into());
        assert!(matches!(
            duplicate.validate(),
            Err(ConfigError::DuplicateLabel(_))
        ));

        let mut shared = ScoringConfig::default();
        shared.labels.miss = "target".into();
        assert!(matches!(
            shared.validate(),
            Err(ConfigError::SharedReservedLabel(_))
        ));
    }

    #[test]
    fn test_parse_probability() {
        assert_eq!(parse_probability("0.0"), Ok(0.0));
        assert_eq!(parse_probability("0.45"), Ok(0.45));
        assert_eq!(parse_probability("1.0"), Ok(1.0));

        assert!(parse_probability("-0.5").is_err());
        assert!(parse_probability("1.5").is_err());
        assert!(parse_probability("invalid").is_err());
    }
}
