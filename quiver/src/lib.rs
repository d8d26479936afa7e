pub mod analysis;
pub mod capture;
pub mod color_utils;
pub mod config;
pub mod coordinate_mapping;
pub mod detection_obj;
pub mod output_manager;
pub mod score_processing;
pub mod scoring;
pub mod shared_metadata;
pub mod yolo_postprocessing;

pub use analysis::{
    AnalysisError, AnalysisResult, AnalysisStatus, Analyzer, InferenceBackend, InferenceOutput,
    PipelineObserver,
};
pub use config::{ClassLabels, ConfigError, ScoringConfig};
pub use coordinate_mapping::{PreprocessMeta, PreprocessTransform};
pub use detection_obj::{BoundingBox, Candidate, Detection};
pub use scoring::{ArrowHit, TargetGeometry, TargetSelection};
pub use yolo_postprocessing::SuppressionScope;
