use std::path::Path;

use anyhow::Context as _;

use crate::{
    foundation::error::{DotMatrixError, DotMatrixResult},
    pipeline::process::PipelineOpts,
    raster::{dots::RenderParams, sampler::SampleMode},
};

/// Settings for one conversion job, loadable from JSON.
///
/// Every field has a default, so `{}` is a valid config. Command-line flags override values read
/// from a file.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobConfig {
    pub dot_size: u32,
    pub spacing: u32,
    pub sampling: SampleMode,
    /// Still images larger than `max_width × max_height` are downscaled before rendering.
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
    /// Video frames are decoded so that their longer side is at most this many pixels.
    pub max_dim: Option<u32>,
    /// Drop frames to approach this rate. `None` keeps the source rate.
    pub target_fps: Option<f64>,
    pub pipeline: PipelineOpts,
}

impl Default for JobConfig {
    fn default() -> Self {
        let params = RenderParams::default();
        Self {
            dot_size: params.dot_size,
            spacing: params.spacing,
            sampling: params.sampling,
            max_width: None,
            max_height: None,
            max_dim: Some(640),
            target_fps: None,
            pipeline: PipelineOpts::default(),
        }
    }
}

impl JobConfig {
    pub fn from_json(s: &str) -> DotMatrixResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| DotMatrixError::invalid_params(format!("job config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> DotMatrixResult<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read job config '{}'", path.display()))?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> DotMatrixResult<()> {
        if self.dot_size == 0 {
            return Err(DotMatrixError::invalid_params("dot_size must be >= 1"));
        }
        self.params().validate()?;
        for (name, v) in [
            ("max_width", self.max_width),
            ("max_height", self.max_height),
            ("max_dim", self.max_dim),
        ] {
            if v == Some(0) {
                return Err(DotMatrixError::invalid_params(format!(
                    "{name} must be >= 1 when set"
                )));
            }
        }
        if let Some(fps) = self.target_fps
            && !(fps.is_finite() && fps > 0.0)
        {
            return Err(DotMatrixError::invalid_params(
                "target_fps must be a positive number",
            ));
        }
        if self.pipeline.in_flight == 0 || self.pipeline.channel_capacity == 0 {
            return Err(DotMatrixError::invalid_params(
                "pipeline in_flight and channel_capacity must be >= 1",
            ));
        }
        self.pipeline.validate()
    }

    pub fn params(&self) -> RenderParams {
        RenderParams {
            dot_size: self.dot_size,
            spacing: self.spacing,
            sampling: self.sampling,
        }
    }

    /// Image bounds, when either side is limited. A missing side is unbounded.
    pub fn image_bounds(&self) -> Option<(u32, u32)> {
        match (self.max_width, self.max_height) {
            (None, None) => None,
            (w, h) => Some((w.unwrap_or(u32::MAX), h.unwrap_or(u32::MAX))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let cfg = JobConfig::from_json("{}").unwrap();
        assert_eq!(cfg.params(), RenderParams::default());
        assert_eq!(cfg.max_dim, Some(640));
        assert!(cfg.pipeline.parallel);
        assert_eq!(cfg.image_bounds(), None);
    }

    #[test]
    fn parses_nested_pipeline_and_sampling() {
        let cfg = JobConfig::from_json(
            r#"{
                "dot_size": 6,
                "spacing": 0,
                "sampling": "block_average",
                "max_width": 800,
                "target_fps": 12.5,
                "pipeline": { "parallel": false, "threads": 2 }
            }"#,
        )
        .unwrap();
        assert_eq!(cfg.params().pitch(), 6);
        assert_eq!(cfg.sampling, SampleMode::BlockAverage);
        assert_eq!(cfg.image_bounds(), Some((800, u32::MAX)));
        assert_eq!(cfg.target_fps, Some(12.5));
        assert!(!cfg.pipeline.parallel);
        assert_eq!(cfg.pipeline.threads, Some(2));
        assert_eq!(cfg.pipeline.in_flight, PipelineOpts::default().in_flight);
    }

    #[test]
    fn rejects_bad_values() {
        for json in [
            r#"{"dot_size": 0, "spacing": 0}"#,
            r#"{"dot_size": 0, "spacing": 4}"#,
            r#"{"max_dim": 0}"#,
            r#"{"target_fps": -1.0}"#,
            r#"{"pipeline": {"threads": 0}}"#,
            r#"{"pipeline": {"in_flight": 0}}"#,
            r#"{"dot_sise": 3}"#,
        ] {
            let err = JobConfig::from_json(json).unwrap_err();
            assert!(
                matches!(err, DotMatrixError::InvalidParams(_)),
                "{json}: {err}"
            );
        }
    }
}
