use crate::pipeline::types::LayoutResult;
use crate::run_artifacts::{LayoutArtifact, RunMetadata};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::Path;
use tracing::info;

pub const OVERLAY_FILE: &str = "overlay.png";
pub const MASK_FILE: &str = "mask.png";
pub const LAYOUT_FILE: &str = "layout.json";
pub const METADATA_FILE: &str = "metadata.json";

/// Creates `<output_root>/<image stem>/` and writes its metadata.json.
/// Fails if the directory already exists.
pub fn create_run(output_root: &Path, image_path: &Path, roof_area_m2: f64) -> Result<RunMetadata> {
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow::anyhow!("Invalid image name: {}", image_path.display()))?;

    let output_dir = output_root.join(stem);
    if output_dir.exists() {
        return Err(anyhow::anyhow!(
            "Output directory already exists for: {}",
            stem
        ));
    }

    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let source_image = image_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(stem)
        .to_string();
    let metadata = RunMetadata {
        source_image,
        created_at: Utc::now(),
        run_id: stem.to_string(),
        roof_area_m2,
        output_dir: output_dir.clone(),
    };

    let content = serde_json::to_string_pretty(&metadata)?;
    fs::write(output_dir.join(METADATA_FILE), content)?;

    Ok(metadata)
}

/// Writes overlay, mask and layout.json into the run directory.
pub fn write_layout_artifacts(metadata: &RunMetadata, result: &LayoutResult) -> Result<()> {
    let dir = &metadata.output_dir;

    result
        .overlay
        .save(dir.join(OVERLAY_FILE))
        .context("Failed to save overlay")?;
    result
        .mask
        .save(dir.join(MASK_FILE))
        .context("Failed to save mask")?;

    let artifact = LayoutArtifact {
        image_width: result.overlay.width(),
        image_height: result.overlay.height(),
        panels: &result.panels,
        stats: &result.stats,
    };
    let content = serde_json::to_string_pretty(&artifact)?;
    fs::write(dir.join(LAYOUT_FILE), content)?;

    info!("Run {} written to {}", metadata.run_id, dir.display());
    Ok(())
}

/// Reads back a run's metadata.json.
pub fn load_run(run_dir: &Path) -> Result<RunMetadata> {
    let content = fs::read_to_string(run_dir.join(METADATA_FILE))
        .with_context(|| format!("No metadata in {}", run_dir.display()))?;
    let mut metadata: RunMetadata = serde_json::from_str(&content)?;
    metadata.output_dir = run_dir.to_path_buf();
    Ok(metadata)
}
