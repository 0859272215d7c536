mod cli;

use anyhow::{Context, Result};
use cli::{Args, BatchArgs, Command, LayoutArgs};
use indicatif::{ProgressBar, ProgressStyle};
use solar_layout::estimator::FixedRoofArea;
use solar_layout::run_artifacts::ManifestRow;
use solar_layout::run_context::{create_run, write_layout_artifacts};
use solar_layout::{layout_with_estimator, LayoutParams};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

fn run_one(
    image_path: &Path,
    area_m2: f64,
    length_m: Option<f64>,
    width_m: Option<f64>,
    params: &LayoutParams,
    output_root: &Path,
) -> Result<PathBuf> {
    let image = image::open(image_path)
        .with_context(|| format!("Failed to open image {}", image_path.display()))?
        .to_rgb8();

    let result = layout_with_estimator(&image, &FixedRoofArea(area_m2), length_m, width_m, params)
        .with_context(|| format!("Layout failed for {}", image_path.display()))?;
    for w in result.warnings() {
        warn!("{}: {}", image_path.display(), w);
    }

    let metadata = create_run(output_root, image_path, area_m2)?;
    write_layout_artifacts(&metadata, &result)?;
    Ok(metadata.output_dir)
}

fn run_layout(args: LayoutArgs) -> Result<()> {
    let params = args.params.resolve()?;
    let out = run_one(
        &args.image,
        args.area_m2,
        args.length_m,
        args.width_m,
        &params,
        &args.output_root,
    )?;
    info!("Wrote {}", out.display());
    Ok(())
}

fn run_batch(args: BatchArgs) -> Result<()> {
    let params = args.params.resolve()?;
    let mut reader = csv::Reader::from_path(&args.manifest)
        .with_context(|| format!("Failed to open manifest {}", args.manifest.display()))?;
    let rows = reader
        .deserialize::<ManifestRow>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("Malformed manifest row")?;

    // Relative image paths are resolved against the manifest's directory
    let base = args.manifest.parent().unwrap_or_else(|| Path::new("."));

    let pb = ProgressBar::new(rows.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut failed = 0usize;
    for row in &rows {
        let image_path = base.join(&row.image);
        match run_one(
            &image_path,
            row.area_m2,
            row.length_m,
            row.width_m,
            &params,
            &args.output_root,
        ) {
            Ok(out) => pb.println(format!("{} -> {}", row.image.display(), out.display())),
            Err(e) => {
                failed += 1;
                error!("{}: {:#}", row.image.display(), e);
            }
        }
        pb.inc(1);
    }
    pb.finish();

    info!(
        "Batch finished: {} succeeded, {} failed",
        rows.len() - failed,
        failed
    );
    Ok(())
}

fn main() -> Result<()> {
    // Load environment variables from .env if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt::init();

    let args = Args::parse_args();

    match args.command {
        Command::Layout(layout) => run_layout(layout)?,
        Command::Batch(batch) => run_batch(batch)?,
    }

    Ok(())
}
