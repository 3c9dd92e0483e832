use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use heal_locator::StrategySettings;
use serde_json::json;
use tokio::fs;
use tracing::info;
use visual_match::decode::decode;
use visual_match::hash::to_hex;
use visual_match::{perceptual_hash, ImageSimilarity, MatchMethod, MatchOptions, TemplateMatcher};

use super::output::OutputFormat;
use crate::config::LoadedConfig;

#[derive(Args, Clone, Debug)]
pub struct PhashArgs {
    /// PNG or JPEG image
    pub image: PathBuf,
}

#[derive(Args, Clone, Debug)]
pub struct CompareArgs {
    pub a: PathBuf,
    pub b: PathBuf,
}

#[derive(Args, Clone, Debug)]
pub struct LocateArgs {
    /// Image of the element to find
    pub reference: PathBuf,

    /// Page screenshot to search
    pub screenshot: PathBuf,

    /// Minimum match score (defaults to the configured visual threshold)
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Template matching score function
    #[arg(long, value_enum)]
    pub method: Option<MethodArg>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum MethodArg {
    Ccorr,
    Sqdiff,
}

impl From<MethodArg> for MatchMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Ccorr => MatchMethod::CrossCorrelationNormalized,
            MethodArg::Sqdiff => MatchMethod::SquaredErrorNormalized,
        }
    }
}

async fn read_image(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))
}

pub async fn cmd_phash(args: PhashArgs, output: OutputFormat) -> Result<()> {
    let bytes = read_image(&args.image).await?;
    let image = decode(&bytes).with_context(|| format!("decoding {}", args.image.display()))?;
    let hash = to_hex(perceptual_hash(&image));
    output.print(&json!({ "image": args.image, "perceptual_hash": hash }), || {
        hash.clone()
    })
}

pub async fn cmd_compare(args: CompareArgs, output: OutputFormat) -> Result<()> {
    let a = read_image(&args.a).await?;
    let b = read_image(&args.b).await?;
    let report = tokio::task::spawn_blocking(move || ImageSimilarity::default().compare_bytes(&a, &b))
        .await
        .context("similarity task failed")??;
    output.print(&report, || {
        serde_json::to_string_pretty(&report).unwrap_or_default()
    })
}

/// Template options from the configured visual strategy, with CLI overrides
pub fn locate_options(loaded: &LoadedConfig, args: &LocateArgs) -> MatchOptions {
    let config = &loaded.config;
    let mut options = MatchOptions {
        threshold: config.visual_similarity_threshold,
        ..MatchOptions::default()
    };
    if let Some(StrategySettings::Visual(visual)) =
        config.settings(heal_locator::StrategyKind::Visual)
    {
        options.threshold = visual.threshold.unwrap_or(options.threshold);
        options.method = visual.method;
        options.iou_threshold = visual.iou_threshold;
        options.max_detections = visual.max_detections;
        options.max_regions = visual.max_regions;
        options.search_budget = visual.search_budget;
    }
    if let Some(threshold) = args.threshold {
        options.threshold = threshold;
    }
    if let Some(method) = args.method {
        options.method = method.into();
    }
    options
}

pub async fn cmd_locate(args: LocateArgs, loaded: &LoadedConfig, output: OutputFormat) -> Result<()> {
    let options = locate_options(loaded, &args);
    anyhow::ensure!(
        (0.0..=1.0).contains(&options.threshold),
        "threshold must be within [0, 1], got {}",
        options.threshold
    );
    let reference = read_image(&args.reference).await?;
    let screenshot = read_image(&args.screenshot).await?;

    let matcher = TemplateMatcher::new(options);
    let regions = tokio::task::spawn_blocking(move || matcher.find_bytes(&screenshot, &reference))
        .await
        .context("template matching task failed")??;
    info!("Retained {} regions", regions.len());

    output.print(&regions, || {
        serde_json::to_string_pretty(&regions).unwrap_or_default()
    })
}
