#![deny(unsafe_code, unsafe_op_in_unsafe_fn)]
#![warn(
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::todo,
    clippy::unimplemented,
    clippy::unneeded_field_pattern,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unnecessary_self_imports,
    clippy::str_to_string,
    clippy::string_to_string,
    clippy::string_slice
)]

use std::{path::PathBuf, time::Instant};

use anyhow::Context;
use clap::Parser;
use image::DynamicImage;
use segmette::{run_operation, Channels, ClusterCount, Image, NativeAlgebra, Operation, Options};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(about = "Runs one segmette pipeline on an image file")]
struct Cli {
    /// One of: grayscale, canny, contours, kmeans, combined_contours, ccl, combined_ccl
    #[arg(value_parser = parse_operation)]
    operation: Operation,

    input: PathBuf,

    output: PathBuf,

    /// Number of colors for `kmeans` and `combined_ccl`
    #[arg(short, long, default_value_t = ClusterCount::default(), value_parser = parse_cluster_count)]
    k: ClusterCount,

    /// Seed for clustering and label colors
    #[arg(long)]
    seed: Option<u64>,

    /// Cluster on all cores
    #[arg(long)]
    parallel: bool,

    #[arg(long)]
    verbose: bool,
}

fn parse_operation(s: &str) -> Result<Operation, String> {
    s.parse().map_err(|e| format!("{e}"))
}

fn parse_cluster_count(s: &str) -> Result<ClusterCount, String> {
    let value: u16 = s.parse().map_err(|e| format!("{e}"))?;
    value.try_into().map_err(|e| format!("{e}"))
}

fn main() -> anyhow::Result<()> {
    let Cli { operation, input, output, k, seed, parallel, verbose } = Cli::parse();

    let default_filter = if verbose { "segmette=debug" } else { "segmette=warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let time = Instant::now();
    let source = Image::from(
        image::open(&input).with_context(|| format!("failed to read {}", input.display()))?,
    );
    info!(elapsed_ms = time.elapsed().as_millis(), "read image");

    let mut algebra = NativeAlgebra::new().parallel(parallel);
    let mut options = Options::new().k(k);
    if let Some(seed) = seed {
        algebra = algebra.seed(seed);
        options = options.seed(seed);
    }

    let (width, height) = source.dimensions();
    let mut destination = Image::new(width, height, Channels::Rgb);

    let time = Instant::now();
    let result = run_operation(&algebra, operation, &source, &mut destination, &options)?;
    info!(elapsed_ms = time.elapsed().as_millis(), %operation, "ran pipeline");

    if let Some(colors) = &result.colors {
        for color in colors {
            println!("#{:02x}{:02x}{:02x}", color.red, color.green, color.blue);
        }
    }
    if let Some(components) = result.components {
        println!("{components} components");
    }

    DynamicImage::from(destination)
        .save(&output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    Ok(())
}
