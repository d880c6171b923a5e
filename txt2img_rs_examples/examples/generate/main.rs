use std::{path::PathBuf, sync::Arc, time::Instant};

use txt2img_rs_core::{ModelSource, Pipeline, TokenSource};

use clap::Parser;
use tokio::sync::oneshot;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
struct Args {
    /// Directory containing `model_index.json` and the pipeline components
    #[arg(short, long)]
    model_dir: PathBuf,

    /// Prompt to use
    #[arg(short, long, default_value = "A beautiful landscape")]
    prompt: String,

    /// Where to write the PNG
    #[arg(short, long, default_value = "image.png")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let pipeline = Arc::new(Pipeline::load(
        ModelSource::from_local_dir(&args.model_dir),
        false,
        TokenSource::None,
        None,
    )?);

    let start = Instant::now();

    // The completion runs on the runtime; hand the result back to this task.
    let (tx, rx) = oneshot::channel();
    pipeline.generate_image(args.prompt, move |image| {
        let _ = tx.send(image);
    });
    let Some(image) = rx.await? else {
        anyhow::bail!("image generation failed");
    };

    let end = Instant::now();
    println!("Took: {:.2}s", end.duration_since(start).as_secs_f32());

    image.save(&args.output)?;
    println!("Saved {}", args.output.display());

    Ok(())
}
