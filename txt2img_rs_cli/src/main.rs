use cliclack::input;
use std::{path::PathBuf, sync::Arc, time::Instant};

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use txt2img_rs_core::{ModelSource, Pipeline, TokenSource};

#[derive(Debug, Subcommand)]
pub enum SourceCommand {
    /// Load the pipeline from a local directory.
    Dir {
        /// Directory containing `model_index.json` and the pipeline components
        #[arg(short, long)]
        path: PathBuf,
    },

    /// Load the pipeline from a Hugging Face model ID
    ModelId {
        /// Model ID
        #[arg(short, long)]
        model_id: String,

        /// Revision of the model repository
        #[arg(short, long)]
        revision: Option<String>,
    },
}

#[derive(Parser)]
struct Args {
    #[clap(subcommand)]
    source: SourceCommand,

    /// Source of the Hugging Face token: `literal:<token>`, `env[:<var>]`, `path:<file>`, `cache` or `none`.
    /// By default, the Hugging Face token at ~/.cache/huggingface/token is used.
    #[arg(long, default_value = "cache")]
    token: TokenSource,

    /// Do not log loading progress.
    #[arg(long)]
    silent: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (source, revision) = match args.source {
        SourceCommand::Dir { path } => (ModelSource::from_local_dir(path), None),
        SourceCommand::ModelId { model_id, revision } => {
            (ModelSource::from_model_id(model_id), revision)
        }
    };

    let pipeline = Arc::new(Pipeline::load(source, args.silent, args.token, revision)?);
    let params = pipeline.params();
    println!("Images are generated at {}x{}.", params.width, params.height);

    let runtime = tokio::runtime::Runtime::new()?;
    let _guard = runtime.enter();

    loop {
        let prompt: String = input("Prompt:")
            .validate(|input: &String| {
                if input.is_empty() {
                    Err("Prompt is required!")
                } else {
                    Ok(())
                }
            })
            .interact()?;

        let start = Instant::now();

        let task = pipeline.spawn(prompt)?;
        let image = match runtime.block_on(task.wait()) {
            Ok(image) => image,
            Err(e) => {
                cliclack::log::error(format!("Image generation failed: {e}"))?;
                continue;
            }
        };

        let end = Instant::now();
        println!(
            "Image generation took: {:.2}s",
            end.duration_since(start).as_secs_f32()
        );

        let out_file: String = input("Save image to:")
            .validate(|input: &String| {
                if input.is_empty() {
                    Err("Image path is required!")
                } else {
                    let path = PathBuf::from(input);
                    match path.extension().and_then(|ext| ext.to_str()) {
                        Some("png") => Ok(()),
                        Some(_) => Err(".png extension is required!"),
                        None => Err("Extension is required!"),
                    }
                }
            })
            .interact()?;

        image.save(out_file)?;
    }
}
