use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{prelude::*, EnvFilter};
use veilgray::pipeline::{convert, CkksPipeline, ConversionPaths, EncryptionMode, PipelineConfig};
use veilgray::LumaWeights;
use veilgray_he_core::ParameterProfile;

#[derive(Parser, Debug)]
#[command(author, version, about = "Converts a BGR image to grayscale under CKKS encryption", long_about = None)]
struct Args {
    #[arg(short, long, default_value = "kingfisher.bmp")]
    input: PathBuf,

    /// Grayscale image produced by the encrypted pipeline.
    #[arg(long = "encrypted-output", default_value = "kingfisher2.bmp")]
    encrypted_output: PathBuf,

    /// Grayscale image computed in the clear, for comparison.
    #[arg(long = "plaintext-output", default_value = "kingfisher3.bmp")]
    plaintext_output: PathBuf,

    #[arg(short, long, default_value_t = ParameterProfile::N16384)]
    profile: ParameterProfile,

    /// Worker threads; defaults to the rayon global pool.
    #[arg(short, long)]
    threads: Option<usize>,

    /// Seed for reproducible key generation.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long = "public-key-encryption", help = "Encrypt with the public key instead of the secret key")]
    public_key_encryption: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = PipelineConfig {
        profile: args.profile,
        threads: args.threads,
        key_seed: args.seed,
        encryption: if args.public_key_encryption {
            EncryptionMode::PublicKey
        } else {
            EncryptionMode::SecretKey
        },
        weights: LumaWeights::BT601,
    };
    info!(?config, "starting");

    let pipeline = CkksPipeline::from_config(config)
        .with_context(|| format!("failed to set up the {} parameter set", args.profile))?;
    let paths = ConversionPaths {
        input: args.input,
        encrypted_output: args.encrypted_output,
        plaintext_output: args.plaintext_output,
    };
    let report = convert(&pipeline, &paths)
        .with_context(|| format!("failed to convert {}", paths.input.display()))?;

    println!("Resolution : {:4} x{:4}", report.width, report.height);
    print!("{}", report.timings);
    Ok(())
}
