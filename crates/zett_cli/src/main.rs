use std::{
    fs::File,
    io::{BufReader, BufWriter, Write, stdout},
    path::PathBuf,
};

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::{EnvFilter, prelude::*};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compresses a file
    Compress(CompressArgs),

    /// Decompresses a file
    Decompress(DecompressArgs),
}

#[derive(Args)]
struct CompressArgs {
    /// Input file to compress
    input: PathBuf,

    /// Output file; defaults to the input with a .zst extension
    output: Option<PathBuf>,

    /// Compression level (1-22)
    #[arg(short, long, default_value_t = 3)]
    level: i32,

    /// Skip the content checksum
    #[arg(long)]
    no_checksum: bool,
}

#[derive(Args)]
struct DecompressArgs {
    /// Input file to decompress
    input: PathBuf,

    /// Output file
    output: Option<PathBuf>,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let file_appender = tracing_appender::rolling::never("target", "dump.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .without_time()
        .with_level(false);

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(stdout)
        .with_ansi(true)
        .without_time()
        .with_level(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(file_layer)
        .with(stdout_layer)
        .init();

    match cli.command {
        Commands::Compress(args) => {
            let output = args.output.unwrap_or_else(|| {
                let mut path = args.input.clone();
                path.as_mut_os_string().push(".zst");
                path
            });

            let src = std::fs::read(&args.input).into_diagnostic()?;
            let frame =
                zett_compress::compress_to_vec_with(&src, args.level, !args.no_checksum)
                    .into_diagnostic()?;

            let mut writer = BufWriter::new(File::create(&output).into_diagnostic()?);
            writer.write_all(&frame).into_diagnostic()?;
            writer.flush().into_diagnostic()?;

            tracing::info!(
                "{} -> {} ({} -> {} bytes)",
                args.input.display(),
                output.display(),
                src.len(),
                frame.len(),
            );
        }
        Commands::Decompress(args) => {
            let output_file = {
                let output = args.output.unwrap_or(
                    args.input.file_stem().expect("Unnamed input file").into(),
                );
                File::create(output).into_diagnostic()?
            };

            let input_file = File::open(args.input).into_diagnostic()?;
            let reader = BufReader::new(input_file);
            let mut writer = BufWriter::new(output_file);

            let mut decoder = zett_decompress::Decoder::new(reader);
            decoder.decode(&mut writer).into_diagnostic()?;
            writer.flush().into_diagnostic()?;
        }
    }
    Ok(())
}
