use std::{path::PathBuf, process::ExitCode};

use audit::{Audit, read_references};
use clap::Parser;
use imaging::UrlBuilder;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Origin serving the image routes
    #[arg(long, default_value = "http://localhost:1111")]
    site: Url,

    /// Backend origin whose uploads are relayed
    #[arg(long)]
    backend: Option<Url>,

    /// File with one image reference per line
    #[arg(long)]
    file: Option<PathBuf>,

    /// Exit non-zero when any reference falls back to a placeholder
    #[arg(long)]
    strict: bool,

    references: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let mut references = args.references;
    if let Some(file) = &args.file {
        references.extend(read_references(file).await?);
    }

    let mut builder = UrlBuilder::default();
    if let Some(backend) = &args.backend {
        builder = builder.with_backend_origin(backend);
    }

    let report = Audit::new(args.site, builder)?.run(&references).await;

    report.print();

    if args.strict && !report.all_served() {
        return Ok(ExitCode::FAILURE);
    }

    Ok(ExitCode::SUCCESS)
}
