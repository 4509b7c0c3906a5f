use anyhow::Result;
use clap::Parser;
use microblog::build::build_site;
use microblog::config::{CliArgs, Config};
use microblog::telemetry;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = CliArgs::parse();
    let config = Config::load(&cli)?;
    telemetry::init(&config.logging)?;

    tracing::debug!(
        source = %config.source_directory.display(),
        blog = %config.blog_directory.display(),
        output = %config.output_directory.display(),
        tracking = config.tracking,
        concurrent = config.concurrent,
        "building site"
    );
    let index = build_site(&config).await?;
    println!("Wrote {}", index.display());
    Ok(())
}
