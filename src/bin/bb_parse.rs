//! bb-parse - scrape a mirrored lesson site into the lesson CSV
//!
//! Walks a folder of mirrored `deal*.html` pages, extracts hands,
//! auction, contract, opening lead, and the step-by-step analysis from
//! each, and writes the combined lesson CSV consumed by the rest of the
//! toolchain.

use anyhow::Result;
use bridge_lesson_toolkit::record::{write_lesson_csv, LessonConfig};
use bridge_lesson_toolkit::scrape::scrape_site;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bb-parse")]
#[command(about = "Extract lesson deals from a mirrored website into a CSV")]
struct Cli {
    /// Root folder of the mirrored site
    site_root: PathBuf,

    /// Output CSV file
    #[arg(short, long, default_value = "lessons.csv")]
    output: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = LessonConfig::site_defaults("Baker");
    let records = scrape_site(&cli.site_root, &config)?;
    write_lesson_csv(&cli.output, &records)?;

    let pass_outs = records.iter().filter(|r| r.contract.is_empty()).count();
    println!(
        "Wrote {} deals to {} ({} without a contract)",
        records.len(),
        cli.output.display(),
        pass_outs
    );
    Ok(())
}
