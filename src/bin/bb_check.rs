//! bb-check - validation utilities over the lesson CSV
//!
//! `hands` reports legality problems; `missing-bids` lists bids made by
//! seats with no recorded cards; `generate` asks the external constraint
//! dealer for hands satisfying those bid sequences; `fill` patches the
//! CSV with constructed or complementary hands; `bba-diff` compares the
//! recorded auctions against a bidding analyzer's output.

use anyhow::Result;
use bridge_lesson_toolkit::bba::{compare_auctions, read_pbn_file, render_diff_report};
use bridge_lesson_toolkit::fill::{
    condition_label, fill_missing_hands, find_missing_bids, load_constructed_hands,
    read_missing_bids_csv, write_missing_bids_csv, ConstructedRow, DealerRunner,
};
use bridge_lesson_toolkit::legality::check_records;
use bridge_lesson_toolkit::record::{read_lesson_csv, write_lesson_csv};
use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bb-check")]
#[command(about = "Validate and repair lesson CSV data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check hand legality: card counts and duplicate cards
    Hands {
        /// Input lesson CSV
        input: PathBuf,
    },

    /// List bids made by seats whose hands are missing
    MissingBids {
        /// Input lesson CSV
        input: PathBuf,

        /// Output CSV of missing-bid rows
        #[arg(short, long, default_value = "missing_bids.csv")]
        output: PathBuf,
    },

    /// Generate constrained hands for missing-bid rows via the dealer
    /// binary
    Generate {
        /// Missing-bids CSV from the missing-bids subcommand
        input: PathBuf,

        /// Dealer template file with one condition per bid sequence
        #[arg(long, default_value = "auction_templates.dlr")]
        templates: PathBuf,

        /// Path to the dealer binary
        #[arg(long, env = "DEALER_PATH")]
        dealer_path: PathBuf,

        /// Output constructed-hands CSV
        #[arg(short, long, default_value = "constructed_hands.csv")]
        output: PathBuf,

        /// Candidate deals to generate per row
        #[arg(long, default_value = "1")]
        candidates: usize,
    },

    /// Fill in missing East/West hands
    Fill {
        /// Input lesson CSV
        input: PathBuf,

        /// Output lesson CSV with hands filled
        #[arg(short, long)]
        output: PathBuf,

        /// Constructed-hands CSV from the generate subcommand
        #[arg(long)]
        constructed: Option<PathBuf>,
    },

    /// Compare recorded auctions against a bidding analyzer's PBN output
    BbaDiff {
        /// Reference PBN file
        reference: PathBuf,

        /// Analyzer output PBN file
        analyzer: PathBuf,

        /// Diff report path; written only when differences exist
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Hands { input } => {
            let records = read_lesson_csv(&input)?;
            let issues = check_records(&records);
            for issue in &issues {
                println!("{}", issue);
            }
            println!("{} deals checked, {} issues", records.len(), issues.len());
        }

        Commands::MissingBids { input, output } => {
            let records = read_lesson_csv(&input)?;
            let rows = find_missing_bids(&records);
            write_missing_bids_csv(&output, &rows)?;
            println!("Wrote {} missing-bid rows to {}", rows.len(), output.display());
        }

        Commands::Generate {
            input,
            templates,
            dealer_path,
            output,
            candidates,
        } => {
            let rows = read_missing_bids_csv(&input)?;
            let runner = DealerRunner::new(&dealer_path, &templates)?;

            let mut constructed: Vec<ConstructedRow> = Vec::new();
            let mut unsupported: BTreeSet<String> = BTreeSet::new();
            for row in &rows {
                let label = condition_label(&row.bid_sequence);
                if !runner.supports(&label) {
                    unsupported.insert(if row.bid_sequence.is_empty() {
                        "(empty)".to_string()
                    } else {
                        row.bid_sequence.clone()
                    });
                    continue;
                }
                let deals = runner.generate(row, candidates)?;
                let Some(deal) = deals.first() else {
                    log::error!(
                        "No dealer output for {}/{}, label {}",
                        row.subfolder,
                        row.deal,
                        label
                    );
                    continue;
                };
                constructed.push(ConstructedRow {
                    subfolder: row.subfolder.clone(),
                    deal: row.deal.clone(),
                    north_hand: deal.north.to_colon_string(),
                    east_hand: deal.east.to_colon_string(),
                    south_hand: deal.south.to_colon_string(),
                    west_hand: deal.west.to_colon_string(),
                    label,
                });
            }

            let mut writer = csv::Writer::from_path(&output)?;
            for row in &constructed {
                writer.serialize(row)?;
            }
            writer.flush()?;

            if !unsupported.is_empty() {
                println!("Unsupported bid sequences: {:?}", unsupported);
            }
            println!(
                "Generated hands for {} of {} rows into {}",
                constructed.len(),
                rows.len(),
                output.display()
            );
        }

        Commands::Fill {
            input,
            output,
            constructed,
        } => {
            let mut records = read_lesson_csv(&input)?;
            let constructed = match constructed {
                Some(path) => load_constructed_hands(&path)?,
                None => Default::default(),
            };
            let mut rng = rand::thread_rng();
            let stats = fill_missing_hands(&mut records, &constructed, &mut rng)?;
            write_lesson_csv(&output, &records)?;
            println!("Hands used from constructed set: {}", stats.from_constructed);
            println!("Hands generated internally: {}", stats.generated);
            if stats.mismatches > 0 {
                println!("Constructed hands rejected (N/S mismatch): {}", stats.mismatches);
            }
        }

        Commands::BbaDiff {
            reference,
            analyzer,
            output,
        } => {
            let (_, reference_games) = read_pbn_file(&reference)?;
            let (_, analyzer_games) = read_pbn_file(&analyzer)?;
            let results = compare_auctions(&reference_games, &analyzer_games);

            let scenario = reference
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let matched = results.iter().filter(|r| r.matches).count();
            println!("{}/{} auctions match", matched, results.len());

            match render_diff_report(&scenario, &results) {
                Some(report) => {
                    let path = output
                        .unwrap_or_else(|| PathBuf::from(format!("{}-diff.txt", scenario)));
                    std::fs::write(&path, report)?;
                    println!("Differences written to {}", path.display());
                }
                None => {
                    println!("No differences.");
                }
            }
        }
    }
    Ok(())
}
