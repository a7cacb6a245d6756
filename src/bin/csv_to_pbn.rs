//! csv-to-pbn - turn the lesson CSV into a PBN lesson library
//!
//! `convert` writes one PBN file per lesson subfolder; `split-sets` cuts
//! those files into fixed-size board sets; `hierarchy` lays out the
//! distributable folder tree; `package` flattens everything into one
//! folder for shipping.

use anyhow::{Context, Result};
use bridge_lesson_toolkit::package::{
    build_lesson_hierarchy, collect_package, create_board_subsets, load_titles,
};
use bridge_lesson_toolkit::pbn::{convert_records, PbnConfig};
use bridge_lesson_toolkit::record::{read_lesson_csv, LessonConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "csv-to-pbn")]
#[command(about = "Convert the lesson CSV into PBN files and package them")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a lesson CSV into PBN files, one per subfolder
    Convert {
        /// Input lesson CSV
        input: PathBuf,

        /// Output root for the PBN tree
        #[arg(short, long, default_value = "pbns")]
        output: PathBuf,

        /// Optional header file prepended to every PBN file
        #[arg(long)]
        header: Option<PathBuf>,

        /// Label used in board title comments
        #[arg(long, default_value = "Baker")]
        title_prefix: String,
    },

    /// Split each lesson's PBN file into fixed-size board sets
    SplitSets {
        /// Root folder holding the lesson hierarchy
        root: PathBuf,

        /// Board counts to split into
        #[arg(long, default_value = "4,5", value_delimiter = ',')]
        sizes: Vec<usize>,
    },

    /// Create the lesson folder hierarchy from a titles CSV
    Hierarchy {
        /// Titles CSV mapping Subfolder to Title
        titles: PathBuf,

        /// Folder holding the source PBN files
        #[arg(long)]
        source: PathBuf,

        /// Destination root for the hierarchy
        #[arg(long, default_value = ".")]
        dest: PathBuf,
    },

    /// Collect every PBN under a root into one flat package folder
    Package {
        /// Root folder to collect from
        root: PathBuf,

        /// Package folder
        #[arg(short, long, default_value = "../Package")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            output,
            header,
            title_prefix,
        } => {
            let records = read_lesson_csv(&input)?;
            let header = match header {
                Some(path) => Some(
                    std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read header {}", path.display()))?,
                ),
                None => None,
            };
            let config = PbnConfig {
                output_root: output,
                header,
                source_filename: input
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                lesson: LessonConfig::site_defaults(&title_prefix),
            };
            let written = convert_records(&records, &config)?;
            println!("Wrote {} PBN files from {} deals", written.len(), records.len());
        }

        Commands::SplitSets { root, sizes } => {
            for size in sizes {
                let written = create_board_subsets(&root, size)?;
                println!("{}-board sets: {} files", size, written.len());
            }
        }

        Commands::Hierarchy {
            titles,
            source,
            dest,
        } => {
            let titles = load_titles(&titles)?;
            build_lesson_hierarchy(&titles, &source, &dest)?;
            println!("Created {} lesson folders under {}", titles.len(), dest.display());
        }

        Commands::Package { root, output } => {
            let count = collect_package(&root, &output)?;
            println!("Copied {} files into {}", count, output.display());
        }
    }
    Ok(())
}
