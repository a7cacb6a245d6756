//! Bridge Lesson Toolkit
//!
//! Tools for converting a legacy bridge-lesson website into structured
//! data and PBN lesson libraries.
//!
//! This library provides:
//! - `auction`: auction reconstruction (dealer, contract, declarer)
//! - `hand`: cards, hands, and deals in the site's and PBN formats
//! - `scrape`: HTML extraction from mirrored lesson pages
//! - `record`: the intermediate CSV record and site configuration
//! - `directives`: typed presentation directives for analysis text
//! - `pbn`: CSV → PBN conversion
//! - `legality`: deal legality checks
//! - `fill`: missing-hand detection and filling
//! - `bba`: comparison against the external bidding analyzer
//! - `package`: board-set splitting and library packaging
//!
//! Binaries:
//! - `bb-parse`: scrape a mirrored site folder into the lesson CSV
//! - `csv-to-pbn`: convert the CSV into PBN files, split sets, package
//! - `bb-check`: validation utilities over the lesson CSV

pub mod auction;
pub mod bba;
pub mod directives;
pub mod fill;
pub mod hand;
pub mod legality;
pub mod package;
pub mod pbn;
pub mod record;
pub mod scrape;

// Re-export the types nearly every caller touches.
pub use auction::{resolve_auction, Bid, Contract, Doubling, Resolution, Seat, Strain};
pub use hand::{Card, Deal, Hand, Rank, Suit};
pub use record::{LessonConfig, LessonRecord};
