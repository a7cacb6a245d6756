//! Missing-hand detection and filling
//!
//! Many lesson pages only ever show two hands, yet their auctions have
//! East or West bidding. Those deals need constructed hands before they
//! can become complete PBN boards:
//!
//! 1. [`find_missing_bids`] lists every bid made by a seat with no
//!    recorded cards, keyed by the bid sequence up to that point.
//! 2. [`DealerRunner`] hands those sequences to the external constraint
//!    dealer binary, whose template file carries one condition per
//!    supported sequence, and parses the candidate deals it prints.
//! 3. [`fill_missing_hands`] patches the lesson records, preferring
//!    generated hands from a constructed-hands CSV and otherwise dealing
//!    the leftover cards into two balanced hands.

use crate::auction::{tokenize_auction, Seat};
use crate::hand::{Card, Deal, Hand, Suit};
use crate::record::LessonRecord;
use anyhow::{bail, Context, Result};
use lazy_static::lazy_static;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

/// One bid made by a seat whose hand is missing from the scrape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingBidRow {
    #[serde(rename = "Subfolder")]
    pub subfolder: String,
    #[serde(rename = "Deal")]
    pub deal: String,
    #[serde(rename = "Seat")]
    pub seat: String,
    #[serde(rename = "Bid")]
    pub bid: String,
    #[serde(rename = "BidSequence")]
    pub bid_sequence: String,
    #[serde(rename = "NorthHand")]
    pub north_hand: String,
    #[serde(rename = "EastHand")]
    pub east_hand: String,
    #[serde(rename = "SouthHand")]
    pub south_hand: String,
    #[serde(rename = "WestHand")]
    pub west_hand: String,
}

/// Tokens that do not constrain a hand. "all" comes from "all pass".
fn is_non_pass(token: &str) -> bool {
    !matches!(
        token.trim().to_ascii_lowercase().as_str(),
        "" | "pass" | "p" | "all"
    )
}

/// Scan records for bids made by seats with empty hands.
///
/// A record whose East/West never bid but are both missing still gets one
/// "Calm" row: those deals need unconstrained hands dealt.
pub fn find_missing_bids(records: &[LessonRecord]) -> Vec<MissingBidRow> {
    let mut rows = Vec::new();
    for record in records {
        let dealer = record.dealer_seat().unwrap_or(Seat::North);
        let tokens = tokenize_auction(&record.auction);
        let first_non_pass = tokens.iter().position(|t| is_non_pass(t));

        let base = MissingBidRow {
            subfolder: record.subfolder.clone(),
            deal: record
                .deal_number
                .map(|n| n.to_string())
                .unwrap_or_default(),
            seat: String::new(),
            bid: String::new(),
            bid_sequence: String::new(),
            north_hand: record.north_hand.trim().to_string(),
            east_hand: record.east_hand.trim().to_string(),
            south_hand: record.south_hand.trim().to_string(),
            west_hand: record.west_hand.trim().to_string(),
        };

        let mut wrote_row = false;
        for (i, token) in tokens.iter().enumerate() {
            let seat = dealer.advance(i);
            if is_non_pass(token) && record.hand_field(seat).trim().is_empty() {
                let start = first_non_pass.unwrap_or(i);
                rows.push(MissingBidRow {
                    seat: seat.to_string(),
                    bid: token.clone(),
                    bid_sequence: tokens[start..=i].join("-"),
                    ..base.clone()
                });
                wrote_row = true;
            }
        }

        if !wrote_row && record.east_hand.trim().is_empty() {
            rows.push(MissingBidRow {
                seat: Seat::West.to_string(),
                bid: "Calm".to_string(),
                bid_sequence: "Calm".to_string(),
                ..base
            });
        }
    }
    rows
}

/// Read a missing-bids CSV written by [`write_missing_bids_csv`].
pub fn read_missing_bids_csv(path: &Path) -> Result<Vec<MissingBidRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut rows = Vec::new();
    for row in reader.deserialize() {
        rows.push(row.context("Failed to read missing-bids row")?);
    }
    Ok(rows)
}

/// Write the missing-bid rows in the legacy CSV layout.
pub fn write_missing_bids_csv(path: &Path, rows: &[MissingBidRow]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV {}", path.display()))?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// The dealer-script condition label for a bid sequence.
pub fn condition_label(bid_sequence: &str) -> String {
    if bid_sequence.is_empty() {
        "auction_calm".to_string()
    } else {
        format!("auction_{}", bid_sequence.replace('-', "_")).to_lowercase()
    }
}

/// Swap every east/west reference in a dealer template.
pub fn swap_east_west(content: &str) -> String {
    content
        .replace("east", "__swap__")
        .replace("west", "east")
        .replace("__swap__", "west")
}

/// Interface to the external constraint-dealer binary.
pub struct DealerRunner {
    dealer_path: PathBuf,
    /// Template file content, lowercased for label matching.
    templates: String,
}

impl DealerRunner {
    pub fn new(dealer_path: &Path, templates_path: &Path) -> Result<DealerRunner> {
        if !dealer_path.exists() {
            bail!("dealer binary not found at {}", dealer_path.display());
        }
        let templates = std::fs::read_to_string(templates_path)
            .with_context(|| {
                format!("Failed to read templates {}", templates_path.display())
            })?
            .to_lowercase();
        Ok(DealerRunner {
            dealer_path: dealer_path.to_path_buf(),
            templates,
        })
    }

    /// Whether the template file supports a condition label.
    pub fn supports(&self, label: &str) -> bool {
        self.templates.contains(label)
    }

    /// Generate candidate deals for one missing-bid row. Existing hands
    /// are pinned with `predeal` statements; the generated seats come
    /// back from the dealer's `printoneline` output.
    pub fn generate(&self, row: &MissingBidRow, candidates: usize) -> Result<Vec<Deal>> {
        let label = condition_label(&row.bid_sequence);
        let template = if row.seat.eq_ignore_ascii_case("East") {
            swap_east_west(&self.templates)
        } else {
            self.templates.clone()
        };

        let mut script = String::new();
        script.push_str(&format!("produce {}\n", candidates));
        script.push_str("generate 100000\n");
        script.push_str(&template);
        script.push('\n');
        for (seat, hand) in [
            (Seat::North, &row.north_hand),
            (Seat::South, &row.south_hand),
            (Seat::East, &row.east_hand),
            (Seat::West, &row.west_hand),
        ] {
            if !hand.trim().is_empty() {
                script.push_str(&format!(
                    "predeal {} {}\n",
                    seat.name().to_lowercase(),
                    colon_to_predeal(hand)
                ));
            }
        }
        script.push_str(&format!("condition {}\n", label));
        script.push_str("action printoneline\n");

        let mut file = tempfile::Builder::new()
            .suffix(".dlr")
            .tempfile()
            .context("Failed to create dealer script")?;
        file.write_all(script.as_bytes())?;

        let output = Command::new(&self.dealer_path)
            .arg(file.path())
            .output()
            .with_context(|| format!("Failed to run {}", self.dealer_path.display()))?;
        if !output.status.success() {
            bail!(
                "dealer failed for {}/{} ({}): {}",
                row.subfolder,
                row.deal,
                label,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let mut deals = Vec::new();
        for line in stdout.lines() {
            if let Some(mut deal) = parse_oneline(line) {
                // Keep the pinned hands exactly as recorded.
                for (seat, hand) in [
                    (Seat::North, &row.north_hand),
                    (Seat::South, &row.south_hand),
                    (Seat::East, &row.east_hand),
                    (Seat::West, &row.west_hand),
                ] {
                    if !hand.trim().is_empty() {
                        *deal.hand_mut(seat) = Hand::parse_colon(hand)?;
                    }
                }
                deals.push(deal);
            }
        }
        Ok(deals)
    }
}

/// Convert a colon-format hand to the dealer's predeal syntax:
/// `S:AK4 H:Q2` becomes `SAK4,HQ2`.
fn colon_to_predeal(hand: &str) -> String {
    hand.trim().replace(' ', ",").replace(':', "")
}

lazy_static! {
    /// `printoneline` output: `n AK2.Q54.T98.7632 e … s … w …`.
    static ref ONELINE: Regex = Regex::new(
        r"(?i)^n\s*(?P<north>\S+)\s+e\s*(?P<east>\S+)\s+s\s*(?P<south>\S+)\s+w\s*(?P<west>\S+)\s*$"
    )
    .unwrap();
}

/// Parse one `printoneline` row into a deal; non-deal output lines return
/// `None`.
pub fn parse_oneline(line: &str) -> Option<Deal> {
    let caps = ONELINE.captures(line.trim())?;
    let mut deal = Deal::default();
    for (seat, name) in [
        (Seat::North, "north"),
        (Seat::East, "east"),
        (Seat::South, "south"),
        (Seat::West, "west"),
    ] {
        *deal.hand_mut(seat) = Hand::parse_pbn(caps.name(name)?.as_str()).ok()?;
    }
    Some(deal)
}

/// A row of the constructed-hands CSV produced by the generation step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstructedRow {
    #[serde(rename = "Subfolder")]
    pub subfolder: String,
    #[serde(rename = "Deal")]
    pub deal: String,
    #[serde(rename = "NorthHand")]
    pub north_hand: String,
    #[serde(rename = "EastHand")]
    pub east_hand: String,
    #[serde(rename = "SouthHand")]
    pub south_hand: String,
    #[serde(rename = "WestHand")]
    pub west_hand: String,
    #[serde(rename = "label")]
    pub label: String,
}

/// Load constructed hands keyed by (subfolder, deal).
pub fn load_constructed_hands(path: &Path) -> Result<HashMap<(String, String), ConstructedRow>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let mut map = HashMap::new();
    for row in reader.deserialize() {
        let row: ConstructedRow = row.context("Failed to read constructed-hands row")?;
        map.insert((row.subfolder.clone(), row.deal.clone()), row);
    }
    Ok(map)
}

/// Totals from a fill pass.
#[derive(Debug, Default)]
pub struct FillStats {
    pub from_constructed: usize,
    pub generated: usize,
    pub mismatches: usize,
}

/// Fill in East/West hands for records missing both.
///
/// Constructed hands are used when their North/South match the record;
/// otherwise the 26 unused cards are dealt into two balanced hands.
pub fn fill_missing_hands<R: Rng>(
    records: &mut [LessonRecord],
    constructed: &HashMap<(String, String), ConstructedRow>,
    rng: &mut R,
) -> Result<FillStats> {
    let mut stats = FillStats::default();

    for record in records.iter_mut() {
        let east = Hand::parse_colon(&record.east_hand)?;
        let west = Hand::parse_colon(&record.west_hand)?;
        if !east.is_empty() || !west.is_empty() {
            continue;
        }

        let key = (
            record.subfolder.clone(),
            record
                .deal_number
                .map(|n| n.to_string())
                .unwrap_or_default(),
        );

        if let Some(row) = constructed.get(&key) {
            let north = Hand::parse_colon(&record.north_hand)?;
            let south = Hand::parse_colon(&record.south_hand)?;
            let c_north = Hand::parse_colon(&row.north_hand)?;
            let c_south = Hand::parse_colon(&row.south_hand)?;
            if c_north.card_set() != north.card_set() || c_south.card_set() != south.card_set() {
                log::error!(
                    "Hand mismatch for {}, Deal {}: constructed N/S differ from source",
                    key.0,
                    key.1
                );
                stats.mismatches += 1;
            } else {
                record.east_hand = row.east_hand.clone();
                record.west_hand = row.west_hand.clone();
                stats.from_constructed += 1;
            }
        } else {
            let mut deal = Deal::default();
            deal.north = Hand::parse_colon(&record.north_hand)?;
            deal.south = Hand::parse_colon(&record.south_hand)?;
            let unused = deal.unused_cards();
            if unused.len() != 26 {
                log::warn!(
                    "{} has unexpected used card count ({} unused)",
                    record.filename,
                    unused.len()
                );
            }
            let (east, west) = deal_unused_to_east_west(&unused, rng);
            record.east_hand = east.to_colon_string();
            record.west_hand = west.to_colon_string();
            stats.generated += 1;
        }
    }
    Ok(stats)
}

/// Deal leftover cards into two 13-card hands, keeping suit lengths
/// roughly even by alternating within each suit.
pub fn deal_unused_to_east_west<R: Rng>(unused: &[Card], rng: &mut R) -> (Hand, Hand) {
    let mut east: Vec<Card> = Vec::new();
    let mut west: Vec<Card> = Vec::new();

    for &suit in &Suit::ALL {
        let mut cards: Vec<Card> = unused.iter().filter(|c| c.suit == suit).copied().collect();
        cards.shuffle(rng);
        for card in cards {
            if east.len() < 13 && east.len() <= west.len() {
                east.push(card);
            } else {
                west.push(card);
            }
        }
    }

    while east.len() > 13 {
        if let Some(card) = east.pop() {
            west.push(card);
        }
    }
    while west.len() > 13 {
        if let Some(card) = west.pop() {
            east.push(card);
        }
    }

    (Hand::from_cards(east), Hand::from_cards(west))
}
