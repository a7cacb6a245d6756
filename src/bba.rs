//! Comparison against the external bidding analyzer
//!
//! The analyzer itself runs elsewhere; it consumes a PBN file and writes a
//! rebid copy. This module reads both files, normalizes the two auctions,
//! and reports the boards where the analyzer disagrees with the lesson's
//! recorded auction.

use anyhow::{Context, Result};
use chrono::Local;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::fmt::Write as FmtWrite;
use std::path::Path;

/// A deal block read from a PBN file: just the tags and auction this
/// toolchain needs, plus the raw block for pass-through writing.
#[derive(Debug, Clone, Default)]
pub struct PbnGame {
    pub board: String,
    pub dealer: String,
    pub vulnerability: String,
    pub deal: String,
    pub auction: Vec<String>,
    pub raw_block: String,
}

lazy_static! {
    static ref TAG: Regex = Regex::new(r#"\[(\w+)\s+"([^"]*)"\]"#).unwrap();
    /// Note markers (`=1=`) and alert markers (`$17`) inside auctions.
    static ref AUCTION_MARKUP: Regex = Regex::new(r"=\d+=|\$\d+").unwrap();
}

/// Parse a PBN file into its `%` header and deal blocks.
///
/// This reader is deliberately minimal: tag lines anywhere in a block,
/// auction bids on the lines after `[Auction "…"]` until the next tag or
/// comment. That is all the analyzer output contains.
pub fn parse_pbn_file(content: &str) -> (String, Vec<PbnGame>) {
    let mut header_lines = Vec::new();
    let mut body_start = 0;
    for (i, line) in content.lines().enumerate() {
        if line.starts_with('%') || line.trim().is_empty() {
            header_lines.push(line);
        } else {
            body_start = i;
            break;
        }
    }
    let body: Vec<&str> = content.lines().skip(body_start).collect();

    let mut games = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in body.iter().copied() {
        if line.starts_with("[Board ") && !current.is_empty() {
            if let Some(game) = parse_block(&current) {
                games.push(game);
            }
            current.clear();
        }
        current.push(line);
    }
    if let Some(game) = parse_block(&current) {
        games.push(game);
    }

    (header_lines.join("\n"), games)
}

/// Read and parse a PBN file from disk.
pub fn read_pbn_file(path: &Path) -> Result<(String, Vec<PbnGame>)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read PBN file {}", path.display()))?;
    Ok(parse_pbn_file(&content))
}

fn parse_block(lines: &[&str]) -> Option<PbnGame> {
    let block = lines.join("\n");
    let mut tags: HashMap<String, String> = HashMap::new();
    for caps in TAG.captures_iter(&block) {
        tags.insert(caps[1].to_string(), caps[2].to_string());
    }
    if !tags.contains_key("Board") || !tags.contains_key("Deal") {
        return None;
    }

    // Bids sit on the lines after the [Auction] tag, up to the next tag
    // or commentary brace.
    let mut auction = Vec::new();
    let mut in_auction = false;
    for line in lines {
        let trimmed = line.trim();
        if trimmed.starts_with("[Auction ") {
            in_auction = true;
            continue;
        }
        if in_auction {
            if trimmed.starts_with('[') || trimmed.starts_with('{') {
                break;
            }
            let cleaned = AUCTION_MARKUP.replace_all(trimmed, "");
            auction.extend(cleaned.split_whitespace().map(str::to_string));
        }
    }

    Some(PbnGame {
        board: tags.get("Board").cloned().unwrap_or_default(),
        dealer: tags.get("Dealer").cloned().unwrap_or_default(),
        vulnerability: tags.get("Vulnerable").cloned().unwrap_or_default(),
        deal: tags.get("Deal").cloned().unwrap_or_default(),
        auction,
        raw_block: block,
    })
}

/// Normalize bid spellings for comparison: the analyzer writes `1N` and
/// `P` where the lessons write `1NT` and `pass`.
pub fn normalize_auction<S: AsRef<str>>(bids: &[S]) -> Vec<String> {
    let mut result = Vec::new();
    for bid in bids {
        let bid = bid.as_ref().trim().to_ascii_uppercase();
        if bid.is_empty() {
            continue;
        }
        let normalized = match bid.as_str() {
            "PASS" | "P" | "--" | "AP" => "PASS".to_string(),
            "X" | "DBL" | "DOUBLE" | "DB" => "X".to_string(),
            "XX" | "RDBL" | "REDOUBLE" | "RD" => "XX".to_string(),
            other => {
                let bytes = other.as_bytes();
                if other.len() == 2 && bytes[0].is_ascii_digit() && bytes[1] == b'N' {
                    format!("{}NT", &other[..1])
                } else {
                    other.to_string()
                }
            }
        };
        result.push(normalized);
    }
    result
}

/// Outcome of comparing one board's auctions.
#[derive(Debug, Clone)]
pub struct AuctionDiff {
    pub board: String,
    pub reference: Vec<String>,
    pub analyzer: Vec<String>,
    pub matches: bool,
    /// Index of the first differing bid (after normalization), when the
    /// auctions differ.
    pub first_divergence: Option<usize>,
    /// Board present in only one file.
    pub error: Option<String>,
}

/// Compare reference auctions against the analyzer's, board by board.
pub fn compare_auctions(reference: &[PbnGame], analyzer: &[PbnGame]) -> Vec<AuctionDiff> {
    let by_board: HashMap<&str, &PbnGame> =
        analyzer.iter().map(|g| (g.board.as_str(), g)).collect();

    let mut results = Vec::new();
    for game in reference {
        let Some(rebid) = by_board.get(game.board.as_str()) else {
            results.push(AuctionDiff {
                board: game.board.clone(),
                reference: game.auction.clone(),
                analyzer: Vec::new(),
                matches: false,
                first_divergence: None,
                error: Some("Board not found in analyzer output".to_string()),
            });
            continue;
        };

        let ref_norm = normalize_auction(&game.auction);
        let bba_norm = normalize_auction(&rebid.auction);
        let matches = ref_norm == bba_norm;
        let first_divergence = if matches {
            None
        } else {
            Some(
                ref_norm
                    .iter()
                    .zip(bba_norm.iter())
                    .position(|(a, b)| a != b)
                    .unwrap_or_else(|| ref_norm.len().min(bba_norm.len())),
            )
        };

        results.push(AuctionDiff {
            board: game.board.clone(),
            reference: game.auction.clone(),
            analyzer: rebid.auction.clone(),
            matches,
            first_divergence,
            error: None,
        });
    }
    results
}

/// Display form used in diff reports; four passes print as `PassOut`.
pub fn format_auction(bids: &[String]) -> String {
    if bids.is_empty() {
        return "(none)".to_string();
    }
    let normalized = normalize_auction(bids);
    if normalized.len() == 4 && normalized.iter().all(|b| b == "PASS") {
        return "PassOut".to_string();
    }
    bids.join(" ")
}

/// Render the differences report. Returns `None` when every board
/// matches, in which case no file should be written.
pub fn render_diff_report(scenario: &str, results: &[AuctionDiff]) -> Option<String> {
    let mismatches: Vec<&AuctionDiff> = results
        .iter()
        .filter(|r| !r.matches && r.error.is_none())
        .collect();
    let errors: Vec<&AuctionDiff> = results.iter().filter(|r| r.error.is_some()).collect();
    if mismatches.is_empty() && errors.is_empty() {
        return None;
    }

    let total = results.len();
    let matched = results.iter().filter(|r| r.matches).count();

    let mut out = String::new();
    let _ = writeln!(out, "Analyzer auction differences: {}", scenario);
    let _ = writeln!(out, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "{}", "=".repeat(80));
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Summary: {}/{} matches ({:.1}%)",
        matched,
        total,
        100.0 * matched as f64 / total.max(1) as f64
    );
    let _ = writeln!(out, "Mismatches: {}", mismatches.len());
    let _ = writeln!(out, "Errors: {}", errors.len());
    let _ = writeln!(out);

    if !mismatches.is_empty() {
        let _ = writeln!(out, "{}", "-".repeat(80));
        let _ = writeln!(out, "AUCTION DIFFERENCES");
        let _ = writeln!(out, "{}", "-".repeat(80));
        let _ = writeln!(out);
        for diff in &mismatches {
            let _ = writeln!(out, "Board {}:", diff.board);
            let _ = writeln!(out, "  Original: {}", format_auction(&diff.reference));
            let _ = writeln!(out, "  Analyzer: {}", format_auction(&diff.analyzer));
            if let Some(idx) = diff.first_divergence {
                let _ = writeln!(out, "  First difference at bid {}", idx + 1);
            }
            let _ = writeln!(out);
        }
    }

    if !errors.is_empty() {
        let _ = writeln!(out, "{}", "-".repeat(80));
        let _ = writeln!(out, "ERRORS");
        let _ = writeln!(out, "{}", "-".repeat(80));
        let _ = writeln!(out);
        for diff in &errors {
            let _ = writeln!(
                out,
                "Board {}: {}",
                diff.board,
                diff.error.as_deref().unwrap_or("")
            );
        }
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
% PBN 2.1
%Creator: test

[Board \"1\"]
[Dealer \"N\"]
[Vulnerable \"None\"]
[Deal \"N:AK4.QJ2.T98.A765 T9.A87.654.KQJT9 QJ865.K93.AK.832 732.T654.QJ732.4\"]
[Auction \"N\"]
1NT pass 3NT pass
pass pass

[Board \"2\"]
[Dealer \"E\"]
[Vulnerable \"None\"]
[Deal \"E:AK4.QJ2.T98.A765 T9.A87.654.KQJT9 QJ865.K93.AK.832 732.T654.QJ732.4\"]
[Auction \"E\"]
1S =1= 2S $14 pass pass
pass
";

    #[test]
    fn test_parse_pbn_file() {
        let (header, games) = parse_pbn_file(SAMPLE);
        assert!(header.contains("%Creator: test"));
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].board, "1");
        assert_eq!(games[0].dealer, "N");
        assert_eq!(
            games[0].auction,
            vec!["1NT", "pass", "3NT", "pass", "pass", "pass"]
        );
        // Note and alert markers are stripped.
        assert_eq!(games[1].auction, vec!["1S", "2S", "pass", "pass", "pass"]);
    }

    #[test]
    fn test_normalize_auction() {
        assert_eq!(
            normalize_auction(&["p", "AP", "--", "dbl", "RDBL", "1n", "2NT"]),
            vec!["PASS", "PASS", "PASS", "X", "XX", "1NT", "2NT"]
        );
    }

    #[test]
    fn test_compare_auctions() {
        let reference = vec![PbnGame {
            board: "1".to_string(),
            auction: vec!["1NT".into(), "pass".into(), "3NT".into(), "pass".into(),
                          "pass".into(), "pass".into()],
            ..Default::default()
        }];
        // Same auction in analyzer spelling.
        let analyzer = vec![PbnGame {
            board: "1".to_string(),
            auction: vec!["1N".into(), "P".into(), "3N".into(), "P".into(),
                          "P".into(), "P".into()],
            ..Default::default()
        }];
        let results = compare_auctions(&reference, &analyzer);
        assert!(results[0].matches);
        assert!(render_diff_report("test", &results).is_none());
    }

    #[test]
    fn test_divergence_index_and_report() {
        let reference = vec![PbnGame {
            board: "3".to_string(),
            auction: vec!["1S".into(), "pass".into(), "2S".into(), "pass".into(),
                          "pass".into(), "pass".into()],
            ..Default::default()
        }];
        let analyzer = vec![PbnGame {
            board: "3".to_string(),
            auction: vec!["1S".into(), "pass".into(), "3S".into(), "pass".into(),
                          "pass".into(), "pass".into()],
            ..Default::default()
        }];
        let results = compare_auctions(&reference, &analyzer);
        assert!(!results[0].matches);
        assert_eq!(results[0].first_divergence, Some(2));

        let report = render_diff_report("NMF", &results).unwrap();
        assert!(report.contains("Board 3:"));
        assert!(report.contains("Original: 1S pass 2S pass pass pass"));
        assert!(report.contains("First difference at bid 3"));
    }

    #[test]
    fn test_missing_board_is_an_error() {
        let reference = vec![PbnGame {
            board: "9".to_string(),
            ..Default::default()
        }];
        let results = compare_auctions(&reference, &[]);
        assert!(results[0].error.is_some());
        let report = render_diff_report("x", &results).unwrap();
        assert!(report.contains("ERRORS"));
    }

    #[test]
    fn test_format_pass_out() {
        let bids: Vec<String> = vec!["pass".into(); 4];
        assert_eq!(format_auction(&bids), "PassOut");
        assert_eq!(format_auction(&[]), "(none)");
    }
}
