//! CSV → PBN conversion
//!
//! Turns the lesson CSV into one PBN file per lesson subfolder, with the
//! analysis rendered as per-board commentary. Tag layout and the `%`
//! header comments match what the downstream lesson player already
//! imports, down to the `[BCFlags "1f"]` marker.

use crate::auction::{tokenize_auction, Seat};
use crate::directives::{parse_steps, AnalysisStep, Directive};
use crate::hand::{Deal, Hand};
use crate::record::{LessonConfig, LessonRecord};
use anyhow::{Context, Result};
use chrono::Local;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};

pub const CREATOR_VERSION: &str = "1.01";

/// Settings for one conversion run.
pub struct PbnConfig {
    /// Root folder for the generated tree (legacy name: `pbns`).
    pub output_root: PathBuf,
    /// Optional header file content prepended to every PBN file.
    pub header: Option<String>,
    /// Name of the source CSV, recorded in a `%sourcefilename` comment.
    pub source_filename: String,
    pub lesson: LessonConfig,
}

/// Convert lesson records into PBN files, one per subfolder. Rows must
/// arrive grouped by subfolder (the scraper writes them sorted). Returns
/// the files written.
pub fn convert_records(records: &[LessonRecord], config: &PbnConfig) -> Result<Vec<PathBuf>> {
    let started = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let mut written = Vec::new();

    let mut current_subfolder: Option<&str> = None;
    let mut content: Vec<String> = Vec::new();
    let mut file_path = PathBuf::new();

    for record in records {
        let subfolder = record.subfolder.trim();
        if current_subfolder != Some(subfolder) {
            if current_subfolder.is_some() {
                write_pbn(&file_path, &content)?;
                written.push(file_path.clone());
            }
            content.clear();
            file_path = subfolder_to_path(&config.output_root, subfolder);
            current_subfolder = Some(subfolder);

            if let Some(header) = &config.header {
                // Blank lines here break the lesson player's import.
                content.push(header.trim().to_string());
            }
            content.push(format!("%Creator: CSVtoPBN Version {}", CREATOR_VERSION));
            content.push(format!("%Created: {}", started));
            content.push(format!("%sourcefilename {}", config.source_filename));
            content.push(format!("%HRTitleEvent {}", subfolder));
        }

        append_board(&mut content, record, config)?;
    }
    if current_subfolder.is_some() {
        write_pbn(&file_path, &content)?;
        written.push(file_path);
    }

    Ok(written)
}

/// `a/b` means directory `a`, file `b.pbn`.
fn subfolder_to_path(root: &Path, subfolder: &str) -> PathBuf {
    match subfolder.rsplit_once('/') {
        Some((dir, name)) => root.join(dir).join(format!("{}.pbn", name)),
        None => root.join(format!("{}.pbn", subfolder)),
    }
}

fn write_pbn(path: &Path, content: &[String]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content.join("\n") + "\n")
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn append_board(
    content: &mut Vec<String>,
    record: &LessonRecord,
    config: &PbnConfig,
) -> Result<()> {
    let board = record
        .deal_number
        .map(|n| n.to_string())
        .unwrap_or_default();
    let dealer = record.dealer_seat();
    let declarer = record.declarer_seat();
    let student = record.student_seat();

    let dealer_letter = dealer.map(|s| s.letter().to_string()).unwrap_or_default();
    let declarer_letter = declarer.map(|s| s.letter().to_string()).unwrap_or_default();

    content.push(format!("[Board \"{}\"]", board));
    content.push("[Event \"\"]".to_string());
    content.push(format!(
        "{{{} {} {}}}",
        config.lesson.title_prefix, record.subfolder, board
    ));
    content.push(format!("[Dealer \"{}\"]", dealer_letter));
    content.push(format!("[Declarer \"{}\"]", declarer_letter));
    content.push(format!("[Contract \"{}\"]", record.contract));
    content.push("[Vulnerable \"None\"]".to_string());
    if let Some(student) = student {
        content.push(format!("[Student \"{}\"]", student.letter()));
    }

    let mut deal = Deal::default();
    for seat in [Seat::North, Seat::East, Seat::South, Seat::West] {
        *deal.hand_mut(seat) = Hand::parse_colon(record.hand_field(seat))
            .with_context(|| format!("Bad {} hand in {}/{}", seat, record.subfolder, board))?;
    }
    content.push(deal.deal_tag(Seat::West));

    content.push(format!("[Auction \"{}\"]", dealer_letter));
    content.push(tokenize_auction(&record.auction).join(" "));
    content.push("[Result \"\"]".to_string());

    let commentary = render_commentary(&record.analysis, student, declarer);
    if !commentary.is_empty() {
        content.push(commentary);
    }
    content.push("[BCFlags \"1f\"]".to_string());

    if let (Some(declarer), lead) = (declarer, record.lead.trim()) {
        if !lead.is_empty() {
            content.push(format!("[Play \"{}\"]{}", declarer.lho().letter(), lead));
        }
    }
    content.push(String::new());
    Ok(())
}

/// Render the analysis cell as `{…}` commentary: initial visibility for
/// the student's seat, suit escapes, reveal injection, one blank line
/// between steps.
pub fn render_commentary(
    analysis: &str,
    student: Option<Seat>,
    declarer: Option<Seat>,
) -> String {
    let mut steps = parse_steps(analysis);
    if steps.is_empty() {
        return String::new();
    }

    inject_visibility(&mut steps, student, declarer);
    inject_final_reveal(&mut steps);

    let rendered: Vec<String> = steps.iter().map(render_step).collect();
    format!("{{{}}}", rendered.join("\n\n"))
}

/// Initial visibility per student seat: defenders see their own hand with
/// the table rotated to put them at the bottom; the declaring student
/// sees both partnership hands. Play-instruction lessons (those that
/// advance step by step) also hide the auction and show the lead once the
/// first advance happens.
fn inject_visibility(steps: &mut Vec<AnalysisStep>, student: Option<Seat>, _declarer: Option<Seat>) {
    let Some(student) = student else { return };

    let mut lead_in = Vec::new();
    match student {
        Seat::South => {
            lead_in.push(Directive::ShowHands(vec![Seat::North, Seat::South]));
        }
        seat => {
            lead_in.push(Directive::ShowHands(vec![seat]));
            lead_in.push(Directive::Rotate(Some(seat)));
        }
    }
    if let Some(first) = steps.first_mut() {
        first.directives.splice(0..0, lead_in);
    }

    // Play-instruction mode: the auction shows through the first step,
    // then disappears when the student clicks on.
    if student == Seat::South {
        let first_advance = steps
            .iter()
            .position(|s| s.directives.contains(&Directive::Advance));
        if let Some(idx) = first_advance {
            if idx + 1 < steps.len() {
                steps[idx + 1]
                    .directives
                    .splice(0..0, [Directive::AuctionOff, Directive::ShowLead]);
            } else {
                steps.push(AnalysisStep {
                    directives: vec![Directive::AuctionOff, Directive::ShowLead],
                    text: String::new(),
                });
            }
        }
    }
}

lazy_static! {
    /// Phrasings that precede the full-deal reveal.
    static ref REVEAL: Regex =
        Regex::new(r"(?i)Click.*?NEXT.*?to see (the complete deal|the hands|all)").unwrap();
}

/// Add a `[show NESW]` ahead of the step whose prose announces the
/// complete deal.
fn inject_final_reveal(steps: &mut [AnalysisStep]) {
    let all = Directive::ShowHands(vec![Seat::North, Seat::East, Seat::South, Seat::West]);
    for step in steps.iter_mut() {
        if REVEAL.is_match(&step.text) {
            if !step.directives.contains(&all) {
                step.directives.push(all);
            }
            break;
        }
    }
}

fn render_step(step: &AnalysisStep) -> String {
    let mut lines: Vec<String> = step.directives.iter().map(|d| d.to_string()).collect();
    if !step.text.is_empty() {
        lines.push(repair_spacing(&escape_suit_refs(&step.text)));
    }
    lines.join("\n")
}

/// Convert `!S`-style suit references to the commentary escape `\S`, but
/// only where a rank, space, punctuation, plural `s`, or end-of-text
/// follows; `that!South` keeps its exclamation mark.
fn escape_suit_refs(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '!'
            && i + 1 < chars.len()
            && matches!(chars[i + 1], 'S' | 'H' | 'D' | 'C')
        {
            let boundary = match chars.get(i + 2) {
                None => true,
                Some(&c) => {
                    c.is_whitespace() || "AKQJTakqjt98765432s.,;:!?)]-".contains(c)
                }
            };
            if boundary {
                out.push('\\');
                out.push(chars[i + 1]);
                i += 2;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

lazy_static! {
    /// `that!South` lost a space when the HTML collapsed; restore it.
    static ref BANG_CAPITAL: Regex = Regex::new(r"!([A-Z])").unwrap();
}

fn repair_spacing(text: &str) -> String {
    BANG_CAPITAL.replace_all(text, "! $1").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LessonConfig;

    fn sample_record() -> LessonRecord {
        LessonRecord {
            subfolder: "NMF".to_string(),
            filename: "deal01.html".to_string(),
            deal_number: Some(1),
            kind: "Bidding".to_string(),
            north_hand: "S:AK4 H:QJ2 D:T98 C:A765".to_string(),
            east_hand: "S:T9 H:A87 D:654 C:KQJT9".to_string(),
            south_hand: "S:QJ865 H:K93 D:AK C:832".to_string(),
            west_hand: "S:732 H:T654 D:QJ732 C:4".to_string(),
            dealer: "North".to_string(),
            student: "South".to_string(),
            auction: "1NT pass 2C pass | 2D pass 3NT pass | pass pass".to_string(),
            contract: "3NT".to_string(),
            declarer: "North".to_string(),
            lead: "S4".to_string(),
            analysis: "With 15-17 balanced, open 1NT.".to_string(),
            ..Default::default()
        }
    }

    fn sample_config(dir: &Path) -> PbnConfig {
        PbnConfig {
            output_root: dir.to_path_buf(),
            header: None,
            source_filename: "lessons.csv".to_string(),
            lesson: LessonConfig::site_defaults("Baker"),
        }
    }

    #[test]
    fn test_convert_single_record() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let written = convert_records(&[sample_record()], &config).unwrap();
        assert_eq!(written.len(), 1);
        assert!(written[0].ends_with("NMF.pbn"));

        let text = std::fs::read_to_string(&written[0]).unwrap();
        assert!(text.contains("%Creator: CSVtoPBN Version 1.01"));
        assert!(text.contains("%HRTitleEvent NMF"));
        assert!(text.contains("[Board \"1\"]"));
        assert!(text.contains("{Baker NMF 1}"));
        assert!(text.contains("[Dealer \"N\"]"));
        assert!(text.contains("[Contract \"3NT\"]"));
        assert!(text.contains(
            "[Deal \"W:732.T654.QJ732.4 AK4.QJ2.T98.A765 T9.A87.654.KQJT9 QJ865.K93.AK.832\"]"
        ));
        assert!(text.contains("[Auction \"N\"]"));
        // Row separators removed, whitespace compressed.
        assert!(text.contains("1NT pass 2C pass 2D pass 3NT pass pass pass"));
        // Student South gets the partnership view injected.
        assert!(text.contains("{[show NS]\nWith 15-17 balanced, open 1NT.}"));
        assert!(text.contains("[BCFlags \"1f\"]"));
        // Opening lead comes from declarer's LHO: North declares, East leads.
        assert!(text.contains("[Play \"E\"]S4"));
    }

    #[test]
    fn test_subfolder_slash_nests_directories() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let mut record = sample_record();
        record.subfolder = "Bidpractice/Set1".to_string();
        let written = convert_records(&[record], &config).unwrap();
        assert!(written[0].ends_with("Bidpractice/Set1.pbn"));
    }

    #[test]
    fn test_new_file_per_subfolder() {
        let dir = tempfile::tempdir().unwrap();
        let config = sample_config(dir.path());
        let mut second = sample_record();
        second.subfolder = "Stayman".to_string();
        let written = convert_records(&[sample_record(), second], &config).unwrap();
        assert_eq!(written.len(), 2);
    }

    #[test]
    fn test_defender_visibility_and_rotation() {
        let commentary = render_commentary(
            "Lead fourth best against notrump.",
            Some(Seat::West),
            Some(Seat::South),
        );
        assert_eq!(
            commentary,
            "{[show W]\n[rotate W]\nLead fourth best against notrump.}"
        );
    }

    #[test]
    fn test_play_instruction_hides_auction_after_first_advance() {
        let analysis = "[NEXT]\\nCount your winners.\\n[NEXT]\\nKnock out the ace.";
        let commentary = render_commentary(analysis, Some(Seat::South), Some(Seat::South));
        // The auction disappears on the step after the first advance.
        let idx_next = commentary.find("[NEXT]").unwrap();
        let idx_off = commentary.find("[AUCTION off]").unwrap();
        assert!(idx_off > idx_next);
        assert!(commentary.contains("[SHOW_LEAD]"));
        // Steps are separated by blank lines.
        assert!(commentary.contains("Count your winners.\n\n"));
    }

    #[test]
    fn test_final_reveal_injection() {
        let analysis = "Plan the play.\\nClick NEXT to see the complete deal.";
        let commentary = render_commentary(analysis, Some(Seat::South), None);
        assert!(commentary.contains("[show NESW]\nClick NEXT to see the complete deal."));
    }

    #[test]
    fn test_suit_escapes() {
        assert_eq!(escape_suit_refs("bid 2!C now"), "bid 2\\C now");
        assert_eq!(escape_suit_refs("the !SQ is onside"), "the \\SQ is onside");
        assert_eq!(escape_suit_refs("good !Hs"), "good \\Hs");
        // Not a suit reference: the exclamation belongs to the prose.
        assert_eq!(escape_suit_refs("that!South"), "that!South");
        assert_eq!(repair_spacing("that!South"), "that! South");
        // End of text counts as a boundary.
        assert_eq!(escape_suit_refs("lead a !D"), "lead a \\D");
    }
}
