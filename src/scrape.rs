//! Lesson page scraping
//!
//! The source site is a mirrored mid-2000s static website. Every deal
//! page encodes its data in presentation markup: hands sit in `<td>`s
//! recognizable only by their width/height styling, the auction is the
//! last table with WEST/NORTH header cells, and the step-by-step analysis
//! hides behind numbered anchors with earlier steps greyed out in
//! `<font>` tags. The extractors here are deliberately literal ports of
//! those accumulated quirks; where markup defies the DOM (grey text,
//! mid-cell markup) they fall back to regex surgery on the raw HTML,
//! which is how the site was built in the first place.

use crate::auction::{resolve_auction, Bid, Resolution, Seat};
use crate::directives::{render_steps, AnalysisStep, Directive};
use crate::hand::{Card, Hand};
use crate::record::{LessonConfig, LessonRecord};
use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;
use rayon::prelude::*;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

const SEATS: [Seat; 4] = [Seat::North, Seat::East, Seat::South, Seat::West];

/// Hands with at least this many cards are "fully visible"; smaller ones
/// are just the played cards still on display.
const MIN_FULL_HAND: usize = 5;

lazy_static! {
    static ref TD: Selector = Selector::parse("td").unwrap();
    static ref TR: Selector = Selector::parse("tr").unwrap();
    static ref TABLE: Selector = Selector::parse("table").unwrap();
    static ref IMG: Selector = Selector::parse("img").unwrap();
    static ref ANCHOR: Selector = Selector::parse("a").unwrap();
    static ref BIDDING_DIV: Selector = Selector::parse("div.bidding").unwrap();
    static ref BIDHANDS_DIV: Selector = Selector::parse("div.bidhands").unwrap();
}

// ============================================================================
// Text normalization
// ============================================================================

/// Replace suit symbols with `S:`-style prefixes and pack the holding:
/// `♠ Q J 8 6 5 ♥ K 9 2` becomes `S:QJ865 H:K92`. Tens become `T`, the
/// `--` void marker disappears.
fn hand_text_to_colon(text: &str) -> String {
    let packed: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let replaced = packed
        .replace('♠', "S:")
        .replace('♥', " H:")
        .replace('♦', " D:")
        .replace('♣', " C:")
        .replace("10", "T")
        .replace("--", "")
        .replace('-', "");
    replaced.trim().to_string()
}

/// Replace suit symbols with the `!S` escape used inside analysis prose.
fn prose_suits(text: &str) -> String {
    text.replace('♠', "!S")
        .replace('♥', "!H")
        .replace('♦', "!D")
        .replace('♣', "!C")
        .replace("10", "T")
        .replace("--", "")
}

/// Normalize an auction cell into a plain token: `1♠` → `1S`.
fn bid_token(text: &str) -> String {
    text.trim()
        .replace('♠', "S")
        .replace('♥', "H")
        .replace('♦', "D")
        .replace('♣', "C")
}

/// A scraped hand string spans multiple lines on the page; clean each
/// line and join.
fn parse_hand_text(text: &str) -> String {
    let parts: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(hand_text_to_colon)
        .collect();
    parts.join(" ").replace("  ", " ").trim().to_string()
}

/// A hand cell must hold actual card values; empty placeholders carry
/// suit symbols only.
fn has_card_values(text: &str) -> bool {
    text.chars().any(|c| "AKQJT98765432".contains(c))
}

/// Drop the three-line HTTrack mirror banner so it cannot confuse the
/// parser.
pub fn strip_httrack_banner(html: &str) -> String {
    let lines: Vec<&str> = html.lines().collect();
    let mut kept: Vec<&str> = Vec::with_capacity(lines.len());
    let mut i = 0;
    while i < lines.len() {
        if i + 2 < lines.len()
            && lines[i].trim().is_empty()
            && lines[i + 1].trim_start().starts_with("<!-- Mirrored from")
            && lines[i + 2].trim_start().starts_with("<!-- Added by HTTrack")
        {
            i += 3;
            continue;
        }
        kept.push(lines[i]);
        i += 1;
    }
    kept.join("\n")
}

// ============================================================================
// Hand extraction
// ============================================================================

fn element_text(el: ElementRef) -> String {
    el.text().collect::<String>()
}

/// Text content with one line per text node, the shape the line-oriented
/// extractors below expect regardless of how the source was wrapped.
fn text_lines(el: ElementRef) -> String {
    el.text().collect::<Vec<_>>().join("\n")
}

fn is_north_cell(td: ElementRef) -> bool {
    let style = td.value().attr("style").unwrap_or("");
    ["width:6em", "width:7em", "width:8em"]
        .iter()
        .any(|w| style.contains(w))
}

fn is_south_cell(td: ElementRef) -> bool {
    td.value().attr("height").unwrap_or("").contains("800px")
}

fn has_spacer_image(td: ElementRef) -> bool {
    td.select(&IMG)
        .any(|img| img.value().attr("src") == Some("../t1.gif"))
}

/// Whole-page hand extraction for the standard deal layout. Several
/// copies of a hand may appear (pages that replay the cards show the
/// hand shrinking); the longest parse wins.
fn extract_hands_loose(doc: &Html) -> HashMap<Seat, String> {
    let mut hands: HashMap<Seat, String> = HashMap::new();
    let mut keep_longest = |seat: Seat, candidate: String| {
        if candidate.is_empty() {
            return;
        }
        let better = hands
            .get(&seat)
            .map(|h| h.len() < candidate.len())
            .unwrap_or(true);
        if better {
            hands.insert(seat, candidate);
        }
    };

    for td in doc.select(&TD) {
        let text = element_text(td);
        if !text.contains('♠') {
            continue;
        }
        if is_north_cell(td) {
            keep_longest(Seat::North, parse_hand_text(&text));
        }
        if is_south_cell(td) {
            keep_longest(Seat::South, parse_hand_text(&text));
        }
    }

    for tr in doc.select(&TR) {
        let tds: Vec<ElementRef> = tr.select(&TD).collect();
        if tds.len() >= 3 && has_spacer_image(tds[1]) {
            let west_text = element_text(tds[0]);
            let east_text = element_text(tds[2]);
            if west_text.contains('♠') {
                keep_longest(Seat::West, parse_hand_text(&west_text));
            }
            if east_text.contains('♠') {
                keep_longest(Seat::East, parse_hand_text(&east_text));
            }
        }
    }

    // Bid-practice pages list the two hands under NORTH/SOUTH headings.
    if let Some(div) = doc.select(&BIDHANDS_DIV).next() {
        let mut current: Option<Seat> = None;
        let mut collected: HashMap<Seat, Vec<String>> = HashMap::new();
        for line in text_lines(div).lines() {
            let line = line.trim();
            if line.contains("NORTH") {
                current = Some(Seat::North);
            } else if line.contains("SOUTH") {
                current = Some(Seat::South);
            } else if let Some(seat) = current {
                if line.chars().any(|c| "♠♥♦♣AKQJ0123456789".contains(c)) {
                    collected.entry(seat).or_default().push(line.to_string());
                }
            }
        }
        for (seat, lines) in collected {
            hands.insert(seat, parse_hand_text(&lines.join(" ")));
        }
    }

    hands
}

/// Per-section hand extraction: requires all four suit symbols plus card
/// values, so empty placeholders are skipped.
fn extract_hands_from_table(table: ElementRef) -> HashMap<Seat, String> {
    let mut hands = HashMap::new();
    let full_suits =
        |t: &str| t.contains('♠') && t.contains('♥') && t.contains('♦') && t.contains('♣');

    for td in table.select(&TD) {
        let text = element_text(td);
        if is_north_cell(td)
            && full_suits(&text)
            && has_card_values(&text)
            && !hands.contains_key(&Seat::North)
        {
            hands.insert(Seat::North, parse_hand_text(&text));
        }
        if is_south_cell(td)
            && full_suits(&text)
            && has_card_values(&text)
            && !hands.contains_key(&Seat::South)
        {
            hands.insert(Seat::South, parse_hand_text(&text));
        }
    }

    for tr in table.select(&TR) {
        let tds: Vec<ElementRef> = tr.select(&TD).collect();
        if tds.len() >= 3 && has_spacer_image(tds[1]) {
            let west_text = element_text(tds[0]);
            let east_text = element_text(tds[2]);
            if full_suits(&west_text) && has_card_values(&west_text) {
                hands.insert(Seat::West, parse_hand_text(&west_text));
            }
            if full_suits(&east_text) && has_card_values(&east_text) {
                hands.insert(Seat::East, parse_hand_text(&east_text));
            }
        }
    }

    hands
}

// ============================================================================
// Auction extraction
// ============================================================================

/// The final auction lives in the last table carrying both WEST and
/// NORTH header cells.
fn final_auction_table(doc: &Html) -> Option<ElementRef<'_>> {
    doc.select(&TABLE)
        .filter(|table| {
            let mut has_west = false;
            let mut has_north = false;
            for td in table.select(&TD) {
                let text = element_text(td);
                has_west |= text.contains("WEST");
                has_north |= text.contains("NORTH");
            }
            has_west && has_north
        })
        .last()
}

/// Flatten an auction container (the table, or a step `<td>` wrapping
/// one) into rows of normalized tokens. The header row is skipped.
fn auction_rows(container: ElementRef) -> Vec<Vec<String>> {
    container
        .select(&TR)
        .skip(1)
        .map(|tr| tr.select(&TD).map(|td| bid_token(&element_text(td))).collect())
        .collect()
}

/// Auction data scraped from a table: the flat cell list for the
/// resolver and the `|`-separated display string for the CSV.
struct ScrapedAuction {
    tokens: Vec<String>,
    display: String,
}

fn scrape_auction(container: ElementRef) -> ScrapedAuction {
    let rows = auction_rows(container);
    let tokens: Vec<String> = rows.iter().flatten().cloned().collect();
    let display_rows: Vec<String> = rows
        .iter()
        .map(|row| {
            row.iter()
                .filter(|t| !t.trim().is_empty())
                .map(|t| display_token(t))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|r| !r.is_empty())
        .collect();
    ScrapedAuction {
        tokens,
        display: display_rows.join(" | "),
    }
}

/// CSV spelling of a bid token: doubles become X/XX.
fn display_token(token: &str) -> String {
    if token.eq_ignore_ascii_case("double") {
        "X".to_string()
    } else if token.eq_ignore_ascii_case("redouble") {
        "XX".to_string()
    } else {
        token.to_string()
    }
}

// ============================================================================
// Analysis extraction
// ============================================================================

lazy_static! {
    /// Grey text marks prior steps repeated on the page.
    static ref FONT_BLOCK: Regex = Regex::new(r"(?s)<font[^>]*?>.*?</font>").unwrap();
    static ref TABLE_BLOCK: Regex = Regex::new(r"(?s)<table[^>]*>.*?</table>").unwrap();
    static ref TD_CONTENT: Regex = Regex::new(r"(?s)<td[^>]*>(.*?)</td>").unwrap();
    static ref DOUBLE_BREAK: Regex = Regex::new(r"(?s)<br\s*/?>\s*<br\s*/?>").unwrap();
    static ref SINGLE_BREAK: Regex = Regex::new(r"<br\s*/?>").unwrap();
    static ref SPAN_TAG: Regex = Regex::new(r"(?s)</?span.*?>").unwrap();
    static ref LINK_BLOCK: Regex = Regex::new(r"(?s)<a.*?>.*?</a>").unwrap();
    static ref AFTER_PERIOD: Regex = Regex::new(r"\.([A-Za-z])").unwrap();
    static ref AFTER_QUESTION: Regex = Regex::new(r"\?([A-Za-z])").unwrap();
}

/// Pull the analysis prose out of a step cell's raw HTML: grey passages
/// and the nested auction table go first, then the cell contents.
fn extract_analysis_text(td_html: &str) -> String {
    let without_grey = FONT_BLOCK.replace_all(td_html, "");
    let without_tables = TABLE_BLOCK.replace_all(&without_grey, "");
    TD_CONTENT
        .captures(&without_tables)
        .map(|caps| caps[1].trim().to_string())
        .unwrap_or_default()
}

/// Clean one step's prose and decide its directive from the page
/// structure: a rotation marker wins, then a NEXT button, and a step
/// that stays on the page announces its bid.
fn clean_up_analysis(raw: &str, td_html: &str, last_bid: Option<&Bid>) -> AnalysisStep {
    let mut text = raw.replace('\t', "");
    text = text.replace("\u{a0}.", ".").replace('\u{a0}', " ");
    text = text.replace("\n  ", "").replace("\n ", "").replace('\n', "");
    text = DOUBLE_BREAK.replace_all(&text, "\\n").into_owned();
    text = SINGLE_BREAK.replace_all(&text, "").into_owned();
    text = prose_suits(&text);
    // Undo the ten conversion where the prose talks about point counts.
    text = text.replace("T point", "10 point");
    text = FONT_BLOCK.replace_all(&text, "").into_owned();
    text = text.replace("</font>", "");
    text = SPAN_TAG.replace_all(&text, "").into_owned();
    text = LINK_BLOCK.replace_all(&text, "").into_owned();
    text = text.replace("<b>", "").replace("</b>", "");
    text = AFTER_PERIOD.replace_all(&text, ". $1").into_owned();
    text = AFTER_QUESTION.replace_all(&text, "? $1").into_owned();
    let mut text = text.trim().to_string();
    while text.ends_with("\\n") {
        text.truncate(text.len() - 2);
    }

    let mut directives = Vec::new();
    if text.to_lowercase().contains("rotate") {
        directives.push(Directive::Rotate(None));
        text = text.replace("lickto", "lick NEXT to");
        text = text.replace("lick.", "lick NEXT.");
    } else if td_html.contains("NEXT") {
        directives.push(Directive::Advance);
        text = text.replace("lickto", "lick NEXT to");
        text = text.replace("lick.", "lick NEXT.");
    } else if td_html.contains("ROTATE") {
        directives.push(Directive::Rotate(None));
        text = text.replace("lickto", "lick ROTATE to");
        text = text.replace("lick.", "lick ROTATE.");
    } else if !td_html.contains("href=\"deal") {
        if let Some(bid) = last_bid {
            directives.push(Directive::AnnounceBid(*bid));
        }
    }

    AnalysisStep { directives, text }
}

// ============================================================================
// Progressive sections (anchors)
// ============================================================================

/// Hands visible at one numbered anchor, as card sets.
struct Section {
    cards: HashMap<Seat, HashSet<Card>>,
}

/// Find the next `<table>` after a node in document order.
fn table_after<'a>(doc: &'a Html, anchor: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let anchor_id = anchor.id();
    let mut seen = false;
    for node in doc.root_element().descendants() {
        if node.id() == anchor_id {
            seen = true;
            continue;
        }
        if !seen {
            continue;
        }
        if let Some(el) = ElementRef::wrap(node) {
            if el.value().name() == "table" {
                return Some(el);
            }
        }
    }
    None
}

/// Numbered anchors in document order, with the hands shown at each.
fn anchor_sections(doc: &Html) -> Vec<Section> {
    let mut sections = Vec::new();
    for anchor in doc.select(&ANCHOR) {
        let name = anchor
            .value()
            .attr("id")
            .or_else(|| anchor.value().attr("name"))
            .unwrap_or("");
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        let Some(table) = table_after(doc, anchor) else {
            continue;
        };
        let raw = extract_hands_from_table(table);
        let mut cards = HashMap::new();
        for (&seat, hand) in &raw {
            let parsed = Hand::parse_colon(hand).unwrap_or_default();
            cards.insert(seat, parsed.card_set());
        }
        sections.push(Section { cards });
    }
    sections
}

fn sorted_cards(cards: &HashSet<Card>) -> Vec<Card> {
    let mut sorted: Vec<Card> = cards.iter().copied().collect();
    sorted.sort_by(|a, b| a.suit.cmp(&b.suit).then(b.rank.cmp(&a.rank)));
    sorted
}

/// Diff consecutive sections into display directives: cards that vanish
/// were played, hands that appear get shown.
fn section_directives(sections: &[Section]) -> Vec<Vec<Directive>> {
    let empty = HashSet::new();
    let mut result = Vec::with_capacity(sections.len());

    for (i, section) in sections.iter().enumerate() {
        let mut directives = Vec::new();

        let full_visible = |s: &Section| -> Vec<Seat> {
            SEATS
                .iter()
                .copied()
                .filter(|seat| {
                    s.cards
                        .get(seat)
                        .map(|c| c.len() >= MIN_FULL_HAND)
                        .unwrap_or(false)
                })
                .collect()
        };
        let partials = |s: &Section| -> Vec<(Seat, Vec<Card>)> {
            SEATS
                .iter()
                .copied()
                .filter_map(|seat| {
                    let cards = s.cards.get(&seat)?;
                    if cards.is_empty() || cards.len() >= MIN_FULL_HAND {
                        None
                    } else {
                        Some((seat, sorted_cards(cards)))
                    }
                })
                .collect()
        };

        if i == 0 {
            let visible = full_visible(section);
            if !visible.is_empty() {
                directives.push(Directive::ShowHands(visible));
            }
            let partial = partials(section);
            if !partial.is_empty() {
                directives.push(Directive::ShowCards(partial));
            }
        } else {
            let prev = &sections[i - 1];

            let prev_full = full_visible(prev);
            let curr_full = full_visible(section);
            if curr_full.len() > prev_full.len()
                && curr_full.iter().collect::<HashSet<_>>()
                    != prev_full.iter().collect::<HashSet<_>>()
            {
                directives.push(Directive::ShowHands(curr_full));
            }

            let partial = partials(section);
            if !partial.is_empty() {
                directives.push(Directive::ShowCards(partial));
            }

            // A card in the previous section but not this one was played.
            // Only meaningful when the seat shows cards in both sections.
            let mut plays: Vec<(Seat, Card)> = Vec::new();
            for &seat in &SEATS {
                let before = prev.cards.get(&seat).unwrap_or(&empty);
                let after = section.cards.get(&seat).unwrap_or(&empty);
                if before.is_empty() || after.is_empty() {
                    continue;
                }
                let played: HashSet<Card> = before.difference(after).copied().collect();
                for card in sorted_cards(&played) {
                    plays.push((seat, card));
                }
            }
            if !plays.is_empty() {
                directives.push(Directive::Play(plays));
            }
        }

        result.push(directives);
    }
    result
}

// ============================================================================
// Page assembly
// ============================================================================

/// Bidding data scraped from one page.
struct BiddingInfo {
    dealer: Option<Seat>,
    auction_display: String,
    contract: String,
    declarer: Option<Seat>,
    steps: Vec<AnalysisStep>,
}

fn extract_bidding_info(doc: &Html, filepath: &str) -> Result<BiddingInfo> {
    // Bid-practice pages carry a dedicated bidding div.
    if let Some(div) = doc.select(&BIDDING_DIV).next() {
        let table = div
            .select(&TABLE)
            .next()
            .ok_or_else(|| anyhow!("bidding div without auction table in {}", filepath))?;
        let scraped = scrape_auction(table);
        let resolution = resolve_auction(&scraped.tokens, None)
            .with_context(|| format!("auction in {}", filepath))?;

        // Analysis prose follows three consecutive passes in the div text.
        let mut steps = Vec::new();
        let mut pass_count = 0;
        let mut in_analysis = false;
        for line in text_lines(div).lines() {
            let line = line.trim();
            if in_analysis {
                if !line.is_empty() {
                    steps.push(AnalysisStep::prose(prose_suits(line)));
                }
            } else if !line.is_empty() && line != "pass" {
                pass_count = 0;
            } else if line == "pass" {
                pass_count += 1;
                if pass_count >= 3 {
                    in_analysis = true;
                }
            }
        }

        return Ok(build_bidding_info(scraped, resolution, steps));
    }

    let table = final_auction_table(doc)
        .ok_or_else(|| anyhow!("no auction table found in {}", filepath))?;
    let scraped = scrape_auction(table);
    let resolution = resolve_auction(&scraped.tokens, None)
        .with_context(|| format!("auction in {}", filepath))?;
    let steps = extract_progressive_steps(doc, &scraped, filepath);
    Ok(build_bidding_info(scraped, resolution, steps))
}

fn build_bidding_info(
    scraped: ScrapedAuction,
    resolution: Resolution,
    steps: Vec<AnalysisStep>,
) -> BiddingInfo {
    BiddingInfo {
        dealer: resolution.dealer(),
        auction_display: scraped.display,
        contract: resolution
            .contract()
            .map(|c| c.to_string())
            .unwrap_or_default(),
        declarer: resolution.declarer(),
        steps,
    }
}

/// Step-by-step analysis: each step cell wraps the auction-so-far in an
/// inner table, ending in a `BID` placeholder whose value comes from the
/// full auction at the same position.
fn extract_progressive_steps(
    doc: &Html,
    full_auction: &ScrapedAuction,
    filepath: &str,
) -> Vec<AnalysisStep> {
    let all_bids: Vec<String> = full_auction
        .tokens
        .iter()
        .filter(|t| !t.trim().is_empty())
        .cloned()
        .collect();

    let mut steps = Vec::new();

    for td in doc.select(&TD) {
        if td.select(&TABLE).next().is_none() {
            continue;
        }
        let partial = scrape_auction(td);
        let partial_bids: Vec<&String> = partial
            .tokens
            .iter()
            .filter(|t| !t.trim().is_empty())
            .collect();
        let mut last_bid: Option<Bid> = None;
        if let Some(&last) = partial_bids.last() {
            if last == "BID" {
                if partial_bids.len() > all_bids.len() {
                    log::warn!(
                        "partial auction longer than full auction in {} ({} vs {})",
                        filepath,
                        partial_bids.len(),
                        all_bids.len()
                    );
                } else {
                    last_bid = all_bids[partial_bids.len() - 1].parse().ok();
                }
            } else {
                last_bid = last.parse().ok();
            }
        }

        let td_html = td.html();
        let raw = extract_analysis_text(&td_html);
        steps.push(clean_up_analysis(&raw, &td_html, last_bid.as_ref()));
    }

    // Closing commentary sits in plain rowspan-3 cells with no table.
    for td in doc.select(&TD) {
        if td.select(&TABLE).next().is_some() {
            continue;
        }
        if td.value().attr("rowspan").unwrap_or("").contains('3') {
            let td_html = td.html();
            let raw = extract_analysis_text(&td_html);
            steps.push(clean_up_analysis(&raw, &td_html, None));
        }
    }

    // Attach the per-section display directives to the matching steps.
    let sections = anchor_sections(doc);
    for (i, directives) in section_directives(&sections).into_iter().enumerate() {
        if let Some(step) = steps.get_mut(i) {
            step.directives.splice(0..0, directives);
        }
    }

    // The step after a "complete deal" mention restores the full hands.
    for i in 0..steps.len().saturating_sub(1) {
        let lower = steps[i].text.to_lowercase();
        if lower.contains("complete deal") || lower.contains("full deal") {
            steps[i + 1].directives.insert(0, Directive::Reset);
        }
    }

    steps
}

// ============================================================================
// Opening lead & lesson kind
// ============================================================================

lazy_static! {
    static ref LEAD_PATTERNS: Vec<Regex> = vec![
        Regex::new(r"(?s)leads (?:the )?\s*(?:<span.*?>)?([♠♥♦♣])(?:</span.*?>)?\s*(\d+|[AKQJT0123456789])").unwrap(),
        Regex::new(r"(?s)OL:\s*(?:<span.*?>)?([♠♥♦♣])(?:</span.*?>)?\s*(\d+|[AKQJT0123456789])").unwrap(),
        Regex::new(r"(?s)Partner led the (?:<span.*?>)?([♠♥♦♣])(?:</span.*?>)?\s*(\d+|[AKQJT0123456789])").unwrap(),
        Regex::new(r"(?s)Lead the (?:<span.*?>)?([♠♥♦♣])(?:</span.*?>)?\s*(\d+|[AKQJT0123456789])").unwrap(),
        Regex::new(r"(?s)probably the (?:<span.*?>)?([♠♥♦♣])(?:</span.*?>)?\s*(\d+|[AKQJT0123456789])").unwrap(),
    ];
}

const LEAD_PHRASES: [&str; 5] = ["leads", "OL:", "Partner led", "Lead the", "probably the"];

/// The opening lead as suit letter + rank, e.g. `S4`.
fn extract_opening_lead(doc: &Html) -> Option<String> {
    // Innermost cell whose text mentions a lead.
    let td = doc
        .select(&TD)
        .filter(|td| {
            let text = element_text(*td);
            LEAD_PHRASES.iter().any(|p| text.contains(p))
        })
        .min_by_key(|td| td.html().len())?;

    let html = td.html();
    for pattern in LEAD_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(&html) {
            let suit = prose_suits(&caps[1]).replace('!', "");
            let rank = caps[2].replace("10", "T");
            return Some(format!("{}{}", suit, rank));
        }
    }
    None
}

/// Lesson kind: the anchor labels that are not navigation.
fn extract_lesson_kind(doc: &Html) -> Option<String> {
    let mut kinds: Vec<String> = Vec::new();
    for anchor in doc.select(&ANCHOR) {
        let text = element_text(anchor).trim().to_string();
        if text.is_empty() || text.starts_with("Deal") {
            continue;
        }
        let lower = text.to_lowercase();
        if ["summary", "lesson", "back", "introduction", "home", "review"]
            .iter()
            .any(|w| lower.contains(w))
        {
            continue;
        }
        if !kinds.contains(&text) {
            kinds.push(text);
        }
    }
    if kinds.is_empty() {
        None
    } else {
        kinds.sort();
        Some(kinds.join("+"))
    }
}

// ============================================================================
// Page → record
// ============================================================================

lazy_static! {
    static ref DEAL_NUMBER: Regex = Regex::new(r"deal(\d+)").unwrap();
}

/// Scrape one deal page into a lesson record.
pub fn parse_deal_page(
    html: &str,
    subfolder: &str,
    filename: &str,
    config: &LessonConfig,
) -> Result<LessonRecord> {
    let doc = Html::parse_document(&strip_httrack_banner(html));
    let filepath = format!("{}/{}", subfolder, filename);

    let mut hands = extract_hands_loose(&doc);
    let info = extract_bidding_info(&doc, &filepath)?;

    // A mid-lesson rotation means the N/S hands were scraped from
    // pre-rotation sections; E/W and the auction are post-rotation.
    let rotated = info
        .steps
        .iter()
        .any(|s| s.directives.contains(&Directive::Rotate(None)));
    if rotated {
        let north = hands.remove(&Seat::North);
        let south = hands.remove(&Seat::South);
        if let Some(south) = south {
            hands.insert(Seat::North, south);
        }
        if let Some(north) = north {
            hands.insert(Seat::South, north);
        }
    }

    let lead = extract_opening_lead(&doc).unwrap_or_default();
    let kind = extract_lesson_kind(&doc).unwrap_or_default();

    let prose: String = info
        .steps
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    let student = config.student_for(subfolder, &prose);

    let deal_number = DEAL_NUMBER
        .captures(filename)
        .and_then(|caps| caps[1].parse().ok());

    Ok(LessonRecord {
        subfolder: subfolder.to_string(),
        filename: filename.to_string(),
        deal_number,
        kind,
        north_hand: hands.remove(&Seat::North).unwrap_or_default(),
        east_hand: hands.remove(&Seat::East).unwrap_or_default(),
        south_hand: hands.remove(&Seat::South).unwrap_or_default(),
        west_hand: hands.remove(&Seat::West).unwrap_or_default(),
        dealer: info.dealer.map(|s| s.to_string()).unwrap_or_default(),
        student: student.to_string(),
        auction: info.auction_display,
        contract: info.contract,
        declarer: info.declarer.map(|s| s.to_string()).unwrap_or_default(),
        lead,
        analysis: render_steps(&info.steps),
    })
}

// ============================================================================
// Batch driver
// ============================================================================

/// Deal pages under `root`: `deal*.html`, excluding the title pages.
pub fn find_deal_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    walk_deal_files(root, &mut files)?;
    files.sort();
    Ok(files)
}

fn walk_deal_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read {}", dir.display()))?
    {
        let path = entry?.path();
        if path.is_dir() {
            walk_deal_files(&path, files)?;
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with("deal")
            && name.ends_with(".html")
            && name != "deal00.html"
            && name != "deal000.html"
        {
            files.push(path);
        }
    }
    Ok(())
}

/// Scrape a whole site folder in parallel. Pages that fail to parse are
/// logged and skipped; the batch never aborts on one bad page.
pub fn scrape_site(root: &Path, config: &LessonConfig) -> Result<Vec<LessonRecord>> {
    let files = find_deal_files(root)?;
    log::info!("Found {} deal pages under {}", files.len(), root.display());

    let mut records: Vec<LessonRecord> = files
        .par_iter()
        .filter_map(|path| match scrape_file(path, root, config) {
            Ok(record) => Some(record),
            Err(e) => {
                log::warn!("Skipping {}: {:#}", path.display(), e);
                None
            }
        })
        .collect();

    records.sort_by(|a, b| {
        (a.subfolder.as_str(), a.filename.as_str()).cmp(&(b.subfolder.as_str(), b.filename.as_str()))
    });
    Ok(records)
}

fn scrape_file(path: &Path, root: &Path, config: &LessonConfig) -> Result<LessonRecord> {
    let html = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let subfolder = path
        .parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_deal_page(&html, &subfolder, &filename, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LessonConfig {
        LessonConfig::site_defaults("Baker")
    }

    const BIDDING_PAGE: &str = r#"
<html><body>
<table>
  <tr><td style="width:7em">&nbsp;</td><td></td></tr>
  <tr><td style="width:7em">♠ A K 4<br>♥ Q J 2<br>♦ 10 9 8<br>♣ A 7 6 5</td><td></td></tr>
</table>
<table>
  <tr><td height="800px">♠ Q J 8 6 5<br>♥ K 9 3<br>♦ A K<br>♣ 8 3 2</td></tr>
</table>
<div class="bidding">
<table>
  <tr><td>WEST</td><td>NORTH</td><td>EAST</td><td>SOUTH</td></tr>
  <tr><td></td><td>1NT</td><td>pass</td><td>2♣</td></tr>
  <tr><td>pass</td><td>2♦</td><td>pass</td><td>3NT</td></tr>
  <tr><td>pass</td><td>pass</td><td>pass</td><td></td></tr>
</table>
<p>With 15-17 balanced, open 1NT.</p>
<p>Stayman finds no fit, so South bids game.</p>
</div>
</body></html>
"#;

    #[test]
    fn test_parse_bidding_page() {
        let record = parse_deal_page(BIDDING_PAGE, "Stayman", "deal01.html", &config()).unwrap();
        assert_eq!(record.deal_number, Some(1));
        assert_eq!(record.north_hand, "S:AK4 H:QJ2 D:T98 C:A765");
        assert_eq!(record.south_hand, "S:QJ865 H:K93 D:AK C:832");
        assert_eq!(record.dealer, "North");
        assert_eq!(record.contract, "3NT");
        // North bid notrump first for the partnership.
        assert_eq!(record.declarer, "North");
        assert_eq!(
            record.auction,
            "1NT pass 2C | pass 2D pass 3NT | pass pass pass"
        );
        assert_eq!(record.student, "South");
        assert!(record.analysis.contains("With 15-17 balanced, open 1NT."));
    }

    #[test]
    fn test_dealer_inferred_from_column() {
        // South opens: three leading blanks put the dealer in the last
        // column.
        let html = r#"
<html><body>
<div class="bidding">
<table>
  <tr><td>WEST</td><td>NORTH</td><td>EAST</td><td>SOUTH</td></tr>
  <tr><td></td><td></td><td></td><td>1♠</td></tr>
  <tr><td>pass</td><td>2♠</td><td>pass</td><td>pass</td></tr>
  <tr><td>pass</td><td></td><td></td><td></td></tr>
</table>
</div>
</body></html>
"#;
        let record = parse_deal_page(html, "Majors", "deal02.html", &config()).unwrap();
        assert_eq!(record.dealer, "South");
        assert_eq!(record.contract, "2S");
        assert_eq!(record.declarer, "South");
        assert_eq!(record.auction, "1S | pass 2S pass pass | pass");
    }

    #[test]
    fn test_doubled_contract_from_page() {
        let html = r#"
<html><body>
<div class="bidding">
<table>
  <tr><td>WEST</td><td>NORTH</td><td>EAST</td><td>SOUTH</td></tr>
  <tr><td></td><td>1♠</td><td>pass</td><td>pass</td></tr>
  <tr><td>double</td><td>pass</td><td>pass</td><td>pass</td></tr>
</table>
</div>
</body></html>
"#;
        let record = parse_deal_page(html, "Doubles", "deal03.html", &config()).unwrap();
        assert_eq!(record.contract, "1SX");
        assert_eq!(record.auction, "1S pass pass | X pass pass pass");
    }

    #[test]
    fn test_hand_text_normalization() {
        assert_eq!(
            hand_text_to_colon("♠ Q J 8 6 5 ♥ K 9 2 ♦ A K ♣ 8 6 3"),
            "S:QJ865 H:K92 D:AK C:863"
        );
        assert_eq!(hand_text_to_colon("♠ A 10 4 ♥ -- ♦ K Q ♣ 9"), "S:AT4 H: D:KQ C:9");
    }

    #[test]
    fn test_prose_suits() {
        assert_eq!(prose_suits("bid 2♣ then 3♠"), "bid 2!C then 3!S");
    }

    #[test]
    fn test_strip_httrack_banner() {
        let html = "<html>\n\n<!-- Mirrored from example.com -->\n<!-- Added by HTTrack -->\n<body></body></html>";
        let cleaned = strip_httrack_banner(html);
        assert!(!cleaned.contains("HTTrack"));
        assert!(cleaned.contains("<body>"));
    }

    #[test]
    fn test_opening_lead() {
        let html = r#"
<html><body>
<div class="bidding">
<table>
  <tr><td>WEST</td><td>NORTH</td><td>EAST</td><td>SOUTH</td></tr>
  <tr><td></td><td>1NT</td><td>pass</td><td>pass</td></tr>
  <tr><td>pass</td><td></td><td></td><td></td></tr>
</table>
</div>
<table><tr><td>West leads the <span class="suit">♠</span>4 against 1NT.</td></tr></table>
</body></html>
"#;
        let record = parse_deal_page(html, "OLead", "deal04.html", &config()).unwrap();
        assert_eq!(record.lead, "S4");
        assert_eq!(record.student, "West");
    }

    #[test]
    fn test_unparseable_auction_is_an_error() {
        let html = r#"
<html><body>
<div class="bidding">
<table>
  <tr><td>WEST</td><td>NORTH</td><td>EAST</td><td>SOUTH</td></tr>
  <tr><td></td><td>1Z</td><td>pass</td><td>pass</td></tr>
  <tr><td>pass</td><td></td><td></td><td></td></tr>
</table>
</div>
</body></html>
"#;
        let err = parse_deal_page(html, "Broken", "deal05.html", &config()).unwrap_err();
        assert!(format!("{:#}", err).contains("1Z"));
    }

    #[test]
    fn test_analysis_cleanup_strips_markup() {
        let td_html = r#"<td rowspan="3">Win the ♠A.<br/><br/>Then <b>count</b> <span class="x">winners</span>.<a href="deal02.html">NEXT</a></td>"#;
        let raw = extract_analysis_text(td_html);
        let step = clean_up_analysis(&raw, td_html, None);
        assert_eq!(step.text, "Win the !SA.\\nThen count winners.");
        // The cell carries a NEXT link, so the step advances.
        assert_eq!(step.directives, vec![Directive::Advance]);
    }

    #[test]
    fn test_grey_font_text_is_dropped() {
        let td_html =
            "<td><font color=\"#808080\">Earlier step text.</font>Fresh analysis here.</td>";
        assert_eq!(extract_analysis_text(td_html), "Fresh analysis here.");
    }

    #[test]
    fn test_find_deal_files_excludes_title_pages() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("Stayman");
        std::fs::create_dir_all(&sub).unwrap();
        for name in ["deal00.html", "deal01.html", "deal02.html", "index.html"] {
            std::fs::write(sub.join(name), "<html></html>").unwrap();
        }
        let files = find_deal_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["deal01.html", "deal02.html"]);
    }
}
