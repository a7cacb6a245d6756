//! Presentation directives for analysis text
//!
//! The legacy pipeline drove the lesson player by baking control tags like
//! `[NEXT]` or `[ROTATE]` into the analysis prose and later searching the
//! prose for those substrings, which misfired whenever the prose itself
//! mentioned rotating or clicking NEXT. Here every step of analysis is a
//! [`AnalysisStep`]: the prose plus a list of typed [`Directive`]s. Tags
//! are rendered on their own lines and parsed back only as whole lines, so
//! prose can never be misread as a control signal.

use crate::auction::{Bid, Seat};
use crate::hand::Card;
use std::fmt;

/// A typed control signal attached to an analysis step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Reveal whole hands: `[show NS]`.
    ShowHands(Vec<Seat>),
    /// Reveal specific cards of partially-visible hands:
    /// `[showcards N:SA,S4,S:D3]`.
    ShowCards(Vec<(Seat, Vec<Card>)>),
    /// Cards played since the previous step: `[PLAY N:SK,E:H5]`.
    Play(Vec<(Seat, Card)>),
    /// Rotate the table display; `[rotate W]` puts West at the bottom,
    /// bare `[ROTATE]` flips North/South as the site's mid-lesson pages do.
    Rotate(Option<Seat>),
    /// The page advances on its NEXT button: `[NEXT]`.
    Advance,
    /// This step announces a bid: `[BID 1S]`.
    AnnounceBid(Bid),
    /// Hide the auction display: `[AUCTION off]`.
    AuctionOff,
    /// Show the opening lead: `[SHOW_LEAD]`.
    ShowLead,
    /// Restore the original hands: `[RESET]`.
    Reset,
}

impl Directive {
    /// Parse a whole line as a directive tag. Anything else, including a
    /// tag embedded inside prose, is not a directive.
    pub fn parse_line(line: &str) -> Option<Directive> {
        let line = line.trim();
        let inner = line.strip_prefix('[')?.strip_suffix(']')?;
        match inner {
            "NEXT" => return Some(Directive::Advance),
            "ROTATE" => return Some(Directive::Rotate(None)),
            "RESET" => return Some(Directive::Reset),
            "SHOW_LEAD" => return Some(Directive::ShowLead),
            "AUCTION off" => return Some(Directive::AuctionOff),
            _ => {}
        }
        let (keyword, rest) = inner.split_once(' ')?;
        match keyword {
            "show" => {
                let seats: Option<Vec<Seat>> = rest
                    .chars()
                    .map(|c| c.to_string().parse::<Seat>().ok())
                    .collect();
                seats.map(Directive::ShowHands)
            }
            "rotate" => rest.parse::<Seat>().ok().map(|s| Directive::Rotate(Some(s))),
            "BID" => rest.parse::<Bid>().ok().map(Directive::AnnounceBid),
            "PLAY" => parse_seat_cards(rest).map(Directive::Play),
            "showcards" => parse_showcards(rest).map(Directive::ShowCards),
            _ => None,
        }
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Directive::ShowHands(seats) => {
                write!(f, "[show ")?;
                for seat in seats {
                    write!(f, "{}", seat.letter())?;
                }
                write!(f, "]")
            }
            Directive::ShowCards(groups) => {
                let mut parts = Vec::new();
                for (seat, cards) in groups {
                    for (i, card) in cards.iter().enumerate() {
                        if i == 0 {
                            parts.push(format!("{}:{}", seat.letter(), card));
                        } else {
                            parts.push(card.to_string());
                        }
                    }
                }
                write!(f, "[showcards {}]", parts.join(","))
            }
            Directive::Play(plays) => {
                let parts: Vec<String> = plays
                    .iter()
                    .map(|(seat, card)| format!("{}:{}", seat.letter(), card))
                    .collect();
                write!(f, "[PLAY {}]", parts.join(","))
            }
            Directive::Rotate(None) => write!(f, "[ROTATE]"),
            Directive::Rotate(Some(seat)) => write!(f, "[rotate {}]", seat.letter()),
            Directive::Advance => write!(f, "[NEXT]"),
            Directive::AnnounceBid(bid) => write!(f, "[BID {}]", bid),
            Directive::AuctionOff => write!(f, "[AUCTION off]"),
            Directive::ShowLead => write!(f, "[SHOW_LEAD]"),
            Directive::Reset => write!(f, "[RESET]"),
        }
    }
}

/// Parse `N:SK,E:H5` into per-seat plays.
fn parse_seat_cards(s: &str) -> Option<Vec<(Seat, Card)>> {
    let mut plays = Vec::new();
    for token in s.split(',') {
        let (seat, card) = token.split_once(':')?;
        plays.push((seat.parse::<Seat>().ok()?, parse_card(card)?));
    }
    Some(plays)
}

/// Parse `N:SA,S4,S:D3`: a token with a colon starts a new seat, bare
/// tokens continue the current seat's card list.
fn parse_showcards(s: &str) -> Option<Vec<(Seat, Vec<Card>)>> {
    let mut groups: Vec<(Seat, Vec<Card>)> = Vec::new();
    for token in s.split(',') {
        if let Some((seat, card)) = token.split_once(':') {
            groups.push((seat.parse::<Seat>().ok()?, vec![parse_card(card)?]));
        } else {
            let (_, cards) = groups.last_mut()?;
            cards.push(parse_card(token)?);
        }
    }
    Some(groups)
}

fn parse_card(s: &str) -> Option<Card> {
    let mut chars = s.trim().chars();
    let suit = crate::hand::Suit::from_char(chars.next()?)?;
    let rank = crate::hand::Rank::from_char(chars.next()?)?;
    if chars.next().is_some() {
        return None;
    }
    Some(Card::new(suit, rank))
}

/// One display step of a lesson: directives plus prose.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnalysisStep {
    pub directives: Vec<Directive>,
    pub text: String,
}

impl AnalysisStep {
    pub fn prose(text: impl Into<String>) -> AnalysisStep {
        AnalysisStep {
            directives: Vec::new(),
            text: text.into(),
        }
    }
}

/// Line separator inside a CSV cell: a literal backslash-n pair, as the
/// legacy spreadsheet used.
pub const STEP_SEPARATOR: &str = "\\n";

/// Render steps into the CSV cell encoding: each directive on its own
/// line, then the prose line, all joined with [`STEP_SEPARATOR`].
pub fn render_steps(steps: &[AnalysisStep]) -> String {
    let mut lines: Vec<String> = Vec::new();
    for step in steps {
        for directive in &step.directives {
            lines.push(directive.to_string());
        }
        if !step.text.is_empty() || step.directives.is_empty() {
            lines.push(step.text.clone());
        }
    }
    lines.join(STEP_SEPARATOR)
}

/// Parse the CSV cell encoding back into steps. Directive lines attach to
/// the next prose line; trailing directives form a final prose-less step.
pub fn parse_steps(cell: &str) -> Vec<AnalysisStep> {
    let mut steps = Vec::new();
    let mut pending: Vec<Directive> = Vec::new();
    if cell.is_empty() {
        return steps;
    }
    for line in cell.split(STEP_SEPARATOR) {
        if let Some(directive) = Directive::parse_line(line) {
            pending.push(directive);
        } else {
            steps.push(AnalysisStep {
                directives: std::mem::take(&mut pending),
                text: line.to_string(),
            });
        }
    }
    if !pending.is_empty() {
        steps.push(AnalysisStep {
            directives: pending,
            text: String::new(),
        });
    }
    steps
}
