//! Deal legality checks
//!
//! Scraped hands pick up transcription faults: a card landing in two
//! hands, or a hand with the wrong count after a misread rank. Each fault
//! is reported as a structured issue with a suggested repair so the HTML
//! source can be fixed by hand and re-scraped.

use crate::auction::Seat;
use crate::hand::{full_deck, Card, Hand};
use crate::record::LessonRecord;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Seats tried first when suggesting which duplicate holder to repair.
const REPAIR_ORDER: [Seat; 4] = [Seat::North, Seat::West, Seat::East, Seat::South];

/// A suggested single-card repair for a duplicated card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardSwap {
    pub seat: Seat,
    pub remove: Card,
    pub add: Card,
    pub old_holding: String,
    pub new_holding: String,
}

#[derive(Debug, Clone)]
pub enum LegalityIssue {
    /// A hand holds something other than 0 or 13 cards.
    WrongCardCount {
        subfolder: String,
        deal: String,
        seat: Seat,
        count: usize,
    },
    /// The same card appears in more than one hand.
    DuplicateCard {
        subfolder: String,
        deal: String,
        card: Card,
        seats: Vec<Seat>,
        holdings: Vec<(Seat, String)>,
        suggestion: Option<CardSwap>,
    },
    /// A hand field would not parse at all.
    UnparseableHand {
        subfolder: String,
        deal: String,
        seat: Seat,
        message: String,
    },
}

impl fmt::Display for LegalityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LegalityIssue::WrongCardCount {
                subfolder,
                deal,
                seat,
                count,
            } => write!(
                f,
                "{}, Deal {}: {} has {} cards (expected 0 or 13)",
                subfolder, deal, seat, count
            ),
            LegalityIssue::DuplicateCard {
                subfolder,
                deal,
                card,
                seats,
                holdings,
                suggestion,
            } => {
                let names: Vec<&str> = seats.iter().map(|s| s.name()).collect();
                write!(
                    f,
                    "{}, Deal {}: Card {} appears in multiple hands: {}",
                    subfolder,
                    deal,
                    card,
                    names.join(", ")
                )?;
                for (seat, holding) in holdings {
                    write!(
                        f,
                        "\n    {} {} holding: {}",
                        seat,
                        card.suit.to_char(),
                        holding
                    )?;
                }
                if let Some(swap) = suggestion {
                    write!(
                        f,
                        "\n    Suggestion: {} replace {}: {} with {}: {}",
                        swap.seat,
                        card.suit.to_char(),
                        swap.old_holding,
                        card.suit.to_char(),
                        swap.new_holding
                    )?;
                }
                Ok(())
            }
            LegalityIssue::UnparseableHand {
                subfolder,
                deal,
                seat,
                message,
            } => write!(
                f,
                "{}, Deal {}: {} hand does not parse: {}",
                subfolder, deal, seat, message
            ),
        }
    }
}

/// Check every record of a lesson CSV. The caller decides whether issues
/// are fatal; batch conversion logs them and moves on.
pub fn check_records(records: &[LessonRecord]) -> Vec<LegalityIssue> {
    let mut issues = Vec::new();
    for record in records {
        check_record(record, &mut issues);
    }
    issues
}

fn check_record(record: &LessonRecord, issues: &mut Vec<LegalityIssue>) {
    let deal = record
        .deal_number
        .map(|n| n.to_string())
        .unwrap_or_default();

    let mut hands: HashMap<Seat, Hand> = HashMap::new();
    for seat in [Seat::North, Seat::East, Seat::South, Seat::West] {
        match Hand::parse_colon(record.hand_field(seat)) {
            Ok(hand) => {
                hands.insert(seat, hand);
            }
            Err(e) => {
                issues.push(LegalityIssue::UnparseableHand {
                    subfolder: record.subfolder.clone(),
                    deal: deal.clone(),
                    seat,
                    message: e.to_string(),
                });
                hands.insert(seat, Hand::new());
            }
        }
    }

    for seat in [Seat::North, Seat::East, Seat::South, Seat::West] {
        let count = hands[&seat].len();
        if count != 0 && count != 13 {
            issues.push(LegalityIssue::WrongCardCount {
                subfolder: record.subfolder.clone(),
                deal: deal.clone(),
                seat,
                count,
            });
        }
    }

    // Who holds each card. Iteration order fixed so reports are stable.
    let mut holders: HashMap<Card, Vec<Seat>> = HashMap::new();
    let mut used: HashSet<Card> = HashSet::new();
    for seat in [Seat::North, Seat::East, Seat::South, Seat::West] {
        for &card in hands[&seat].cards() {
            holders.entry(card).or_default().push(seat);
            used.insert(card);
        }
    }

    let full_deal = [Seat::North, Seat::East, Seat::South, Seat::West]
        .iter()
        .all(|s| hands[s].len() == 13);

    let mut duplicates: Vec<(Card, Vec<Seat>)> = holders
        .into_iter()
        .filter(|(_, seats)| seats.len() > 1)
        .collect();
    duplicates.sort_by_key(|(card, _)| *card);

    for (card, seats) in duplicates {
        let holdings: Vec<(Seat, String)> = seats
            .iter()
            .map(|&s| (s, hands[&s].holding_string(card.suit)))
            .collect();
        let suggestion =
            suggest_replacement(&used, card, full_deal).map(|replacement| {
                let seat = *REPAIR_ORDER
                    .iter()
                    .find(|s| seats.contains(s))
                    .unwrap_or(&seats[0]);
                let mut repaired = hands[&seat].clone();
                repaired.remove_card(card);
                repaired.add_card(replacement);
                CardSwap {
                    seat,
                    remove: card,
                    add: replacement,
                    old_holding: hands[&seat].holding_string(card.suit),
                    new_holding: repaired.holding_string(card.suit),
                }
            });
        issues.push(LegalityIssue::DuplicateCard {
            subfolder: record.subfolder.clone(),
            deal: deal.clone(),
            card,
            seats,
            holdings,
            suggestion,
        });
    }
}

/// Pick the replacement card for a duplicate: in a full deal only one card
/// of the suit can be missing, so take the highest; in a partial deal take
/// the missing card of that suit closest in rank to the duplicate.
fn suggest_replacement(used: &HashSet<Card>, duplicate: Card, full_deal: bool) -> Option<Card> {
    let missing: Vec<Card> = full_deck()
        .into_iter()
        .filter(|c| c.suit == duplicate.suit && !used.contains(c))
        .collect();
    if missing.is_empty() {
        return None;
    }
    if full_deal {
        missing.into_iter().max_by_key(|c| c.rank)
    } else {
        missing
            .into_iter()
            .min_by_key(|c| (c.rank as i8 - duplicate.rank as i8).unsigned_abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::{Rank, Suit};

    fn record(north: &str, east: &str, south: &str, west: &str) -> LessonRecord {
        LessonRecord {
            subfolder: "NMF".to_string(),
            deal_number: Some(7),
            north_hand: north.to_string(),
            east_hand: east.to_string(),
            south_hand: south.to_string(),
            west_hand: west.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_partial_deal_has_no_issues() {
        let r = record(
            "S:AK4 H:QJ2 D:T98 C:A765",
            "",
            "S:QJ865 H:K93 D:AK C:832",
            "",
        );
        assert!(check_records(&[r]).is_empty());
    }

    #[test]
    fn test_wrong_card_count() {
        let r = record("S:AK4 H:QJ2", "", "", "");
        let issues = check_records(&[r]);
        assert_eq!(issues.len(), 1);
        assert!(matches!(
            issues[0],
            LegalityIssue::WrongCardCount {
                seat: Seat::North,
                count: 6,
                ..
            }
        ));
    }

    #[test]
    fn test_duplicate_reported_with_both_holders() {
        // The spade ace sits in both North and South.
        let r = record(
            "S:AK4 H:QJ2 D:T98 C:A765",
            "",
            "S:AQJ86 H:K93 D:AK C:832",
            "",
        );
        let issues = check_records(&[r]);
        assert_eq!(issues.len(), 1);
        match &issues[0] {
            LegalityIssue::DuplicateCard {
                card,
                seats,
                suggestion,
                ..
            } => {
                assert_eq!(card.to_string(), "SA");
                assert_eq!(seats, &vec![Seat::North, Seat::South]);
                // Repair targets North first and stays in the same suit.
                let swap = suggestion.as_ref().unwrap();
                assert_eq!(swap.seat, Seat::North);
                assert_eq!(swap.add.suit, Suit::Spades);
                assert_eq!(swap.remove.to_string(), "SA");
            }
            other => panic!("unexpected issue {:?}", other),
        }
    }

    #[test]
    fn test_partial_deal_suggestion_is_closest_rank() {
        // Duplicate spade queen; the king and jack are both one step away
        // and the higher card wins the tie.
        let r = record("S:Q32 H:A84 D:K75 C:9642", "", "S:QT9 H:K93 D:AQJ C:AK3", "");
        let issues = check_records(&[r]);
        let LegalityIssue::DuplicateCard { suggestion, .. } = &issues[0] else {
            panic!("expected duplicate issue");
        };
        let swap = suggestion.as_ref().unwrap();
        assert_eq!(swap.add, Card::new(Suit::Spades, Rank::King));
    }

    #[test]
    fn test_unparseable_hand_is_an_issue_not_a_crash() {
        let r = record("garbage", "", "", "");
        let issues = check_records(&[r]);
        assert!(matches!(issues[0], LegalityIssue::UnparseableHand { .. }));
    }
}
