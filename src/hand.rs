//! Cards, hands, and deals
//!
//! The lesson CSV stores hands in the site's colon format
//! (`S:AK4 H:AT865 D:Q3 C:AJ4`); PBN wants the dot format
//! (`AK4.AT865.Q3.AJ4`). Hands here may be partial or empty: many lesson
//! pages never show the defenders' cards.

use crate::auction::Seat;
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// The four suits, in the display order used everywhere in the toolchain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Suit {
    Spades,
    Hearts,
    Diamonds,
    Clubs,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Spades, Suit::Hearts, Suit::Diamonds, Suit::Clubs];

    pub fn to_char(self) -> char {
        match self {
            Suit::Spades => 'S',
            Suit::Hearts => 'H',
            Suit::Diamonds => 'D',
            Suit::Clubs => 'C',
        }
    }

    pub fn from_char(c: char) -> Option<Suit> {
        match c.to_ascii_uppercase() {
            'S' => Some(Suit::Spades),
            'H' => Some(Suit::Hearts),
            'D' => Some(Suit::Diamonds),
            'C' => Some(Suit::Clubs),
            _ => None,
        }
    }
}

/// Card ranks. Ordering puts the ace highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Rank {
    Two = 2,
    Three = 3,
    Four = 4,
    Five = 5,
    Six = 6,
    Seven = 7,
    Eight = 8,
    Nine = 9,
    Ten = 10,
    Jack = 11,
    Queen = 12,
    King = 13,
    Ace = 14,
}

impl Rank {
    /// All ranks, ace first, matching how holdings are printed.
    pub const DESCENDING: [Rank; 13] = [
        Rank::Ace,
        Rank::King,
        Rank::Queen,
        Rank::Jack,
        Rank::Ten,
        Rank::Nine,
        Rank::Eight,
        Rank::Seven,
        Rank::Six,
        Rank::Five,
        Rank::Four,
        Rank::Three,
        Rank::Two,
    ];

    pub fn to_char(self) -> char {
        match self {
            Rank::Ace => 'A',
            Rank::King => 'K',
            Rank::Queen => 'Q',
            Rank::Jack => 'J',
            Rank::Ten => 'T',
            Rank::Nine => '9',
            Rank::Eight => '8',
            Rank::Seven => '7',
            Rank::Six => '6',
            Rank::Five => '5',
            Rank::Four => '4',
            Rank::Three => '3',
            Rank::Two => '2',
        }
    }

    pub fn from_char(c: char) -> Option<Rank> {
        match c.to_ascii_uppercase() {
            'A' => Some(Rank::Ace),
            'K' => Some(Rank::King),
            'Q' => Some(Rank::Queen),
            'J' => Some(Rank::Jack),
            'T' => Some(Rank::Ten),
            '9' => Some(Rank::Nine),
            '8' => Some(Rank::Eight),
            '7' => Some(Rank::Seven),
            '6' => Some(Rank::Six),
            '5' => Some(Rank::Five),
            '4' => Some(Rank::Four),
            '3' => Some(Rank::Three),
            '2' => Some(Rank::Two),
            _ => None,
        }
    }
}

/// A single card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Card {
        Card { suit, rank }
    }
}

impl fmt::Display for Card {
    /// Suit letter then rank letter, e.g. "SK" for the spade king.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.suit.to_char(), self.rank.to_char())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandParseError {
    #[error("malformed hand fragment {fragment:?}")]
    BadFragment { fragment: String },
    #[error("unrecognized rank character {rank:?} in {fragment:?}")]
    BadRank { rank: char, fragment: String },
}

/// One player's holding. May be partial: lesson pages often show only some
/// hands, and progressive pages show hands shrinking as cards are played.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Hand {
    cards: Vec<Card>,
}

impl Hand {
    pub fn new() -> Hand {
        Hand::default()
    }

    pub fn from_cards(mut cards: Vec<Card>) -> Hand {
        cards.sort_by(hand_order);
        cards.dedup();
        Hand { cards }
    }

    /// Parse the colon format: `S:AK4 H:AT865 D:Q3 C:AJ4`. Suits may be
    /// missing entirely; `10` is accepted for the ten. An empty or
    /// whitespace-only string is an empty hand, which is how the CSV
    /// records an unseen hand.
    pub fn parse_colon(s: &str) -> Result<Hand, HandParseError> {
        let mut cards = Vec::new();
        for part in s.split_whitespace() {
            let (suit_char, holding) =
                part.split_once(':')
                    .ok_or_else(|| HandParseError::BadFragment {
                        fragment: part.to_string(),
                    })?;
            let suit = suit_char
                .chars()
                .next()
                .filter(|_| suit_char.len() == 1)
                .and_then(Suit::from_char)
                .ok_or_else(|| HandParseError::BadFragment {
                    fragment: part.to_string(),
                })?;
            let holding = holding.replace("10", "T");
            for c in holding.chars() {
                if c == '-' {
                    // Void marker from the HTML; already means "no cards".
                    continue;
                }
                let rank = Rank::from_char(c).ok_or(HandParseError::BadRank {
                    rank: c,
                    fragment: part.to_string(),
                })?;
                cards.push(Card::new(suit, rank));
            }
        }
        Ok(Hand::from_cards(cards))
    }

    /// Parse the PBN dot format, `AK4.AT865.Q3.AJ4` (suit order S,H,D,C,
    /// voids as empty segments), as printed by the dealer binary.
    pub fn parse_pbn(s: &str) -> Result<Hand, HandParseError> {
        let segments: Vec<&str> = s.trim().split('.').collect();
        if segments.len() != 4 {
            return Err(HandParseError::BadFragment {
                fragment: s.trim().to_string(),
            });
        }
        let mut cards = Vec::new();
        for (&suit, segment) in Suit::ALL.iter().zip(&segments) {
            for c in segment.replace("10", "T").chars() {
                let rank = Rank::from_char(c).ok_or(HandParseError::BadRank {
                    rank: c,
                    fragment: segment.to_string(),
                })?;
                cards.push(Card::new(suit, rank));
            }
        }
        Ok(Hand::from_cards(cards))
    }

    /// Render the colon format with every suit present (`S: H:93 ...` for
    /// a spade void), ranks descending.
    pub fn to_colon_string(&self) -> String {
        Suit::ALL
            .iter()
            .map(|&suit| format!("{}:{}", suit.to_char(), self.holding_string(suit)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Render the PBN dot format, `AK4.AT865.Q3.AJ4`, voids as empty
    /// segments.
    pub fn to_pbn_string(&self) -> String {
        Suit::ALL
            .iter()
            .map(|&suit| self.holding_string(suit))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// The ranks held in one suit, descending, as text.
    pub fn holding_string(&self, suit: Suit) -> String {
        self.cards
            .iter()
            .filter(|c| c.suit == suit)
            .map(|c| c.rank.to_char())
            .collect()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn card_set(&self) -> HashSet<Card> {
        self.cards.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn contains(&self, card: Card) -> bool {
        self.cards.contains(&card)
    }

    pub fn suit_length(&self, suit: Suit) -> usize {
        self.cards.iter().filter(|c| c.suit == suit).count()
    }

    pub fn add_card(&mut self, card: Card) {
        if !self.contains(card) {
            self.cards.push(card);
            self.cards.sort_by(hand_order);
        }
    }

    pub fn remove_card(&mut self, card: Card) -> bool {
        match self.cards.iter().position(|&c| c == card) {
            Some(idx) => {
                self.cards.remove(idx);
                true
            }
            None => false,
        }
    }
}

/// Suit order S,H,D,C then rank descending, the order holdings print in.
fn hand_order(a: &Card, b: &Card) -> std::cmp::Ordering {
    a.suit.cmp(&b.suit).then(b.rank.cmp(&a.rank))
}

/// The four hands of a board, keyed by seat.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Deal {
    pub north: Hand,
    pub east: Hand,
    pub south: Hand,
    pub west: Hand,
}

impl Deal {
    pub fn hand(&self, seat: Seat) -> &Hand {
        match seat {
            Seat::North => &self.north,
            Seat::East => &self.east,
            Seat::South => &self.south,
            Seat::West => &self.west,
        }
    }

    pub fn hand_mut(&mut self, seat: Seat) -> &mut Hand {
        match seat {
            Seat::North => &mut self.north,
            Seat::East => &mut self.east,
            Seat::South => &mut self.south,
            Seat::West => &mut self.west,
        }
    }

    /// Every card held by any seat.
    pub fn used_cards(&self) -> HashSet<Card> {
        let mut used = HashSet::new();
        for seat in [Seat::North, Seat::East, Seat::South, Seat::West] {
            used.extend(self.hand(seat).cards().iter().copied());
        }
        used
    }

    /// The cards no seat holds, in deck order.
    pub fn unused_cards(&self) -> Vec<Card> {
        let used = self.used_cards();
        full_deck().into_iter().filter(|c| !used.contains(c)).collect()
    }

    /// Format the PBN `[Deal "…"]` tag, hands clockwise from `first_seat`.
    pub fn deal_tag(&self, first_seat: Seat) -> String {
        let hands: Vec<String> = (0..4)
            .map(|i| self.hand(first_seat.advance(i)).to_pbn_string())
            .collect();
        format!("[Deal \"{}:{}\"]", first_seat.letter(), hands.join(" "))
    }
}

/// All 52 cards, suit order S,H,D,C, ranks descending within each suit.
pub fn full_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(52);
    for &suit in &Suit::ALL {
        for &rank in &Rank::DESCENDING {
            deck.push(Card::new(suit, rank));
        }
    }
    deck
}
