//! Auction reconstruction
//!
//! Rebuilds the dealer, the final contract (with doubling state), and the
//! declaring seat from a flat list of bid tokens as they come out of a
//! lesson page's auction table. Tables are column-ordered West, North,
//! East, South, with blank cells for the seats ahead of the dealer, so the
//! same routine serves both raw table rows (dealer inferred) and cleaned-up
//! auction strings that start at a known dealer.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// One of the four table positions. Rotation is clockwise: N, E, S, W.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Seat {
    North,
    East,
    South,
    West,
}

impl Seat {
    const CLOCKWISE: [Seat; 4] = [Seat::North, Seat::East, Seat::South, Seat::West];

    /// The seat `steps` positions clockwise from this one.
    pub fn advance(self, steps: usize) -> Seat {
        let idx = Seat::CLOCKWISE.iter().position(|&s| s == self).unwrap();
        Seat::CLOCKWISE[(idx + steps) % 4]
    }

    /// Next seat in rotation.
    pub fn next(self) -> Seat {
        self.advance(1)
    }

    /// Declarer's left-hand opponent, i.e. the opening leader.
    pub fn lho(self) -> Seat {
        self.next()
    }

    /// Partner across the table.
    pub fn partner(self) -> Seat {
        self.advance(2)
    }

    /// Single-letter abbreviation used in PBN tags.
    pub fn letter(self) -> char {
        match self {
            Seat::North => 'N',
            Seat::East => 'E',
            Seat::South => 'S',
            Seat::West => 'W',
        }
    }

    /// Full name as written in the lesson CSV.
    pub fn name(self) -> &'static str {
        match self {
            Seat::North => "North",
            Seat::East => "East",
            Seat::South => "South",
            Seat::West => "West",
        }
    }
}

impl fmt::Display for Seat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Seat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "N" | "NORTH" => Ok(Seat::North),
            "E" | "EAST" => Ok(Seat::East),
            "S" | "SOUTH" => Ok(Seat::South),
            "W" | "WEST" => Ok(Seat::West),
            _ => Err(()),
        }
    }
}

/// The suit or notrump designation of a contract bid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strain {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
    NoTrump,
}

impl Strain {
    pub fn from_symbol(s: &str) -> Option<Strain> {
        match s.to_ascii_uppercase().as_str() {
            "C" => Some(Strain::Clubs),
            "D" => Some(Strain::Diamonds),
            "H" => Some(Strain::Hearts),
            "S" => Some(Strain::Spades),
            "N" | "NT" => Some(Strain::NoTrump),
            _ => None,
        }
    }

    /// Rendering used in contract strings: "C", "D", "H", "S", "NT".
    pub fn symbol(self) -> &'static str {
        match self {
            Strain::Clubs => "C",
            Strain::Diamonds => "D",
            Strain::Hearts => "H",
            Strain::Spades => "S",
            Strain::NoTrump => "NT",
        }
    }
}

impl fmt::Display for Strain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// An atomic auction token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bid {
    Pass,
    Double,
    Redouble,
    Contract { level: u8, strain: Strain },
}

impl Bid {
    pub fn is_contract(&self) -> bool {
        matches!(self, Bid::Contract { .. })
    }

    pub fn strain(&self) -> Option<Strain> {
        match self {
            Bid::Contract { strain, .. } => Some(*strain),
            _ => None,
        }
    }
}

impl FromStr for Bid {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_uppercase();
        match s.as_str() {
            // "ALL PASS" turns up as a single cell on a few pages.
            "PASS" | "P" | "AP" | "ALL PASS" => return Ok(Bid::Pass),
            "DOUBLE" | "X" => return Ok(Bid::Double),
            "REDOUBLE" | "XX" => return Ok(Bid::Redouble),
            _ => {}
        }
        let mut chars = s.chars();
        let level = chars.next().and_then(|c| c.to_digit(10)).ok_or(())? as u8;
        if !(1..=7).contains(&level) {
            return Err(());
        }
        let strain = Strain::from_symbol(chars.as_str()).ok_or(())?;
        Ok(Bid::Contract { level, strain })
    }
}

impl fmt::Display for Bid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bid::Pass => f.write_str("pass"),
            Bid::Double => f.write_str("X"),
            Bid::Redouble => f.write_str("XX"),
            Bid::Contract { level, strain } => write!(f, "{}{}", level, strain),
        }
    }
}

/// Doubling state of the final contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Doubling {
    #[default]
    Undoubled,
    Doubled,
    Redoubled,
}

impl Doubling {
    /// Suffix appended to the contract string ("", "X", "XX").
    pub fn suffix(self) -> &'static str {
        match self {
            Doubling::Undoubled => "",
            Doubling::Doubled => "X",
            Doubling::Redoubled => "XX",
        }
    }
}

/// The final contract of a completed auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Contract {
    pub level: u8,
    pub strain: Strain,
    pub doubling: Doubling,
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.level, self.strain, self.doubling.suffix())
    }
}

/// Outcome of resolving an auction.
///
/// A passed-out board is a valid terminal state, not an error: there is no
/// contract and no declarer, and the dealer is only known when it was
/// supplied or some token (even a pass) anchored the inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    PassOut {
        dealer: Option<Seat>,
    },
    Contract {
        dealer: Seat,
        contract: Contract,
        declarer: Seat,
    },
}

impl Resolution {
    pub fn contract(&self) -> Option<Contract> {
        match self {
            Resolution::Contract { contract, .. } => Some(*contract),
            Resolution::PassOut { .. } => None,
        }
    }

    pub fn declarer(&self) -> Option<Seat> {
        match self {
            Resolution::Contract { declarer, .. } => Some(*declarer),
            Resolution::PassOut { .. } => None,
        }
    }

    pub fn dealer(&self) -> Option<Seat> {
        match self {
            Resolution::Contract { dealer, .. } => Some(*dealer),
            Resolution::PassOut { dealer } => *dealer,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuctionError {
    /// A token matched no recognized bid grammar. Carries the offending
    /// token and its position so batch callers can report and skip.
    #[error("unrecognized bid {token:?} at position {index}")]
    UnparseableBid { token: String, index: usize },
}

/// Split an auction string from the CSV into bid tokens.
///
/// Removes the `|` row separators the scraper writes between table rows and
/// compresses whitespace.
pub fn tokenize_auction(auction: &str) -> Vec<String> {
    auction
        .split(|c: char| c.is_whitespace() || c == '|')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolve an auction into dealer, contract, and declarer.
///
/// `tokens` is the flattened auction. When `dealer` is supplied, index 0 is
/// the dealer's seat. When it is `None`, the tokens are table-ordered
/// starting at West and the dealer is inferred as the seat of the first
/// non-blank token; blank leading cells are exactly the seats ahead of the
/// dealer, so inference and seat arithmetic use the same index → seat map.
pub fn resolve_auction<S: AsRef<str>>(
    tokens: &[S],
    dealer: Option<Seat>,
) -> Result<Resolution, AuctionError> {
    // Trailing blank cells pad out the last table row.
    let mut end = tokens.len();
    while end > 0 && tokens[end - 1].as_ref().trim().is_empty() {
        end -= 1;
    }
    let tokens = &tokens[..end];

    // Parse every cell up front so a malformed token is reported with its
    // position instead of surfacing later as a wrong contract.
    let mut slots: Vec<Option<Bid>> = Vec::with_capacity(tokens.len());
    for (index, raw) in tokens.iter().enumerate() {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            slots.push(None);
            continue;
        }
        let bid = raw.parse::<Bid>().map_err(|_| AuctionError::UnparseableBid {
            token: raw.to_string(),
            index,
        })?;
        slots.push(Some(bid));
    }

    let origin = dealer.unwrap_or(Seat::West);
    let seat_at = |index: usize| origin.advance(index);

    let dealer = match dealer {
        Some(d) => Some(d),
        None => slots.iter().position(Option::is_some).map(seat_at),
    };

    // The contract is the last level+strain bid; everything after it is
    // passes and doubling.
    let contract_index = slots
        .iter()
        .rposition(|s| matches!(s, Some(b) if b.is_contract()));
    let Some(i) = contract_index else {
        return Ok(Resolution::PassOut { dealer });
    };
    let Some(dealer) = dealer else {
        return Ok(Resolution::PassOut { dealer: None });
    };
    let (level, strain) = match slots[i] {
        Some(Bid::Contract { level, strain }) => (level, strain),
        _ => unreachable!("contract_index points at a contract bid"),
    };

    let mut doubling = match slots.get(i + 1) {
        Some(Some(Bid::Double)) => Doubling::Doubled,
        Some(Some(Bid::Redouble)) => Doubling::Redoubled,
        _ => Doubling::Undoubled,
    };
    // A double that closes the auction ("double pass pass pass") also marks
    // the contract doubled. This can only upgrade an undoubled contract; it
    // never stacks onto a doubling already seen at i+1.
    if doubling == Doubling::Undoubled && has_closing_double(&slots) {
        doubling = Doubling::Doubled;
    }

    // Declarer: the first member of the winning partnership to name the
    // contract strain. Partnerships alternate, so equal index parity means
    // same side.
    let contract_seat = seat_at(i);
    let mut declarer = contract_seat;
    for j in (0..i).filter(|j| j % 2 == i % 2) {
        if slots[j].and_then(|b| b.strain()) == Some(strain) {
            declarer = seat_at(j);
            break;
        }
    }

    Ok(Resolution::Contract {
        dealer,
        contract: Contract {
            level,
            strain,
            doubling,
        },
        declarer,
    })
}

/// True when a double is followed by the three passes that end the auction.
fn has_closing_double(slots: &[Option<Bid>]) -> bool {
    let bids: Vec<Bid> = slots.iter().filter_map(|s| *s).collect();
    bids.windows(4)
        .any(|w| matches!(w, [Bid::Double, Bid::Pass, Bid::Pass, Bid::Pass]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(tokens: &[&str], dealer: Option<Seat>) -> Resolution {
        resolve_auction(tokens, dealer).unwrap()
    }

    #[test]
    fn test_contract_is_last_level_bid() {
        let r = resolve(
            &["pass", "1S", "pass", "2S", "pass", "4S", "pass", "pass", "pass"],
            Some(Seat::West),
        );
        let contract = r.contract().unwrap();
        assert_eq!(contract.level, 4);
        assert_eq!(contract.strain, Strain::Spades);
        assert_eq!(contract.doubling, Doubling::Undoubled);
        assert_eq!(contract.to_string(), "4S");
        // North opened spades, so North declares even though North also
        // made the final bid here.
        assert_eq!(r.declarer(), Some(Seat::North));
    }

    #[test]
    fn test_pass_out() {
        let r = resolve(&["pass", "pass", "pass", "pass"], Some(Seat::North));
        assert_eq!(r.contract(), None);
        assert_eq!(r.declarer(), None);
        assert_eq!(r.dealer(), Some(Seat::North));
    }

    #[test]
    fn test_empty_auction_is_pass_out_without_dealer() {
        let r = resolve(&[], None);
        assert_eq!(r, Resolution::PassOut { dealer: None });
        let r = resolve(&["", "  ", ""], None);
        assert_eq!(r, Resolution::PassOut { dealer: None });
    }

    #[test]
    fn test_closing_double_marks_contract_doubled() {
        let r = resolve(
            &["1S", "pass", "pass", "double", "pass", "pass", "pass"],
            Some(Seat::North),
        );
        assert_eq!(r.contract().unwrap().to_string(), "1SX");
        assert_eq!(r.declarer(), Some(Seat::North));
    }

    #[test]
    fn test_immediate_double_not_stacked() {
        // The double sits at i+1 *and* forms the closing pattern; the
        // contract is doubled once, not twice.
        let r = resolve(
            &["1S", "double", "pass", "pass", "pass"],
            Some(Seat::North),
        );
        assert_eq!(r.contract().unwrap().to_string(), "1SX");
    }

    #[test]
    fn test_redouble() {
        let r = resolve(
            &["1S", "double", "redouble", "pass", "pass", "pass"],
            Some(Seat::North),
        );
        assert_eq!(r.contract().unwrap().doubling, Doubling::Redoubled);
        assert_eq!(r.contract().unwrap().to_string(), "1SXX");
    }

    #[test]
    fn test_partnership_first_bidder_declares() {
        // North opens 1C, South bids 1S, North rebids 2C: clubs belong to
        // North, who bid them first for the partnership.
        let r = resolve(
            &["1C", "pass", "1S", "pass", "2C", "pass", "pass", "pass"],
            Some(Seat::North),
        );
        let contract = r.contract().unwrap();
        assert_eq!(contract.strain, Strain::Clubs);
        assert_eq!(r.declarer(), Some(Seat::North));
    }

    #[test]
    fn test_final_bid_sets_strain() {
        // Nobody bid hearts before the final 4H, so the final bidder
        // declares.
        let r = resolve(
            &["1C", "pass", "1S", "pass", "4H", "pass", "pass", "pass"],
            Some(Seat::North),
        );
        assert_eq!(r.declarer(), Some(Seat::North));

        // Same idea from a different dealer: South jumps to 4H over
        // partner's 1C and declares it.
        let r = resolve(
            &["pass", "1C", "pass", "4H", "pass", "pass", "pass"],
            Some(Seat::West),
        );
        assert_eq!(r.declarer(), Some(Seat::South));
    }

    #[test]
    fn test_dealer_inference_from_table_order() {
        // Table order starts at West; two passes before the 1NT put the
        // bid in East's column, and the dealer two seats earlier at West.
        let r = resolve(&["pass", "pass", "1NT", "pass", "pass", "pass"], None);
        assert_eq!(r.dealer(), Some(Seat::West));
        assert_eq!(r.declarer(), Some(Seat::East));
        assert_eq!(r.contract().unwrap().to_string(), "1NT");
    }

    #[test]
    fn test_dealer_inference_skips_leading_blanks() {
        // Blank cells for West: North dealt and opened.
        let r = resolve(&["", "1S", "pass", "2S", "pass", "pass", "pass", ""], None);
        assert_eq!(r.dealer(), Some(Seat::North));
        assert_eq!(r.declarer(), Some(Seat::North));
        assert_eq!(r.contract().unwrap().to_string(), "2S");
    }

    #[test]
    fn test_unparseable_bid_is_reported_with_position() {
        let err = resolve_auction(&["1Z", "pass", "pass", "pass"], Some(Seat::North))
            .unwrap_err();
        assert_eq!(
            err,
            AuctionError::UnparseableBid {
                token: "1Z".to_string(),
                index: 0,
            }
        );
    }

    #[test]
    fn test_bid_grammar() {
        assert_eq!("pass".parse::<Bid>(), Ok(Bid::Pass));
        assert_eq!("Pass".parse::<Bid>(), Ok(Bid::Pass));
        assert_eq!("X".parse::<Bid>(), Ok(Bid::Double));
        assert_eq!("double".parse::<Bid>(), Ok(Bid::Double));
        assert_eq!("XX".parse::<Bid>(), Ok(Bid::Redouble));
        assert_eq!(
            "1NT".parse::<Bid>(),
            Ok(Bid::Contract {
                level: 1,
                strain: Strain::NoTrump
            })
        );
        // The bidding analyzer writes notrump bids as "1N".
        assert_eq!(
            "1n".parse::<Bid>(),
            Ok(Bid::Contract {
                level: 1,
                strain: Strain::NoTrump
            })
        );
        assert!("8S".parse::<Bid>().is_err());
        assert!("0NT".parse::<Bid>().is_err());
        assert!("1Z".parse::<Bid>().is_err());
        assert!("".parse::<Bid>().is_err());
    }

    #[test]
    fn test_tokenize_auction() {
        assert_eq!(
            tokenize_auction("pass 1S pass 2S | pass 4S pass pass | pass"),
            vec!["pass", "1S", "pass", "2S", "pass", "4S", "pass", "pass", "pass"]
        );
        assert!(tokenize_auction("").is_empty());
    }

    #[test]
    fn test_seat_rotation() {
        assert_eq!(Seat::West.next(), Seat::North);
        assert_eq!(Seat::North.advance(3), Seat::West);
        assert_eq!(Seat::South.partner(), Seat::North);
        assert_eq!(Seat::South.lho(), Seat::West);
        assert_eq!("north".parse::<Seat>(), Ok(Seat::North));
        assert_eq!("W".parse::<Seat>(), Ok(Seat::West));
    }
}
