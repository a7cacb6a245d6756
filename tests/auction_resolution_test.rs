//! Auction reconstruction invariants
//!
//! Exercises the resolver through the public API with the auction shapes
//! that historically broke the conversion pipeline: pass-outs, closing
//! doubles, partnership declarer transfer, and dealer inference from
//! table-ordered cells.

use bridge_lesson_toolkit::auction::AuctionError;
use bridge_lesson_toolkit::{resolve_auction, Doubling, Resolution, Seat, Strain};

#[test]
fn contract_strain_is_last_level_bid() {
    // For any auction closed by three passes, the resolved strain is the
    // strain of the last level bid, never a double's.
    let auctions: [(&[&str], Strain); 3] = [
        (
            &["1S", "pass", "2S", "pass", "pass", "pass"],
            Strain::Spades,
        ),
        (
            &["1C", "pass", "1H", "pass", "3NT", "pass", "pass", "pass"],
            Strain::NoTrump,
        ),
        (
            &["1D", "double", "redouble", "pass", "pass", "pass"],
            Strain::Diamonds,
        ),
    ];
    for (tokens, strain) in auctions {
        let r = resolve_auction(tokens, Some(Seat::North)).unwrap();
        assert_eq!(r.contract().unwrap().strain, strain, "{:?}", tokens);
    }
}

#[test]
fn pass_out_has_no_contract_and_no_declarer() {
    let r = resolve_auction(&["pass", "pass", "pass", "pass"], Some(Seat::North)).unwrap();
    assert_eq!(r.contract(), None);
    assert_eq!(r.declarer(), None);
    assert_eq!(r.dealer(), Some(Seat::North));
}

#[test]
fn closing_double_yields_doubled_contract() {
    let r = resolve_auction(
        &["1S", "pass", "pass", "double", "pass", "pass", "pass"],
        Some(Seat::North),
    )
    .unwrap();
    let contract = r.contract().unwrap();
    assert_eq!(contract.to_string(), "1SX");
    assert_eq!(contract.doubling, Doubling::Doubled);
    assert_eq!(r.declarer(), Some(Seat::North));
}

#[test]
fn declarer_is_first_partner_to_name_the_strain() {
    // North opens 1C, South responds 1S, North rebids 2C: the club
    // contract belongs to North even though the final bid is North's
    // rebid; had South bid clubs first, it would be South's.
    let r = resolve_auction(
        &["1C", "pass", "1S", "pass", "2C", "pass", "pass", "pass"],
        Some(Seat::North),
    )
    .unwrap();
    let contract = r.contract().unwrap();
    assert_eq!(contract.strain, Strain::Clubs);
    assert_eq!(r.declarer(), Some(Seat::North));

    // The final bid introduces a brand-new strain: its bidder declares.
    let r = resolve_auction(
        &["1C", "pass", "1S", "pass", "4H", "pass", "pass", "pass"],
        Some(Seat::North),
    )
    .unwrap();
    assert_eq!(r.declarer(), Some(Seat::North));
}

#[test]
fn dealer_is_inferred_from_table_position() {
    // No dealer hint: tokens are table cells starting at West. The two
    // passes before 1NT put the bid two seats after the dealer.
    let r = resolve_auction(&["pass", "pass", "1NT", "pass", "pass", "pass"], None).unwrap();
    assert_eq!(r.dealer(), Some(Seat::West));
    assert_eq!(r.declarer(), Some(Seat::East));

    // Leading blank cells shift the dealer instead.
    let r = resolve_auction(&["", "1NT", "pass", "pass", "pass"], None).unwrap();
    assert_eq!(r.dealer(), Some(Seat::North));
    assert_eq!(r.declarer(), Some(Seat::North));
}

#[test]
fn malformed_bid_is_reported_not_guessed() {
    let err = resolve_auction(&["1Z", "pass", "pass", "pass"], Some(Seat::North)).unwrap_err();
    assert_eq!(
        err,
        AuctionError::UnparseableBid {
            token: "1Z".to_string(),
            index: 0,
        }
    );

    // The bad token's position survives leading good tokens.
    let err = resolve_auction(
        &["1S", "pass", "2x3", "pass", "pass", "pass"],
        Some(Seat::North),
    )
    .unwrap_err();
    assert_eq!(
        err,
        AuctionError::UnparseableBid {
            token: "2x3".to_string(),
            index: 2,
        }
    );
}

#[test]
fn empty_auction_is_a_pass_out_without_dealer() {
    assert_eq!(
        resolve_auction::<&str>(&[], None).unwrap(),
        Resolution::PassOut { dealer: None }
    );
    assert_eq!(
        resolve_auction(&["", "", ""], None).unwrap(),
        Resolution::PassOut { dealer: None }
    );
}
