// ABOUTME: Core library for parsing and rolling tabletop RPG die-roll specifications.
// ABOUTME: Provides the expression engine, the DieRoller, structured descriptions, presets and simulation.

//! # Diceroll
//!
//! A die-roll specification language for tabletop RPGs.
//!
//! ## Quick Start
//!
//! ```
//! use diceroll::{roll, simulate};
//!
//! // Roll a titled attack with a critical confirmation and a DC
//! let (title, results) = roll("Attack=d20 + 5 | c19 | dc 15").unwrap();
//! assert_eq!(title, "Attack");
//! for result in &results {
//!     println!("{}", result);  // e.g., "17 = 1d20 [12] + 5 | c19 | dc 15 (exceeded by 2) ** HIT **"
//! }
//!
//! // Simulate probability distribution
//! let sim = simulate("3d6", 10000).unwrap();
//! println!("Mean: {:.2}", sim.mean);  // ~10.5
//! ```
//!
//! ## Supported Notation
//!
//! - Die groups: `d20`, `3d6`, `2d%`, `>1d20` (first die maximized), `1/2d8` (halved)
//! - Per-die bonus and rerolls: `3d6 +1 per die`, `d20 best of 2`, `4d6 worst of 3`
//! - Arithmetic: `2d6 + 5`, `(1d6 + 2) * 3`, `d20 // 2`, `d20 <= 15`, `d6 >= 2`
//! - Labels: `d8 slashing + 2 str`
//! - Titles and permutations: `Attack=d20 + {5/3/1}`
//! - Global modifiers: `| min N`, `| max N`, `| c[threat][±bonus]`, `| dc N`,
//!   `| sf [success[/fail]]`, `| repeat N`, `| until N`, `| !` / `| maximized`
//! - Percentile checks: `42% hit/miss`

pub mod ast;
pub mod describe;
pub mod dice;
pub mod error;
pub mod lexer;
pub mod modifiers;
pub mod parser;
pub mod permute;
pub mod preset;
pub mod roller;
pub mod sim;
mod stack;

pub use ast::{Component, Constant, DieGroup, Op, Reroll, Selector};
pub use describe::{StructuredDescription, StructuredDescriptionSet, StructuredResult, Tag};
pub use dice::{Dice, Evaluation, Natural};
pub use error::{Error, Result};
pub use modifiers::Specification;
pub use preset::{read_preset_file, write_preset_file, DieRollPreset, PresetMetadata};
pub use roller::{DieRoller, FastRng, Rng, MAX_ATTEMPTS};
pub use sim::{simulate, simulate_seeded, SimResult};

/// Roll a full specification in one step.
///
/// Returns the title and one result per elementary roll.
///
/// # Examples
///
/// ```
/// let (title, results) = diceroll::roll("Damage=2d6 + 3 | repeat 2").unwrap();
/// assert_eq!(title, "Damage");
/// assert_eq!(results.len(), 2);
/// ```
pub fn roll(spec: &str) -> Result<(String, Vec<StructuredResult>)> {
    DieRoller::new().do_roll(spec)
}

/// Roll a full specification with a custom RNG.
///
/// Useful for testing or when you need reproducible results.
///
/// # Examples
///
/// ```
/// use diceroll::{roll_with_rng, FastRng};
///
/// let mut rng = FastRng::with_seed(42);
/// let (_, results) = roll_with_rng("2d6", &mut rng).unwrap();
/// ```
pub fn roll_with_rng(spec: &str, rng: &mut impl Rng) -> Result<(String, Vec<StructuredResult>)> {
    DieRoller::with_rng(rng).do_roll(spec)
}

/// Roll a specification that must produce exactly one result.
///
/// Fails with [`Error::MultipleResults`] for repeats, permutations, or a
/// confirmation roll.
///
/// ```
/// let (_, result) = diceroll::roll_once("d20 + 4").unwrap();
/// assert!((5..=24).contains(&result.total));
/// ```
pub fn roll_once(spec: &str) -> Result<(String, StructuredResult)> {
    DieRoller::new().roll_once(spec)
}

/// Parse a dice expression without rolling.
///
/// Accepts trailing `| min N` and `| max N` clauses but no other modifiers.
///
/// # Examples
///
/// ```
/// use diceroll::Component;
///
/// let dice = diceroll::parse("4d6 best of 2 | min 8").unwrap();
/// assert_eq!(dice.min, Some(8));
/// match &dice.components()[0] {
///     Component::Die(group) => {
///         assert_eq!(group.numerator, 4);
///         assert_eq!(group.sides, 6);
///     }
///     _ => panic!("Expected a die group"),
/// }
/// ```
pub fn parse(input: &str) -> Result<Dice> {
    parser::parse(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_roll_basic() {
        let (_, results) = roll("2d6").unwrap();
        assert!(results[0].total >= 2 && results[0].total <= 12);
    }

    #[test]
    fn test_roll_expression() {
        let (_, results) = roll("2d6 + 5").unwrap();
        assert!(results[0].total >= 7 && results[0].total <= 17);
    }

    #[test]
    fn test_roll_seeded() {
        let mut rng = FastRng::with_seed(42);
        let (_, first) = roll_with_rng("2d6 | repeat 5", &mut rng).unwrap();

        let mut rng = FastRng::with_seed(42);
        let (_, second) = roll_with_rng("2d6 | repeat 5", &mut rng).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_roll_once_rejects_repeats() {
        assert!(matches!(roll_once("d6 | repeat 3"), Err(Error::MultipleResults(3))));
        assert!(roll_once("d6").is_ok());
    }

    #[test]
    fn test_errors_surface() {
        assert!(matches!(roll("2d0"), Err(Error::InvalidDie(0))));
        assert!(matches!(roll("d6 // 0"), Err(Error::DivisionByZero)));
        assert!(matches!(roll("(d6"), Err(Error::UnbalancedGroup)));
        assert!(matches!(roll("d6 | frob"), Err(Error::UnknownModifier(_))));
    }

    #[test]
    fn test_invalid_request_result() {
        let err = roll("d6 +").unwrap_err();
        let result = StructuredResult::invalid_request(&err);
        assert!(result.invalid);
        assert!(result.details.contains(Tag::Error));
    }

    #[test]
    fn test_simulate_integration() {
        let result = simulate("2d6", 1000).unwrap();
        assert!(result.min >= 2);
        assert!(result.max <= 12);
        assert!((result.mean - 7.0).abs() < 0.5);
    }

    #[test]
    fn test_many_rolls_cover_range() {
        let mut rng = FastRng::with_seed(2024);
        for (n, s) in [(1u32, 2u32), (1, 6), (1, 20), (2, 6), (3, 8), (4, 10), (10, 100), (5, 1)] {
            let dice = parse(&format!("{}d{}", n, s)).unwrap();
            let mut seen = std::collections::HashSet::new();
            for _ in 0..10_000 {
                let total = dice.roll(&mut rng).unwrap().total;
                assert!((n as i64..=(n * s) as i64).contains(&total), "{}d{} rolled {}", n, s, total);
                seen.insert(total);
            }
            if s > 1 {
                assert!(seen.len() > 1, "{}d{} never varied", n, s);
                assert!(seen.contains(&(n as i64)) || n > 2, "{}d{} never rolled its minimum", n, s);
            } else {
                assert_eq!(seen.len(), 1);
            }
        }
    }

    fn term_strategy() -> impl Strategy<Value = String> {
        let label = prop::sample::select(vec!["", " fire", " cold damage", " str"]);
        prop_oneof![
            (1u32..6, 1u32..30, label.clone()).prop_map(|(n, s, l)| format!("{}d{}{}", n, s, l)),
            (1u32..4, 2u32..12, 1i64..3).prop_map(|(n, s, b)| format!("{}d{} +{} per die", n, s, b)),
            (1u32..3, 2u32..20, 2u32..4).prop_map(|(n, s, k)| format!("{}d{} best of {}", n, s, k)),
            (0u32..100, label).prop_map(|(c, l)| format!("{}{}", c, l)),
        ]
    }

    fn expr_strategy() -> impl Strategy<Value = String> {
        let op = prop::sample::select(vec![" + ", " - ", " * ", " >= ", " <= "]);
        (term_strategy(), prop::collection::vec((op, term_strategy()), 0..4)).prop_map(
            |(first, rest)| {
                rest.into_iter().fold(first, |mut acc, (op, term)| {
                    acc.push_str(op);
                    acc.push_str(&term);
                    acc
                })
            },
        )
    }

    proptest! {
        #[test]
        fn test_dice_total_within_range(n in 1u32..12, s in 1u32..100, seed in any::<u64>()) {
            let dice = parse(&format!("{}d{}", n, s)).unwrap();
            let total = dice.roll(&mut FastRng::with_seed(seed)).unwrap().total;

            prop_assert!(total >= n as i64);
            prop_assert!(total <= (n * s) as i64);
        }

        #[test]
        fn test_maximized_total(n in 1u32..12, s in 1u32..100) {
            let dice = parse(&format!("{}d{}", n, s)).unwrap();
            prop_assert_eq!(dice.max_roll().unwrap().total, (n * s) as i64);
        }

        #[test]
        fn test_description_round_trip(expr in expr_strategy()) {
            let dice = parse(&expr).unwrap();
            let text = dice.describe(None).text();
            let reparsed = parse(&text).unwrap();

            prop_assert_eq!(reparsed, dice);
        }

        #[test]
        fn test_same_seed_same_results(expr in expr_strategy(), seed in any::<u64>()) {
            let mut a = DieRoller::with_rng(FastRng::with_seed(seed));
            let mut b = DieRoller::with_rng(FastRng::with_seed(seed));

            prop_assert_eq!(a.do_roll(&expr).unwrap(), b.do_roll(&expr).unwrap());
        }
    }
}
