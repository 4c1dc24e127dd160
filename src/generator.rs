//! Fixed example grammars for each level of the hierarchy.

use std::{fmt, str::FromStr};

use eyre::Result;
use serde::Serialize;
use tracing::debug;

use crate::{bnf::parse_grammar, cfg::Grammar, classifier::ChomskyType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Difficulty {
    Simple,
    Medium,
    Complex,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Simple, Difficulty::Medium, Difficulty::Complex];
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Difficulty::Simple => "simple",
            Difficulty::Medium => "medium",
            Difficulty::Complex => "complex",
        };
        write!(f, "{text}")
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        match text.to_ascii_lowercase().as_str() {
            "simple" | "easy" => Ok(Difficulty::Simple),
            "medium" => Ok(Difficulty::Medium),
            "complex" | "hard" => Ok(Difficulty::Complex),
            other => Err(format!(
                "unknown difficulty '{other}', expected simple, medium or complex"
            )),
        }
    }
}

fn template(chomsky_type: ChomskyType, difficulty: Difficulty) -> &'static str {
    match (chomsky_type, difficulty) {
        // a*b
        (ChomskyType::Regular, Difficulty::Simple) => "S -> aS | b",
        // a*b+a
        (ChomskyType::Regular, Difficulty::Medium) => "S -> aS | bA\nA -> bA | a",
        // binary numbers divisible by three, read most significant bit first
        (ChomskyType::Regular, Difficulty::Complex) => {
            "S -> 0S | 1A | ε\nA -> 0B | 1S\nB -> 0A | 1B"
        }

        (ChomskyType::ContextFree, Difficulty::Simple) => "S -> aSb | ab",
        // balanced parentheses
        (ChomskyType::ContextFree, Difficulty::Medium) => "S -> ( S ) S | ε",
        (ChomskyType::ContextFree, Difficulty::Complex) => {
            "E -> E + T | T\nT -> T * F | F\nF -> ( E ) | \"id\""
        }

        // a^n b^n c^n, non-contracting form
        (ChomskyType::ContextSensitive, Difficulty::Simple) => {
            "S -> aSBC | aBC\nCB -> BC\naB -> ab\nbB -> bb\nbC -> bc\ncC -> cc"
        }
        // a^n b^n c^n d^n
        (ChomskyType::ContextSensitive, Difficulty::Medium) => {
            "S -> aSBCD | aBCD\nDB -> BD\nDC -> CD\nCB -> BC\n\
             aB -> ab\nbB -> bb\nbC -> bc\ncC -> cc\ncD -> cd\ndD -> dd"
        }
        // a^n b^n c^n, every rule rewriting a single symbol in context
        (ChomskyType::ContextSensitive, Difficulty::Complex) => {
            "S -> aSBC | aBC\nCB -> CZ\nCZ -> WZ\nWZ -> WC\nWC -> BC\n\
             aB -> ab\nbB -> bb\nbC -> bc\ncC -> cc"
        }

        (ChomskyType::Unrestricted, Difficulty::Simple) => "S -> A B\nA B -> a\nA -> a\nB -> b",
        // a^n b^m with m <= n, the erasing rule deletes one b at a time
        (ChomskyType::Unrestricted, Difficulty::Medium) => "S -> aSb | E\nE b -> E\nE -> ε",
        // a^n b^n c^m with m <= n
        (ChomskyType::Unrestricted, Difficulty::Complex) => {
            "S -> aSBC | aBC\nCB -> BC\naB -> ab\nbB -> bb\nbC -> bc\ncC -> cc\nC -> ε"
        }
    }
}

/// Parses the fixed template for `chomsky_type` at the given difficulty.
pub fn generate_example(chomsky_type: ChomskyType, difficulty: Difficulty) -> Result<Grammar> {
    debug!(%chomsky_type, %difficulty, "generating example grammar");
    parse_grammar(template(chomsky_type, difficulty))
}

#[cfg(test)]
mod generator_test {
    use super::*;
    use crate::classifier::classify_grammar;
    use pretty_assertions::assert_eq;

    const TYPES: [ChomskyType; 4] = [
        ChomskyType::Regular,
        ChomskyType::ContextFree,
        ChomskyType::ContextSensitive,
        ChomskyType::Unrestricted,
    ];

    #[test]
    fn test_every_template_classifies_as_requested() {
        for chomsky_type in TYPES {
            for difficulty in Difficulty::ALL {
                let grammar = generate_example(chomsky_type, difficulty).unwrap();
                assert_eq!(
                    classify_grammar(&grammar).chomsky_type,
                    chomsky_type,
                    "{difficulty} example for {chomsky_type}"
                );
            }
        }
    }

    #[test]
    fn test_templates_are_distinct() {
        for chomsky_type in TYPES {
            let simple = generate_example(chomsky_type, Difficulty::Simple).unwrap();
            let complex = generate_example(chomsky_type, Difficulty::Complex).unwrap();
            assert_ne!(simple, complex);
        }
    }

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!("Medium".parse::<Difficulty>(), Ok(Difficulty::Medium));
        assert_eq!("hard".parse::<Difficulty>(), Ok(Difficulty::Complex));
        assert!("extreme".parse::<Difficulty>().is_err());
    }
}
