//! Engine configuration: resource limits and per-component options.

use serde::Serialize;

/// Caps that keep every potentially unbounded search finite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limits {
    /// Step budget for PDA and TM simulation.
    pub max_steps: usize,
    /// Upper bound on states produced by subset construction.
    pub max_dfa_states: usize,
    /// Derivation steps explored by the comparator.
    pub max_derivation_depth: usize,
    /// Longest terminal string the comparator keeps.
    pub max_string_length: usize,
    /// Largest comparator frontier before giving up.
    pub max_sentential_forms: usize,
    /// Inputs up to this length are used to probe a TM for boundedness.
    pub tm_probe_length: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 10_000,
            max_dfa_states: 1_000,
            max_derivation_depth: 5,
            max_string_length: 8,
            max_sentential_forms: 100_000,
            tm_probe_length: 3,
        }
    }
}

/// Options for the grammar text parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Overrides the start symbol (defaults to the first rule's left-hand side).
    pub start: Option<String>,
    /// Spellings accepted for the empty string.
    pub epsilon_tokens: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            start: None,
            epsilon_tokens: vec!["ε".to_string(), "λ".to_string(), "epsilon".to_string()],
        }
    }
}

impl ParseOptions {
    pub fn with_start(start: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            ..Self::default()
        }
    }
}

/// How much of the classification trace is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ClassifierMode {
    /// Record every rule evaluation, passing or failing.
    #[default]
    Explain,
    /// Record failing evaluations only.
    Brief,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionOptions {
    /// Add an explicit dead state so the DFA transition function is total.
    pub complete_dfa: bool,
    /// Skip the minimisation stage.
    pub skip_minimization: bool,
}
