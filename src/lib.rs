//! Grammar and automata analysis: Chomsky classification, automaton analysis
//! and simulation, regex to grammar conversion and bounded grammar and automaton comparison.

pub mod analyzer;
pub mod automaton;
pub mod bnf;
pub mod cfg;
pub mod classifier;
pub mod compare;
pub mod config;
pub mod convert;
pub mod generator;
pub mod grammar;
pub mod regex;

pub use analyzer::{AutomatonAnalysis, analyze_automaton, analyze_automaton_with};
pub use automaton::{
    Automaton, AutomatonKind, MalformedAutomatonError, parse_automaton,
    simulate::{SimulationError, Verdict, simulate, simulate_with},
};
pub use bnf::{MalformedGrammarError, parse_grammar, parse_grammar_with};
pub use cfg::{Grammar, Production, Symbol};
pub use classifier::{ChomskyType, ClassificationResult, classify_grammar};
pub use compare::{
    AutomatonComparison, ComparisonError, ComparisonResult, compare_automata,
    compare_automata_with, compare_grammars, compare_grammars_with,
};
pub use config::{ClassifierMode, ConversionOptions, Limits, ParseOptions};
pub use convert::{
    ConversionError, ConversionTrace, convert_regex_to_grammar, convert_regex_to_grammar_with,
};
pub use generator::{Difficulty, generate_example};
pub use regex::InvalidRegexError;
