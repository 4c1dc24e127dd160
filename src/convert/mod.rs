use std::{collections::BTreeMap, fmt};

use eyre::{Report, Result};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    automaton::Automaton,
    cfg::{Grammar, Production, Symbol},
    config::{ConversionOptions, Limits},
    regex::Regex,
};

pub mod subset;
pub mod thompson;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    StateLimitExceeded { limit: usize },
    EmptyLanguage,
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateLimitExceeded { limit } => write!(
                f,
                "Error: subset construction needs more than {limit} DFA states"
            ),
            Self::EmptyLanguage => write!(
                f,
                "Error: the automaton accepts nothing, so there is no grammar to build"
            ),
        }
    }
}

impl std::error::Error for ConversionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StageKind {
    Parse,
    Thompson,
    Subset,
    Minimize,
    Grammar,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Parse => "regular expression",
            StageKind::Thompson => "NFA (Thompson construction)",
            StageKind::Subset => "DFA (subset construction)",
            StageKind::Minimize => "minimal DFA",
            StageKind::Grammar => "regular grammar",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Artifact {
    Regex(Regex),
    Automaton(Automaton),
    Grammar(Grammar),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionStage {
    pub kind: StageKind,
    pub artifact: Artifact,
    pub rendered: String,
    pub explanation: String,
}

impl ConversionStage {
    fn new(kind: StageKind, artifact: Artifact, explanation: String) -> Self {
        let rendered = match &artifact {
            Artifact::Regex(regex) => regex.to_string(),
            Artifact::Automaton(automaton) => automaton.to_string(),
            Artifact::Grammar(grammar) => grammar.to_string(),
        };
        debug!(stage = ?kind, "conversion stage done");
        ConversionStage {
            kind,
            artifact,
            rendered,
            explanation,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversionTrace {
    /// The expression in canonical form.
    pub regex: String,
    pub stages: Vec<ConversionStage>,
}

impl ConversionTrace {
    pub fn get_stage(&self, kind: StageKind) -> Option<&ConversionStage> {
        self.stages.iter().find(|stage| stage.kind == kind)
    }

    pub fn get_automaton(&self, kind: StageKind) -> Option<&Automaton> {
        match self.get_stage(kind).map(|stage| &stage.artifact) {
            Some(Artifact::Automaton(automaton)) => Some(automaton),
            _ => None,
        }
    }

    /// The last DFA of the pipeline, minimal unless minimisation was skipped.
    pub fn get_dfa(&self) -> Option<&Automaton> {
        self.get_automaton(StageKind::Minimize)
            .or_else(|| self.get_automaton(StageKind::Subset))
    }

    pub fn get_grammar(&self) -> Option<&Grammar> {
        match self.stages.last().map(|stage| &stage.artifact) {
            Some(Artifact::Grammar(grammar)) => Some(grammar),
            _ => None,
        }
    }
}

/// Right-linear grammar of a DFA: `X -> a Y` per transition and `X -> ε` per
/// accepting state, started at the initial state. States that cannot reach
/// acceptance contribute nothing and are left out.
pub fn dfa_to_grammar(dfa: &Automaton) -> Result<Grammar> {
    let live = subset::co_reachable(dfa);
    let initial = dfa.get_initial_states();
    let Some(start) = initial.first().filter(|state| live.contains(**state)) else {
        return Err(Report::new(ConversionError::EmptyLanguage));
    };

    let mut productions = Vec::new();
    for state in dfa.get_states() {
        if !live.contains(state.name.as_str()) {
            continue;
        }
        for transition in dfa.transitions_from(&state.name) {
            for target in transition.to.iter().filter(|to| live.contains(to.as_str())) {
                productions.push(Production::new(
                    vec![Symbol::non_terminal(&state.name)],
                    vec![
                        Symbol::terminal(transition.get_symbol()),
                        Symbol::non_terminal(target),
                    ],
                ));
            }
        }
        if state.accepting {
            productions.push(Production::new(
                vec![Symbol::non_terminal(&state.name)],
                vec![],
            ));
        }
    }

    let grammar = Grammar::new(*start, productions)?;
    Ok(grammar)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Converter {
    limits: Limits,
    options: ConversionOptions,
}

impl Converter {
    pub fn new(limits: Limits, options: ConversionOptions) -> Self {
        Converter { limits, options }
    }

    pub fn convert(&self, text: &str) -> Result<ConversionTrace> {
        let regex = Regex::parse(text).map_err(Report::new)?;
        let canonical = regex.to_string();
        let mut stages = Vec::new();

        let nfa = thompson::regex_to_nfa(&regex)?;
        let alphabet_size = regex.get_alphabet().len();
        stages.push(ConversionStage::new(
            StageKind::Parse,
            Artifact::Regex(regex),
            format!("parsed {canonical:?} over an alphabet of {alphabet_size} symbol(s)"),
        ));

        let epsilon_moves = nfa
            .get_transitions()
            .iter()
            .filter(|transition| transition.is_epsilon())
            .count();
        let thompson_explanation = format!(
            "each operator became a fixed fragment joined by epsilon moves: {} states, {epsilon_moves} epsilon moves",
            nfa.get_states().len()
        );
        stages.push(ConversionStage::new(
            StageKind::Thompson,
            Artifact::Automaton(nfa.clone()),
            thompson_explanation,
        ));

        let subsets = subset::nfa_to_dfa(&nfa, self.options.complete_dfa, self.limits.max_dfa_states)?;
        let mut subset_explanation = format!(
            "each DFA state is the epsilon-closure of a set of NFA states: {}",
            subsets
                .subsets
                .iter()
                .enumerate()
                .map(|(idx, set)| {
                    let members: Vec<&str> = set.iter().map(String::as_str).collect();
                    format!("D{idx} = {{{}}}", members.join(", "))
                })
                .collect::<Vec<_>>()
                .join("; ")
        );
        if subsets.subsets.iter().any(|set| set.is_empty()) {
            subset_explanation.push_str("; the empty set is the dead state");
        }
        let mut dfa = subsets.dfa;
        stages.push(ConversionStage::new(
            StageKind::Subset,
            Artifact::Automaton(dfa.clone()),
            subset_explanation,
        ));

        if !self.options.skip_minimization {
            let minimal = subset::minimize(&dfa, self.options.complete_dfa)?;
            let explanation = format!(
                "merged indistinguishable states: {} states became {}",
                dfa.get_states().len(),
                minimal.get_states().len()
            );
            stages.push(ConversionStage::new(
                StageKind::Minimize,
                Artifact::Automaton(minimal.clone()),
                explanation,
            ));
            dfa = minimal;
        }

        let grammar = dfa_to_grammar(&dfa)?;
        let explanation = format!(
            "one production X -> a Y per transition and X -> ε per accepting state, {} productions",
            grammar.get_productions().len()
        );
        stages.push(ConversionStage::new(
            StageKind::Grammar,
            Artifact::Grammar(grammar),
            explanation,
        ));

        info!(regex = %canonical, stages = stages.len(), "converted regex to grammar");

        Ok(ConversionTrace {
            regex: canonical,
            stages,
        })
    }
}

/// Memo of finished conversions keyed by canonical regex text. Owned by the
/// caller; nothing is shared between caches.
#[derive(Debug, Default)]
pub struct ConversionCache {
    converter: Converter,
    entries: BTreeMap<String, ConversionTrace>,
}

impl ConversionCache {
    pub fn new(converter: Converter) -> Self {
        ConversionCache {
            converter,
            entries: BTreeMap::new(),
        }
    }

    pub fn get_or_convert(&mut self, text: &str) -> Result<&ConversionTrace> {
        let key = Regex::parse(text).map_err(Report::new)?.to_string();
        if !self.entries.contains_key(&key) {
            let trace = self.converter.convert(text)?;
            self.entries.insert(key.clone(), trace);
        } else {
            debug!(regex = %key, "conversion cache hit");
        }
        Ok(&self.entries[&key])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

pub fn convert_regex_to_grammar_with(
    text: &str,
    limits: Limits,
    options: ConversionOptions,
) -> Result<ConversionTrace> {
    Converter::new(limits, options).convert(text)
}

pub fn convert_regex_to_grammar(text: &str) -> Result<ConversionTrace> {
    convert_regex_to_grammar_with(text, Limits::default(), ConversionOptions::default())
}

#[cfg(test)]
mod convert_test {
    use super::*;
    use crate::{
        automaton::{parse_automaton, simulate::Simulator},
        classifier::{ChomskyType, classify_grammar},
        regex::{InvalidRegexError, RegexErrorKind},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pipeline_for_a_then_b_or_c_star() {
        let trace = convert_regex_to_grammar("a(b|c)*").unwrap();

        assert_eq!(
            trace
                .stages
                .iter()
                .map(|stage| stage.kind)
                .collect::<Vec<_>>(),
            vec![
                StageKind::Parse,
                StageKind::Thompson,
                StageKind::Subset,
                StageKind::Minimize,
                StageKind::Grammar
            ]
        );
        assert!(trace.get_automaton(StageKind::Thompson).unwrap().has_epsilon());
        assert_eq!(trace.get_dfa().unwrap().get_states().len(), 2);

        let grammar = trace.get_grammar().unwrap();
        assert_eq!(grammar.to_string(), "M0 -> a M1\nM1 -> b M1 | c M1 | ε");
        assert_eq!(classify_grammar(grammar).chomsky_type, ChomskyType::Regular);
    }

    #[test]
    fn test_skipping_minimization() {
        let options = ConversionOptions {
            skip_minimization: true,
            ..ConversionOptions::default()
        };
        let trace = convert_regex_to_grammar_with("ab", Limits::default(), options).unwrap();

        assert!(trace.get_stage(StageKind::Minimize).is_none());
        assert_eq!(
            trace.get_grammar().unwrap().to_string(),
            "D0 -> a D1\nD1 -> b D2\nD2 -> ε"
        );
    }

    #[test]
    fn test_repeated_conversions_are_identical() {
        let first = convert_regex_to_grammar("(a|b)*abb").unwrap();
        let second = convert_regex_to_grammar("(a|b)*abb").unwrap();

        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_invalid_regex_is_reported() {
        let err = convert_regex_to_grammar("a(b").unwrap_err();
        let invalid = err.downcast_ref::<InvalidRegexError>().unwrap();
        assert_eq!(invalid.kind, RegexErrorKind::MissingCloseParen);
    }

    #[test]
    fn test_state_limit_is_reported() {
        let limits = Limits {
            max_dfa_states: 3,
            ..Limits::default()
        };
        let err = convert_regex_to_grammar_with("(a|b)*a(a|b)", limits, ConversionOptions::default())
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<ConversionError>(),
            Some(&ConversionError::StateLimitExceeded { limit: 3 })
        );
    }

    #[test]
    fn test_grammar_from_hand_written_dfa() {
        let dfa = parse_automaton(
            "states: A, B, trap\nalphabet: 0, 1\ninitial: A\naccepting: B\ntransitions:\nA, 0 -> B\nA, 1 -> trap\nB, 0 -> B\nB, 1 -> trap\ntrap, 0 -> trap\ntrap, 1 -> trap",
        )
        .unwrap();

        let grammar = dfa_to_grammar(&dfa).unwrap();
        assert_eq!(grammar.to_string(), "A -> 0 B\nB -> 0 B | ε");

        let dead = parse_automaton("states: A, B\nalphabet: 0\ninitial: A\ntransitions:\nA, 0 -> B").unwrap();
        let err = dfa_to_grammar(&dead).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConversionError>(),
            Some(&ConversionError::EmptyLanguage)
        );
    }

    #[test]
    fn test_cache_is_keyed_by_canonical_text() {
        let mut cache = ConversionCache::default();

        let first = cache.get_or_convert("a ( b | c ) *").unwrap().clone();
        let second = cache.get_or_convert("a(b|c)*").unwrap().clone();

        assert_eq!(cache.len(), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_complete_dfa_option() {
        let options = ConversionOptions {
            complete_dfa: true,
            ..ConversionOptions::default()
        };
        let trace = convert_regex_to_grammar_with("a", Limits::default(), options).unwrap();

        let dfa = trace.get_dfa().unwrap();
        assert_eq!(dfa.get_states().len(), 3);
        assert!(Simulator::new(dfa).accepts("aa").is_ok());
    }
}

#[cfg(test)]
mod convert_property_test {
    use super::*;
    use crate::automaton::simulate::Simulator;
    use proptest::prelude::*;

    fn arb_regex() -> impl Strategy<Value = Regex> {
        let leaf = prop_oneof![
            1 => Just(Regex::Epsilon),
            4 => prop::sample::select(vec!['a', 'b']).prop_map(Regex::Literal),
        ];
        leaf.prop_recursive(3, 16, 3, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 2..4).prop_map(Regex::Concat),
                prop::collection::vec(inner.clone(), 2..4).prop_map(Regex::Alternation),
                inner.clone().prop_map(|regex| Regex::Star(Box::new(regex))),
                inner.clone().prop_map(|regex| Regex::Plus(Box::new(regex))),
                inner.prop_map(|regex| Regex::Optional(Box::new(regex))),
            ]
        })
    }

    fn strings_up_to(max_len: usize) -> Vec<String> {
        let mut all = vec![String::new()];
        let mut layer = vec![String::new()];
        for _ in 0..max_len {
            layer = layer
                .iter()
                .flat_map(|prefix| ["a", "b"].map(|symbol| format!("{prefix}{symbol}")))
                .collect();
            all.extend(layer.iter().cloned());
        }
        all
    }

    proptest! {
        #[test]
        fn dfa_accepts_exactly_the_regex_language(regex in arb_regex()) {
            let trace = convert_regex_to_grammar(&regex.to_string()).unwrap();
            let subset_dfa = trace.get_automaton(StageKind::Subset).unwrap();
            let minimal_dfa = trace.get_automaton(StageKind::Minimize).unwrap();

            for input in strings_up_to(4) {
                let expected = regex.matches(&input);
                for dfa in [subset_dfa, minimal_dfa] {
                    let verdict = Simulator::new(dfa).run(&input).unwrap();
                    prop_assert_eq!(verdict.is_accept(), expected, "{} on {:?}", regex, input);
                }
            }
        }
    }
}
