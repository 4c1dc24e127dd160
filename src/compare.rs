//! Bounded comparison of the languages two grammars generate, and of two
//! automata side by side.

use std::{
    collections::{BTreeSet, VecDeque},
    fmt,
};

use eyre::{Report, Result};
use serde::Serialize;
use tracing::debug;

use crate::{
    analyzer::{ComputationalClass, analyze_automaton_with},
    automaton::{Automaton, AutomatonKind, simulate::Simulator},
    cfg::{EPSILON, Grammar, Symbol},
    classifier::{ChomskyType, classify_grammar},
    config::Limits,
};

pub const AUTOMATON_DISCLAIMER: &str = "Bounded comparison: finite automata were run on every \
input up to the checked length. Agreement on those inputs does not prove the languages are equal.";

pub const DISCLAIMER: &str = "Heuristic comparison: only strings derivable within the depth and \
length bounds were generated. Differences are real, agreement does not prove the grammars \
generate the same language.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComparisonError {
    /// At least one grammar produced no terminal string within the bounds.
    IncomparableGrammars { first: usize, second: usize },
    StepLimitExceeded { limit: usize },
}

impl fmt::Display for ComparisonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparisonError::IncomparableGrammars { first, second } => write!(
                f,
                "Incomparable grammars: generated {first} and {second} strings within the bounds, \
                 both must generate at least one"
            ),
            ComparisonError::StepLimitExceeded { limit } => write!(
                f,
                "Step limit exceeded: more than {limit} sentential forms in one derivation step"
            ),
        }
    }
}

impl std::error::Error for ComparisonError {}

/// Shape of the two grammars side by side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StructuralComparison {
    pub first_type: ChomskyType,
    pub second_type: ChomskyType,
    pub terminals_only_first: BTreeSet<String>,
    pub terminals_only_second: BTreeSet<String>,
    pub non_terminal_counts: (usize, usize),
    pub production_counts: (usize, usize),
    pub similarities: Vec<String>,
    pub differences: Vec<String>,
}

impl StructuralComparison {
    pub fn new(first: &Grammar, second: &Grammar) -> Self {
        let first_type = classify_grammar(first).chomsky_type;
        let second_type = classify_grammar(second).chomsky_type;

        let mut similarities = Vec::new();
        let mut differences = Vec::new();

        if first_type == second_type {
            similarities.push(format!("Both grammars are {first_type}"));
        } else {
            differences.push(format!("Different types: {first_type} vs {second_type}"));
        }

        let terminals_only_first: BTreeSet<String> = first
            .get_terminals()
            .difference(second.get_terminals())
            .cloned()
            .collect();
        let terminals_only_second: BTreeSet<String> = second
            .get_terminals()
            .difference(first.get_terminals())
            .cloned()
            .collect();

        if terminals_only_first.is_empty() && terminals_only_second.is_empty() {
            similarities.push(format!("Identical terminal alphabets: {}", set_text(first.get_terminals())));
        }
        if !terminals_only_first.is_empty() {
            differences.push(format!(
                "Terminals only in the first grammar: {}",
                set_text(&terminals_only_first)
            ));
        }
        if !terminals_only_second.is_empty() {
            differences.push(format!(
                "Terminals only in the second grammar: {}",
                set_text(&terminals_only_second)
            ));
        }

        let non_terminal_counts = (first.get_non_terminals().len(), second.get_non_terminals().len());
        if non_terminal_counts.0 == non_terminal_counts.1 {
            similarities.push(format!("Same number of non-terminals: {}", non_terminal_counts.0));
        } else {
            differences.push(format!(
                "Different number of non-terminals: {} vs {}",
                non_terminal_counts.0, non_terminal_counts.1
            ));
        }

        let production_counts = (first.get_productions().len(), second.get_productions().len());
        if production_counts.0 == production_counts.1 {
            similarities.push(format!("Same number of productions: {}", production_counts.0));
        } else {
            differences.push(format!(
                "Different number of productions: {} vs {}",
                production_counts.0, production_counts.1
            ));
        }

        StructuralComparison {
            first_type,
            second_type,
            terminals_only_first,
            terminals_only_second,
            non_terminal_counts,
            production_counts,
            similarities,
            differences,
        }
    }
}

fn set_text(set: &BTreeSet<String>) -> String {
    let items: Vec<&str> = set.iter().map(String::as_str).collect();
    format!("{{{}}}", items.join(", "))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub only_first: BTreeSet<String>,
    pub only_second: BTreeSet<String>,
    pub both: BTreeSet<String>,
    pub jaccard: f64,
    pub depth: usize,
    pub max_length: usize,
    pub structure: StructuralComparison,
    pub disclaimer: &'static str,
}

impl ComparisonResult {
    /// True when no generated string tells the grammars apart.
    pub fn agrees(&self) -> bool {
        self.only_first.is_empty() && self.only_second.is_empty()
    }
}

fn word(text: &str) -> &str {
    if text.is_empty() { EPSILON } else { text }
}

fn write_words(f: &mut fmt::Formatter<'_>, label: &str, words: &BTreeSet<String>) -> fmt::Result {
    let items: Vec<&str> = words.iter().map(|text| word(text)).collect();
    writeln!(f, "{label} ({}): {}", items.len(), items.join(", "))
}

impl fmt::Display for ComparisonResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Compared strings up to depth {} and length {}",
            self.depth, self.max_length
        )?;
        write_words(f, "Both", &self.both)?;
        write_words(f, "Only first", &self.only_first)?;
        write_words(f, "Only second", &self.only_second)?;
        writeln!(f, "Jaccard similarity: {:.1}%", self.jaccard * 100.0)?;
        for line in &self.structure.similarities {
            writeln!(f, "= {line}")?;
        }
        for line in &self.structure.differences {
            writeln!(f, "! {line}")?;
        }
        write!(f, "{}", self.disclaimer)
    }
}

fn is_terminal_form(form: &[Symbol]) -> bool {
    form.iter().all(Symbol::is_terminal)
}

fn terminal_count(form: &[Symbol]) -> usize {
    form.iter().filter(|symbol| symbol.is_terminal()).count()
}

// Every form reachable from `form` in one rewriting step
fn rewrite(grammar: &Grammar, form: &[Symbol], leftmost: bool) -> Vec<Vec<Symbol>> {
    let mut rewritten = Vec::new();

    if leftmost {
        let Some(idx) = form.iter().position(Symbol::is_non_terminal) else {
            return rewritten;
        };
        for production in grammar.productions_for(form[idx].get_name()) {
            let mut next = form[..idx].to_vec();
            next.extend_from_slice(production.get_rhs());
            next.extend_from_slice(&form[idx + 1..]);
            rewritten.push(next);
        }
        return rewritten;
    }

    for idx in 0..form.len() {
        for production in grammar.get_productions() {
            let lhs = production.get_lhs();
            if form[idx..].starts_with(lhs) {
                let mut next = form[..idx].to_vec();
                next.extend_from_slice(production.get_rhs());
                next.extend_from_slice(&form[idx + lhs.len()..]);
                rewritten.push(next);
            }
        }
    }
    rewritten
}

/// Terminal strings derivable from the start symbol in at most `depth` steps,
/// keeping at most `limits.max_string_length` terminals. Context-free grammars
/// rewrite the leftmost non-terminal only.
pub fn generate_strings(
    grammar: &Grammar,
    depth: usize,
    limits: &Limits,
) -> Result<BTreeSet<String>, ComparisonError> {
    let leftmost = grammar.is_context_free();
    let start = vec![grammar.get_start_symbol()];

    let mut strings = BTreeSet::new();
    let mut seen = BTreeSet::from([start.clone()]);
    let mut frontier = VecDeque::from([start]);

    for step in 0..depth {
        let mut next_frontier = VecDeque::new();

        while let Some(form) = frontier.pop_front() {
            for next in rewrite(grammar, &form, leftmost) {
                if terminal_count(&next) > limits.max_string_length || !seen.insert(next.clone()) {
                    continue;
                }
                if is_terminal_form(&next) {
                    strings.insert(next.iter().map(Symbol::get_name).collect::<String>());
                    continue;
                }
                next_frontier.push_back(next);
                if next_frontier.len() > limits.max_sentential_forms {
                    return Err(ComparisonError::StepLimitExceeded {
                        limit: limits.max_sentential_forms,
                    });
                }
            }
        }

        debug!(step = step + 1, forms = next_frontier.len(), strings = strings.len(), "derivation step");
        if next_frontier.is_empty() {
            break;
        }
        frontier = next_frontier;
    }

    Ok(strings)
}

pub fn compare_grammars_with(
    first: &Grammar,
    second: &Grammar,
    depth: usize,
    limits: Limits,
) -> Result<ComparisonResult> {
    let first_strings = generate_strings(first, depth, &limits).map_err(Report::new)?;
    let second_strings = generate_strings(second, depth, &limits).map_err(Report::new)?;

    if first_strings.is_empty() || second_strings.is_empty() {
        return Err(Report::new(ComparisonError::IncomparableGrammars {
            first: first_strings.len(),
            second: second_strings.len(),
        }));
    }

    let both: BTreeSet<String> = first_strings.intersection(&second_strings).cloned().collect();
    let union = first_strings.union(&second_strings).count();
    let jaccard = both.len() as f64 / union as f64;

    debug!(both = both.len(), union, "compared generated strings");

    Ok(ComparisonResult {
        only_first: first_strings.difference(&second_strings).cloned().collect(),
        only_second: second_strings.difference(&first_strings).cloned().collect(),
        both,
        jaccard,
        depth,
        max_length: limits.max_string_length,
        structure: StructuralComparison::new(first, second),
        disclaimer: DISCLAIMER,
    })
}

/// Compares with the default length and frontier limits.
pub fn compare_grammars(first: &Grammar, second: &Grammar, depth: usize) -> Result<ComparisonResult> {
    compare_grammars_with(first, second, depth, Limits::default())
}

/// Inputs accepted by each of two finite automata, over every string up to
/// `max_length` symbols of their joint alphabet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptanceComparison {
    pub max_length: usize,
    pub checked_inputs: usize,
    pub accepted_by_both: usize,
    pub only_first: BTreeSet<String>,
    pub only_second: BTreeSet<String>,
}

impl AcceptanceComparison {
    pub fn agrees(&self) -> bool {
        self.only_first.is_empty() && self.only_second.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutomatonComparison {
    pub first_class: ComputationalClass,
    pub second_class: ComputationalClass,
    pub first_language: ChomskyType,
    pub second_language: ChomskyType,
    pub state_counts: (usize, usize),
    pub states_only_first: BTreeSet<String>,
    pub states_only_second: BTreeSet<String>,
    pub symbols_only_first: BTreeSet<String>,
    pub symbols_only_second: BTreeSet<String>,
    /// Present when both machines are finite automata.
    pub acceptance: Option<AcceptanceComparison>,
    pub similarities: Vec<String>,
    pub differences: Vec<String>,
    pub disclaimer: &'static str,
}

impl AutomatonComparison {
    /// `Some(true)` when the finite automata agreed on every checked input.
    pub fn likely_equivalent(&self) -> Option<bool> {
        self.acceptance.as_ref().map(AcceptanceComparison::agrees)
    }
}

impl fmt::Display for AutomatonComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.similarities {
            writeln!(f, "= {line}")?;
        }
        for line in &self.differences {
            writeln!(f, "! {line}")?;
        }
        if let Some(acceptance) = &self.acceptance {
            writeln!(
                f,
                "Ran {} inputs up to length {}, {} accepted by both",
                acceptance.checked_inputs, acceptance.max_length, acceptance.accepted_by_both
            )?;
            write_words(f, "Only first accepts", &acceptance.only_first)?;
            write_words(f, "Only second accepts", &acceptance.only_second)?;
        }
        write!(f, "{}", self.disclaimer)
    }
}

fn difference(first: &BTreeSet<String>, second: &BTreeSet<String>) -> BTreeSet<String> {
    first.difference(second).cloned().collect()
}

fn is_finite(automaton: &Automaton) -> bool {
    matches!(automaton.get_kind(), AutomatonKind::Dfa | AutomatonKind::Nfa)
}

// Every string over `alphabet` in length order, stopping at the first length
// that would push the total past `max_inputs`
fn enumerate_inputs(alphabet: &BTreeSet<String>, limits: &Limits) -> (Vec<String>, usize) {
    let mut inputs = vec![String::new()];
    let mut level = vec![String::new()];
    let mut max_length = 0;

    while max_length < limits.max_string_length && !alphabet.is_empty() {
        if inputs.len() + level.len() * alphabet.len() > limits.max_sentential_forms {
            break;
        }
        level = level
            .iter()
            .flat_map(|prefix| alphabet.iter().map(move |symbol| format!("{prefix}{symbol}")))
            .collect();
        inputs.extend(level.iter().cloned());
        max_length += 1;
    }
    (inputs, max_length)
}

fn compare_acceptance(
    first: &Automaton,
    second: &Automaton,
    limits: Limits,
) -> Result<AcceptanceComparison> {
    let alphabet: BTreeSet<String> = first
        .get_alphabet()
        .union(second.get_alphabet())
        .cloned()
        .collect();
    let (inputs, max_length) = enumerate_inputs(&alphabet, &limits);

    let first_simulator = Simulator::with_limits(first, limits);
    let second_simulator = Simulator::with_limits(second, limits);

    let mut accepted_by_both = 0;
    let mut only_first = BTreeSet::new();
    let mut only_second = BTreeSet::new();
    for input in &inputs {
        // A symbol outside one machine's alphabet is a rejection there
        let first_accepts = first_simulator.run(input).map_err(Report::new)?.is_accept();
        let second_accepts = second_simulator.run(input).map_err(Report::new)?.is_accept();
        match (first_accepts, second_accepts) {
            (true, true) => accepted_by_both += 1,
            (true, false) => {
                only_first.insert(input.clone());
            }
            (false, true) => {
                only_second.insert(input.clone());
            }
            (false, false) => {}
        }
    }

    debug!(inputs = inputs.len(), max_length, accepted_by_both, "compared acceptance");

    Ok(AcceptanceComparison {
        max_length,
        checked_inputs: inputs.len(),
        accepted_by_both,
        only_first,
        only_second,
    })
}

/// Compares two automata: class and language type from the analyzer, state
/// names and counts, alphabets, and for two finite automata the inputs each
/// accepts up to `limits.max_string_length` symbols.
pub fn compare_automata_with(
    first: &Automaton,
    second: &Automaton,
    limits: Limits,
) -> Result<AutomatonComparison> {
    let first_analysis = analyze_automaton_with(first, limits);
    let second_analysis = analyze_automaton_with(second, limits);

    let mut similarities = Vec::new();
    let mut differences = Vec::new();

    let (first_kind, second_kind) = (first.get_kind(), second.get_kind());
    if first_kind == second_kind {
        similarities.push(format!("Same kind: {first_kind}"));
    } else {
        differences.push(format!("Different kinds: {first_kind} vs {second_kind}"));
    }

    let first_language = first_analysis.language.chomsky_type;
    let second_language = second_analysis.language.chomsky_type;
    if first_language == second_language {
        similarities.push(format!("Both recognise {first_language} languages"));
    } else {
        differences.push(format!(
            "Different language types: {first_language} vs {second_language}"
        ));
    }

    let state_counts = (first_analysis.num_states, second_analysis.num_states);
    if state_counts.0 == state_counts.1 {
        similarities.push(format!("Same number of states: {}", state_counts.0));
    } else {
        differences.push(format!(
            "Different number of states: {} vs {}",
            state_counts.0, state_counts.1
        ));
    }

    let state_names = |automaton: &Automaton| -> BTreeSet<String> {
        automaton
            .get_states()
            .iter()
            .map(|state| state.name.clone())
            .collect()
    };
    let (first_states, second_states) = (state_names(first), state_names(second));
    let states_only_first = difference(&first_states, &second_states);
    let states_only_second = difference(&second_states, &first_states);
    if states_only_first.is_empty() && states_only_second.is_empty() {
        similarities.push(format!("Identical state names: {}", set_text(&first_states)));
    }

    let symbols_only_first = difference(first.get_alphabet(), second.get_alphabet());
    let symbols_only_second = difference(second.get_alphabet(), first.get_alphabet());
    if symbols_only_first.is_empty() && symbols_only_second.is_empty() {
        similarities.push(format!("Identical alphabets: {}", set_text(first.get_alphabet())));
    }
    if !symbols_only_first.is_empty() {
        differences.push(format!(
            "Symbols only in the first alphabet: {}",
            set_text(&symbols_only_first)
        ));
    }
    if !symbols_only_second.is_empty() {
        differences.push(format!(
            "Symbols only in the second alphabet: {}",
            set_text(&symbols_only_second)
        ));
    }

    let acceptance = if is_finite(first) && is_finite(second) {
        let acceptance = compare_acceptance(first, second, limits)?;
        if acceptance.agrees() {
            similarities.push(format!(
                "Same verdict on all {} inputs up to length {}",
                acceptance.checked_inputs, acceptance.max_length
            ));
        } else {
            differences.push(format!(
                "Verdicts differ on {} of {} inputs",
                acceptance.only_first.len() + acceptance.only_second.len(),
                acceptance.checked_inputs
            ));
        }
        Some(acceptance)
    } else {
        None
    };

    Ok(AutomatonComparison {
        first_class: first_analysis.class,
        second_class: second_analysis.class,
        first_language,
        second_language,
        state_counts,
        states_only_first,
        states_only_second,
        symbols_only_first,
        symbols_only_second,
        acceptance,
        similarities,
        differences,
        disclaimer: AUTOMATON_DISCLAIMER,
    })
}

pub fn compare_automata(first: &Automaton, second: &Automaton) -> Result<AutomatonComparison> {
    compare_automata_with(first, second, Limits::default())
}

#[cfg(test)]
mod compare_test {
    use super::*;
    use crate::{automaton::parse_automaton, bnf::parse_grammar};
    use pretty_assertions::assert_eq;

    fn words(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|item| item.to_string()).collect()
    }

    #[test]
    fn test_equivalent_grammars_overlap_fully() {
        let first = parse_grammar("S -> aA | a; A -> aA | a").unwrap();
        let second = parse_grammar("S -> aS | a").unwrap();

        let result = compare_grammars(&first, &second, 5).unwrap();

        assert!(result.agrees());
        assert_eq!(result.jaccard, 1.0);
        assert_eq!(result.both, words(&["a", "aa", "aaa", "aaaa", "aaaaa"]));
        assert_eq!(result.disclaimer, DISCLAIMER);
    }

    #[test]
    fn test_missing_single_a_is_reported() {
        let first = parse_grammar("S -> aA; A -> aA | a").unwrap();
        let second = parse_grammar("S -> aS | a").unwrap();

        let result = compare_grammars(&first, &second, 5).unwrap();

        assert!(!result.agrees());
        assert_eq!(result.only_first, BTreeSet::new());
        assert_eq!(result.only_second, words(&["a"]));
        assert_eq!(result.jaccard, 0.8);
    }

    #[test]
    fn test_length_cap_discards_long_forms() {
        let grammar = parse_grammar("S -> aS | a").unwrap();
        let limits = Limits {
            max_string_length: 3,
            ..Limits::default()
        };

        let strings = generate_strings(&grammar, 10, &limits).unwrap();

        assert_eq!(strings, words(&["a", "aa", "aaa"]));
    }

    #[test]
    fn test_epsilon_is_the_empty_string() {
        let grammar = parse_grammar("S -> aSb | ε").unwrap();

        let strings = generate_strings(&grammar, 3, &Limits::default()).unwrap();

        assert_eq!(strings, words(&["", "ab", "aabb"]));
    }

    #[test]
    fn test_general_grammar_rewrites_every_position() {
        let grammar = parse_grammar(
            "S -> a S B C | a B C\nC B -> C Z\nC Z -> W Z\nW Z -> W C\nW C -> B C\n\
             a B -> a b\nb B -> b b\nb C -> b c\nc C -> c c",
        )
        .unwrap();

        let strings = generate_strings(&grammar, 12, &Limits::default()).unwrap();

        assert!(strings.contains("abc"));
        assert!(strings.contains("aabbcc"));
        assert!(strings.iter().all(|text| {
            let n = text.len() / 3;
            text == &format!("{}{}{}", "a".repeat(n), "b".repeat(n), "c".repeat(n))
        }));
    }

    #[test]
    fn test_no_strings_is_incomparable() {
        let first = parse_grammar("S -> aS | a").unwrap();
        let second = parse_grammar("S -> aaaaS | aaaaa").unwrap();
        let limits = Limits {
            max_string_length: 4,
            ..Limits::default()
        };

        let err = compare_grammars_with(&first, &second, 5, limits).unwrap_err();

        assert_eq!(
            err.downcast_ref::<ComparisonError>(),
            Some(&ComparisonError::IncomparableGrammars { first: 4, second: 0 })
        );
    }

    #[test]
    fn test_frontier_limit() {
        let grammar = parse_grammar("S -> SS | a | b").unwrap();
        let limits = Limits {
            max_sentential_forms: 10,
            ..Limits::default()
        };

        let err = generate_strings(&grammar, 8, &limits).unwrap_err();

        assert_eq!(err, ComparisonError::StepLimitExceeded { limit: 10 });
    }

    #[test]
    fn test_structural_comparison() {
        let first = parse_grammar("S -> aS | b").unwrap();
        let second = parse_grammar("S -> aSc | d").unwrap();

        let structure = StructuralComparison::new(&first, &second);

        assert_eq!(structure.first_type, ChomskyType::Regular);
        assert_eq!(structure.second_type, ChomskyType::ContextFree);
        assert_eq!(structure.terminals_only_first, words(&["b"]));
        assert_eq!(structure.terminals_only_second, words(&["c", "d"]));
        assert_eq!(structure.non_terminal_counts, (1, 1));
        assert_eq!(
            structure.differences[0],
            "Different types: Type 3 (regular) vs Type 2 (context-free)"
        );
    }

    const EVEN_AS: &str = "\
states: even, odd
alphabet: a, b
initial: even
accepting: even
transitions:
even, a -> odd
even, b -> even
odd, a -> even
odd, b -> odd
";

    #[test]
    fn test_equivalent_finite_automata_agree() {
        let dfa = parse_automaton(EVEN_AS).unwrap();
        // Same language, extra redundant state
        let nfa = parse_automaton(
            "states: e, o, e2\nalphabet: a, b\ninitial: e\naccepting: e, e2\ntransitions:\n\
             e, a -> o\ne, b -> e, e2\ne2, b -> e\ne2, a -> o\no, a -> e\no, b -> o",
        )
        .unwrap();

        let result = compare_automata(&dfa, &nfa).unwrap();

        assert_eq!(result.likely_equivalent(), Some(true));
        assert_eq!(result.state_counts, (2, 3));
        assert_eq!(result.first_language, ChomskyType::Regular);
        assert!(result.differences.contains(&"Different kinds: deterministic finite automaton vs nondeterministic finite automaton".to_string()));
        assert!(result.similarities.contains(&"Identical alphabets: {a, b}".to_string()));
        let acceptance = result.acceptance.unwrap();
        assert_eq!(acceptance.max_length, Limits::default().max_string_length);
        assert_eq!(acceptance.checked_inputs, 511);
    }

    #[test]
    fn test_finite_automata_that_differ() {
        let even = parse_automaton(EVEN_AS).unwrap();
        let any_a = parse_automaton(
            "states: q\nalphabet: a\ninitial: q\naccepting: q\ntransitions:\nq, a -> q",
        )
        .unwrap();

        let result = compare_automata(&even, &any_a).unwrap();

        assert_eq!(result.likely_equivalent(), Some(false));
        assert_eq!(result.symbols_only_first, words(&["b"]));
        assert_eq!(result.states_only_first, words(&["even", "odd"]));
        assert_eq!(result.states_only_second, words(&["q"]));
        let acceptance = result.acceptance.unwrap();
        // b is outside the second alphabet, so inputs with b only pass the first
        assert!(acceptance.only_first.contains("b"));
        assert!(acceptance.only_second.contains("a"));
        assert!(!acceptance.only_second.contains("aa"));
    }

    #[test]
    fn test_input_enumeration_respects_the_cap() {
        let limits = Limits {
            max_string_length: 10,
            max_sentential_forms: 20,
            ..Limits::default()
        };

        let (inputs, max_length) = enumerate_inputs(&words(&["a", "b"]), &limits);

        assert_eq!(max_length, 3);
        assert_eq!(inputs.len(), 15);
        assert_eq!(inputs[0], "");
    }

    #[test]
    fn test_pushdown_automata_skip_the_acceptance_run() {
        let pda = parse_automaton(
            "states: q0\nalphabet: a\nstack alphabet: Z\ninitial: q0\naccepting: q0\ntransitions:\nq0, a, Z -> q0 / Z",
        )
        .unwrap();
        let dfa = parse_automaton(EVEN_AS).unwrap();

        let result = compare_automata(&pda, &dfa).unwrap();

        assert_eq!(result.acceptance, None);
        assert_eq!(result.likely_equivalent(), None);
        assert_eq!(result.first_language, ChomskyType::ContextFree);
        assert!(
            result
                .differences
                .iter()
                .any(|line| line.starts_with("Different language types"))
        );
        assert_eq!(result.disclaimer, AUTOMATON_DISCLAIMER);
    }
}
