use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fmt,
};

use serde::Serialize;
use tracing::debug;

use crate::{
    automaton::{
        Automaton, AutomatonKind, Variant,
        simulate::{SimulationError, Simulator},
    },
    classifier::ChomskyType,
    config::Limits,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComputationalClass {
    pub kind: AutomatonKind,
    pub deterministic: bool,
    pub notes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LanguageType {
    pub chomsky_type: ChomskyType,
    /// Set when the type rests on bounded probing rather than on the machine kind.
    pub caveat: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AutomatonAnalysis {
    pub class: ComputationalClass,
    pub language: LanguageType,
    pub num_states: usize,
    pub num_transitions: usize,
    pub alphabet_size: usize,
    pub reachable: BTreeSet<String>,
    pub co_reachable: BTreeSet<String>,
    pub unreachable: BTreeSet<String>,
    pub useless: BTreeSet<String>,
    pub has_epsilon: bool,
    /// (state, symbol) pairs with no move, for DFAs only.
    pub missing_transitions: Vec<(String, String)>,
    pub warnings: Vec<String>,
}

impl AutomatonAnalysis {
    pub fn is_complete(&self) -> bool {
        self.missing_transitions.is_empty()
    }
}

fn join(states: &BTreeSet<String>) -> String {
    if states.is_empty() {
        return "-".to_string();
    }
    states.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}

impl fmt::Display for AutomatonAnalysis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let determinism = if self.class.deterministic {
            "deterministic"
        } else {
            "nondeterministic"
        };
        writeln!(f, "Class: {} ({determinism})", self.class.kind)?;
        for note in &self.class.notes {
            writeln!(f, "  {note}")?;
        }
        writeln!(f, "Language: {}", self.language.chomsky_type)?;
        if let Some(caveat) = &self.language.caveat {
            writeln!(f, "  {caveat}")?;
        }
        writeln!(
            f,
            "States: {}, transitions: {}, alphabet: {} symbol(s), epsilon moves: {}",
            self.num_states,
            self.num_transitions,
            self.alphabet_size,
            if self.has_epsilon { "yes" } else { "no" }
        )?;
        writeln!(f, "Reachable: {}", join(&self.reachable))?;
        writeln!(f, "Co-reachable: {}", join(&self.co_reachable))?;
        for (state, symbol) in &self.missing_transitions {
            writeln!(f, "No move from {state} on {symbol}")?;
        }
        for warning in &self.warnings {
            writeln!(f, "warning: {warning}")?;
        }
        Ok(())
    }
}

fn collect_strings(states: &BTreeSet<&str>) -> BTreeSet<String> {
    states.iter().map(|state| state.to_string()).collect()
}

fn search<'a>(
    start: impl IntoIterator<Item = &'a str>,
    edges: &BTreeMap<&'a str, BTreeSet<&'a str>>,
) -> BTreeSet<&'a str> {
    let mut visited = BTreeSet::new();
    let mut queue: VecDeque<&str> = start.into_iter().collect();

    while let Some(state) = queue.pop_front() {
        if !visited.insert(state) {
            continue;
        }
        if let Some(next) = edges.get(state) {
            queue.extend(next.iter().copied());
        }
    }

    visited
}

// Every input over the alphabet up to `max_len`, shortest first
fn probe_inputs(alphabet: &BTreeSet<String>, max_len: usize) -> Vec<String> {
    let mut inputs = vec![String::new()];
    let mut layer = vec![String::new()];

    for _ in 0..max_len {
        let mut next = Vec::new();
        for prefix in &layer {
            for symbol in alphabet {
                next.push(format!("{prefix}{symbol}"));
            }
        }
        inputs.extend(next.iter().cloned());
        layer = next;
    }

    inputs
}

pub struct Analyzer<'a> {
    automaton: &'a Automaton,
    limits: Limits,
}

impl<'a> Analyzer<'a> {
    pub fn new(automaton: &'a Automaton) -> Self {
        Analyzer {
            automaton,
            limits: Limits::default(),
        }
    }

    pub fn with_limits(automaton: &'a Automaton, limits: Limits) -> Self {
        Analyzer { automaton, limits }
    }

    pub fn reachable_states(&self) -> BTreeSet<&'a str> {
        let edges = self.automaton.get_edges();
        search(self.automaton.get_initial_states(), &edges)
    }

    /// States from which an accepting state can be reached.
    pub fn co_reachable_states(&self) -> BTreeSet<&'a str> {
        let accepting = self.automaton.get_accepting_states();

        // Acceptance by empty stack can happen anywhere
        if accepting.is_empty() && self.automaton.get_kind() == AutomatonKind::Pda {
            return self
                .automaton
                .get_states()
                .iter()
                .map(|state| state.name.as_str())
                .collect();
        }

        let mut reverse: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for (from, targets) in self.automaton.get_edges() {
            for to in targets {
                reverse.entry(to).or_default().insert(from);
            }
        }
        search(accepting, &reverse)
    }

    pub fn missing_transitions(&self) -> Vec<(String, String)> {
        if self.automaton.get_kind() != AutomatonKind::Dfa {
            return Vec::new();
        }

        let mut missing = Vec::new();
        for state in self.automaton.get_states() {
            for symbol in self.automaton.get_alphabet() {
                if self
                    .automaton
                    .targets(&state.name, Some(symbol.as_str()))
                    .next()
                    .is_none()
                {
                    missing.push((state.name.clone(), symbol.clone()));
                }
            }
        }
        missing
    }

    pub fn classify_computational_class(&self) -> ComputationalClass {
        let kind = self.automaton.get_kind();
        let deterministic = self.automaton.is_deterministic();
        let mut notes = Vec::new();

        match self.automaton.get_variant() {
            Variant::Dfa => {
                notes.push("one move per state and input symbol".to_string());
                if !self.missing_transitions().is_empty() {
                    notes.push("partial transition function, a missing move rejects".to_string());
                }
            }
            Variant::Nfa => {
                if deterministic {
                    notes.push(
                        "declared nondeterministic, but every move is determined".to_string(),
                    );
                }
                if self.automaton.has_epsilon() {
                    notes.push("uses epsilon moves".to_string());
                }
                if self.automaton.get_initial_states().len() > 1 {
                    notes.push("several initial states".to_string());
                }
            }
            Variant::Pda { .. } => {
                if deterministic {
                    notes.push("deterministic pushdown automaton".to_string());
                } else {
                    notes.push("nondeterministic pushdown automaton".to_string());
                }
                if self.automaton.get_accepting_states().is_empty() {
                    notes.push("accepts by empty stack".to_string());
                } else {
                    notes.push("accepts by final state".to_string());
                }
            }
            Variant::Tm { .. } => {
                notes.push("deterministic single-tape Turing machine".to_string());
            }
        }

        ComputationalClass {
            kind,
            deterministic,
            notes,
        }
    }

    // Probe every short input; any loop or excursion past the input keeps Type 0
    fn probe_turing_machine(&self) -> LanguageType {
        let simulator = Simulator::with_limits(self.automaton, self.limits);
        let inputs = probe_inputs(self.automaton.get_alphabet(), self.limits.tm_probe_length);

        for input in &inputs {
            let unbounded = match simulator.run_tm(input) {
                Err(SimulationError::StepLimitExceeded { limit }) => Some(format!(
                    "input {input:?} did not halt within {limit} steps"
                )),
                Err(err) => Some(err.to_string()),
                Ok(run) if run.leftmost < 0 || run.rightmost > input.chars().count() as isize => {
                    Some(format!("the head leaves the input region on {input:?}"))
                }
                Ok(_) => None,
            };

            if let Some(reason) = unbounded {
                debug!(%reason, "turing machine is not bounded");
                return LanguageType {
                    chomsky_type: ChomskyType::Unrestricted,
                    caveat: Some(reason),
                };
            }
        }

        LanguageType {
            chomsky_type: ChomskyType::ContextSensitive,
            caveat: Some(format!(
                "heuristic: all {} inputs up to length {} halted within {} steps without leaving the input, \
                 which suggests a linear bound but does not prove one",
                inputs.len(),
                self.limits.tm_probe_length,
                self.limits.max_steps
            )),
        }
    }

    pub fn chomsky_type_of_language(&self) -> LanguageType {
        match self.automaton.get_kind() {
            AutomatonKind::Dfa | AutomatonKind::Nfa => LanguageType {
                chomsky_type: ChomskyType::Regular,
                caveat: None,
            },
            AutomatonKind::Pda => LanguageType {
                chomsky_type: ChomskyType::ContextFree,
                caveat: None,
            },
            AutomatonKind::Tm => self.probe_turing_machine(),
        }
    }

    pub fn analyze(&self) -> AutomatonAnalysis {
        let all: BTreeSet<&str> = self
            .automaton
            .get_states()
            .iter()
            .map(|state| state.name.as_str())
            .collect();
        let reachable = self.reachable_states();
        let co_reachable = self.co_reachable_states();
        let unreachable: BTreeSet<&str> = all.difference(&reachable).copied().collect();
        let useful: BTreeSet<&str> = reachable.intersection(&co_reachable).copied().collect();
        let useless: BTreeSet<&str> = all.difference(&useful).copied().collect();

        let mut warnings = Vec::new();
        if !unreachable.is_empty() {
            warnings.push(format!(
                "unreachable states: {}",
                unreachable.iter().copied().collect::<Vec<_>>().join(", ")
            ));
        }
        if !useless.is_empty() {
            warnings.push(format!(
                "useless states (unreachable or unable to accept): {}",
                useless.iter().copied().collect::<Vec<_>>().join(", ")
            ));
        }
        if self.automaton.get_accepting_states().is_empty()
            && self.automaton.get_kind() != AutomatonKind::Pda
        {
            warnings.push("no accepting states, the language is empty".to_string());
        }

        let analysis = AutomatonAnalysis {
            class: self.classify_computational_class(),
            language: self.chomsky_type_of_language(),
            num_states: all.len(),
            num_transitions: self.automaton.get_transitions().len(),
            alphabet_size: self.automaton.get_alphabet().len(),
            reachable: collect_strings(&reachable),
            co_reachable: collect_strings(&co_reachable),
            unreachable: collect_strings(&unreachable),
            useless: collect_strings(&useless),
            has_epsilon: self.automaton.has_epsilon(),
            missing_transitions: self.missing_transitions(),
            warnings,
        };

        debug!(
            kind = ?analysis.class.kind,
            language = %analysis.language.chomsky_type,
            "analyzed automaton"
        );

        analysis
    }
}

pub fn analyze_automaton(automaton: &Automaton) -> AutomatonAnalysis {
    Analyzer::new(automaton).analyze()
}

pub fn analyze_automaton_with(automaton: &Automaton, limits: Limits) -> AutomatonAnalysis {
    Analyzer::with_limits(automaton, limits).analyze()
}

#[cfg(test)]
mod analyzer_test {
    use super::*;
    use crate::automaton::parse_automaton;
    use pretty_assertions::assert_eq;

    fn names(states: &[&str]) -> BTreeSet<String> {
        states.iter().map(|state| state.to_string()).collect()
    }

    #[test]
    fn test_complete_dfa() {
        let dfa = parse_automaton(
            "states: even, odd\nalphabet: a\ninitial: even\naccepting: even\ntransitions:\neven, a -> odd\nodd, a -> even",
        )
        .unwrap();
        let analysis = analyze_automaton(&dfa);

        assert_eq!(analysis.class.kind, AutomatonKind::Dfa);
        assert!(analysis.class.deterministic);
        assert_eq!(analysis.language.chomsky_type, ChomskyType::Regular);
        assert!(analysis.is_complete());
        assert!(analysis.useless.is_empty());
        assert!(analysis.warnings.is_empty());
    }

    #[test]
    fn test_structural_findings() {
        let dfa = parse_automaton(
            "states: q0, q1, trap, lost\nalphabet: a, b\ninitial: q0\naccepting: q1\ntransitions:\nq0, a -> q1\nq0, b -> trap\nlost, a -> q1",
        )
        .unwrap();
        let analysis = analyze_automaton(&dfa);

        assert_eq!(analysis.reachable, names(&["q0", "q1", "trap"]));
        assert_eq!(analysis.co_reachable, names(&["lost", "q0", "q1"]));
        assert_eq!(analysis.unreachable, names(&["lost"]));
        assert_eq!(analysis.useless, names(&["lost", "trap"]));
        assert_eq!(
            analysis.missing_transitions,
            vec![
                ("q1".to_string(), "a".to_string()),
                ("q1".to_string(), "b".to_string()),
                ("trap".to_string(), "a".to_string()),
                ("trap".to_string(), "b".to_string()),
                ("lost".to_string(), "b".to_string()),
            ]
        );
        assert_eq!(analysis.warnings.len(), 2);

        let text = analysis.to_string();
        assert!(text.contains("Reachable: q0, q1, trap"));
        assert!(text.contains("No move from lost on b"));
    }

    #[test]
    fn test_nfa_that_is_deterministic_in_practice() {
        let nfa = parse_automaton(
            "type: nfa\nstates: q0, q1\nalphabet: a\ninitial: q0\naccepting: q1\ntransitions:\nq0, a -> q1",
        )
        .unwrap();
        let class = Analyzer::new(&nfa).classify_computational_class();

        assert_eq!(class.kind, AutomatonKind::Nfa);
        assert!(class.deterministic);
        assert_eq!(
            class.notes,
            vec!["declared nondeterministic, but every move is determined".to_string()]
        );
    }

    #[test]
    fn test_pda_language_is_context_free() {
        let pda = parse_automaton(
            "states: q0\nalphabet: a\nstack alphabet: Z\ninitial: q0\ntransitions:\nq0, a, Z -> q0 / ε",
        )
        .unwrap();
        let analysis = analyze_automaton(&pda);

        assert_eq!(analysis.language.chomsky_type, ChomskyType::ContextFree);
        assert!(analysis.class.deterministic);
        assert!(analysis.class.notes.contains(&"accepts by empty stack".to_string()));
        assert!(analysis.useless.is_empty());
    }

    #[test]
    fn test_bounded_tm_is_a_type_1_guess() {
        let tm = parse_automaton(
            "states: q0, acc\nalphabet: a, b\ntape alphabet: a, b, _\ninitial: q0\naccepting: acc\ntransitions:\nq0, a -> q0, b, R\nq0, _ -> acc, _, S",
        )
        .unwrap();
        let language = Analyzer::new(&tm).chomsky_type_of_language();

        assert_eq!(language.chomsky_type, ChomskyType::ContextSensitive);
        assert!(language.caveat.unwrap().starts_with("heuristic"));
    }

    #[test]
    fn test_looping_tm_stays_type_0() {
        let tm = parse_automaton(
            "states: q0, acc\nalphabet: a\ntape alphabet: a, _\ninitial: q0\naccepting: acc\ntransitions:\nq0, _ -> q0, _, S",
        )
        .unwrap();
        let limits = Limits {
            max_steps: 100,
            ..Limits::default()
        };
        let language = Analyzer::with_limits(&tm, limits).chomsky_type_of_language();

        assert_eq!(language.chomsky_type, ChomskyType::Unrestricted);
        assert_eq!(
            language.caveat,
            Some("input \"\" did not halt within 100 steps".to_string())
        );
    }

    #[test]
    fn test_tm_leaving_the_input_stays_type_0() {
        let tm = parse_automaton(
            "states: q0, q1, acc\nalphabet: a\ntape alphabet: a, _\ninitial: q0\naccepting: acc\ntransitions:\nq0, a -> q1, a, L\nq1, _ -> acc, _, S",
        )
        .unwrap();
        let language = analyze_automaton(&tm).language;

        assert_eq!(language.chomsky_type, ChomskyType::Unrestricted);
    }
}
