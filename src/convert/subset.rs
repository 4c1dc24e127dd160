use std::collections::{BTreeMap, BTreeSet, VecDeque};

use eyre::{Report, Result};
use tracing::debug;

use super::ConversionError;
use crate::automaton::{Automaton, State, Transition, Variant, simulate::Simulator};

/// A DFA together with the NFA states each of its states stands for.
#[derive(Debug, Clone)]
pub struct SubsetResult {
    pub dfa: Automaton,
    pub subsets: Vec<BTreeSet<String>>,
}

fn dfa_state_name(idx: usize) -> String {
    format!("D{idx}")
}

fn minimal_state_name(idx: usize) -> String {
    format!("M{idx}")
}

/// Subset construction over the sorted alphabet. States are named `D0, D1, ...`
/// in discovery order. The empty subset becomes a dead state only when
/// `complete` is set.
pub fn nfa_to_dfa(
    nfa: &Automaton,
    complete: bool,
    max_states: usize,
) -> Result<SubsetResult> {
    let simulator = Simulator::new(nfa);
    let alphabet: Vec<&str> = nfa.get_alphabet().iter().map(String::as_str).collect();

    let start = simulator.epsilon_closure(nfa.get_initial_states().into_iter().collect());

    let mut subsets: Vec<BTreeSet<&str>> = vec![start.clone()];
    let mut index: BTreeMap<BTreeSet<&str>, usize> = BTreeMap::from([(start, 0)]);
    let mut queue: VecDeque<usize> = VecDeque::from([0]);
    let mut transitions = Vec::new();

    while let Some(current) = queue.pop_front() {
        for &symbol in &alphabet {
            let moved: BTreeSet<&str> = subsets[current]
                .iter()
                .flat_map(|&state| nfa.targets(state, Some(symbol)))
                .collect();
            let target = simulator.epsilon_closure(moved);

            if target.is_empty() && !complete {
                continue;
            }

            let target_idx = match index.get(&target) {
                Some(idx) => *idx,
                None => {
                    if subsets.len() >= max_states {
                        return Err(Report::new(ConversionError::StateLimitExceeded {
                            limit: max_states,
                        }));
                    }
                    let idx = subsets.len();
                    subsets.push(target.clone());
                    index.insert(target, idx);
                    queue.push_back(idx);
                    idx
                }
            };

            transitions.push(Transition::new(
                dfa_state_name(current),
                Some(symbol),
                dfa_state_name(target_idx),
            ));
        }
    }

    let states = subsets
        .iter()
        .enumerate()
        .map(|(idx, subset)| {
            let mut state = State::new(dfa_state_name(idx));
            state.initial = idx == 0;
            state.accepting = subset.iter().any(|name| nfa.is_accepting(name));
            state
        })
        .collect();

    let dfa = Automaton::new(states, nfa.get_alphabet().clone(), transitions, Variant::Dfa)?;

    debug!(states = subsets.len(), "subset construction finished");

    Ok(SubsetResult {
        dfa,
        subsets: subsets
            .into_iter()
            .map(|subset| subset.into_iter().map(str::to_string).collect())
            .collect(),
    })
}

// Move on `symbol`, treating dropped states as the dead state
fn next_state<'a>(
    dfa: &'a Automaton,
    kept: &BTreeSet<&'a str>,
    state: &'a str,
    symbol: &'a str,
) -> Option<&'a str> {
    dfa.targets(state, Some(symbol))
        .next()
        .filter(|target| kept.contains(target))
}

// States that can still reach an accepting state
pub(crate) fn co_reachable<'a>(dfa: &'a Automaton) -> BTreeSet<&'a str> {
    let mut alive: BTreeSet<&str> = dfa.get_accepting_states();
    loop {
        let before = alive.len();
        for transition in dfa.get_transitions() {
            if transition.to.iter().any(|to| alive.contains(to.as_str())) {
                alive.insert(transition.from.as_str());
            }
        }
        if alive.len() == before {
            return alive;
        }
    }
}

/// Moore partition refinement followed by renaming to `M0, M1, ...` in
/// breadth-first order from the initial state. For a partial DFA, states that
/// cannot reach acceptance are merged into the implicit dead state and dropped.
pub fn minimize(dfa: &Automaton, complete: bool) -> Result<Automaton> {
    let alphabet: Vec<&str> = dfa.get_alphabet().iter().map(String::as_str).collect();
    let Some(initial) = dfa.get_initial_states().first().copied() else {
        return Err(Report::new(ConversionError::EmptyLanguage));
    };

    // Keep reachable states, and for a partial DFA only the live ones
    let reachable = {
        let edges = dfa.get_edges();
        let mut seen = BTreeSet::from([initial]);
        let mut queue = VecDeque::from([initial]);
        while let Some(state) = queue.pop_front() {
            for &next in edges.get(state).into_iter().flatten() {
                if seen.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        seen
    };
    let kept: BTreeSet<&str> = if complete {
        reachable
    } else {
        let alive = co_reachable(dfa);
        reachable.intersection(&alive).copied().collect()
    };

    if !kept.contains(initial) {
        // Nothing is accepted, a single rejecting state is minimal
        let state = State::new(minimal_state_name(0)).initial();
        let transitions = if complete {
            alphabet
                .iter()
                .map(|&symbol| {
                    Transition::new(minimal_state_name(0), Some(symbol), minimal_state_name(0))
                })
                .collect()
        } else {
            Vec::new()
        };
        let empty =
            Automaton::new(vec![state], dfa.get_alphabet().clone(), transitions, Variant::Dfa)?;
        return Ok(empty);
    }

    // Start from accepting versus rejecting and split until stable
    let mut block: BTreeMap<&str, usize> = kept
        .iter()
        .map(|state| (*state, usize::from(dfa.is_accepting(state))))
        .collect();
    let mut num_blocks = block.values().collect::<BTreeSet<_>>().len();

    loop {
        let mut signatures: BTreeMap<(usize, Vec<Option<usize>>), usize> = BTreeMap::new();
        let mut refined: BTreeMap<&str, usize> = BTreeMap::new();

        for &state in &kept {
            let signature = (
                block[state],
                alphabet
                    .iter()
                    .map(|&symbol| {
                        next_state(dfa, &kept, state, symbol).map(|target| block[target])
                    })
                    .collect::<Vec<_>>(),
            );
            let next_id = signatures.len();
            let id = *signatures.entry(signature).or_insert(next_id);
            refined.insert(state, id);
        }

        let refined_blocks = signatures.len();
        block = refined;
        if refined_blocks == num_blocks {
            break;
        }
        num_blocks = refined_blocks;
    }

    // Representative transitions per block, then breadth-first renaming
    let mut block_moves: BTreeMap<usize, Vec<(&str, usize)>> = BTreeMap::new();
    let mut block_accepting: BTreeMap<usize, bool> = BTreeMap::new();
    for &state in &kept {
        let id = block[state];
        block_accepting.insert(id, dfa.is_accepting(state));
        block_moves.entry(id).or_insert_with(|| {
            alphabet
                .iter()
                .filter_map(|&symbol| {
                    next_state(dfa, &kept, state, symbol).map(|target| (symbol, block[target]))
                })
                .collect()
        });
    }

    let mut order: BTreeMap<usize, usize> = BTreeMap::new();
    let mut queue = VecDeque::from([block[initial]]);
    order.insert(block[initial], 0);
    while let Some(id) = queue.pop_front() {
        for (_, target) in &block_moves[&id] {
            if !order.contains_key(target) {
                order.insert(*target, order.len());
                queue.push_back(*target);
            }
        }
    }

    let mut renamed: Vec<(usize, usize)> = order.iter().map(|(id, idx)| (*idx, *id)).collect();
    renamed.sort();

    let states = renamed
        .iter()
        .map(|(idx, id)| {
            let mut state = State::new(minimal_state_name(*idx));
            state.initial = *idx == 0;
            state.accepting = block_accepting[id];
            state
        })
        .collect();
    let mut transitions = Vec::new();
    for (idx, id) in &renamed {
        for (symbol, target) in &block_moves[id] {
            transitions.push(Transition::new(
                minimal_state_name(*idx),
                Some(*symbol),
                minimal_state_name(order[target]),
            ));
        }
    }

    let minimal = Automaton::new(states, dfa.get_alphabet().clone(), transitions, Variant::Dfa)?;

    debug!(
        before = dfa.get_states().len(),
        after = minimal.get_states().len(),
        "minimized dfa"
    );

    Ok(minimal)
}

#[cfg(test)]
mod subset_test {
    use super::*;
    use crate::{convert::thompson::regex_to_nfa, regex::Regex};
    use pretty_assertions::assert_eq;

    fn nfa(text: &str) -> Automaton {
        regex_to_nfa(&Regex::parse(text).unwrap()).unwrap()
    }

    fn names(automaton: &Automaton) -> Vec<&str> {
        automaton
            .get_states()
            .iter()
            .map(|state| state.name.as_str())
            .collect()
    }

    #[test]
    fn test_subset_construction_numbering() {
        let result = nfa_to_dfa(&nfa("a(b|c)*"), false, 100).unwrap();

        assert_eq!(names(&result.dfa), vec!["D0", "D1", "D2", "D3"]);
        assert_eq!(result.subsets[0], BTreeSet::from(["q0".to_string()]));
        assert_eq!(result.dfa.get_accepting_states(), BTreeSet::from(["D1", "D2", "D3"]));
        assert!(result.dfa.get_transitions().iter().all(|t| t.from != "D0" || t.get_symbol() == "a"));
    }

    #[test]
    fn test_dead_state_only_when_complete() {
        let partial = nfa_to_dfa(&nfa("ab"), false, 100).unwrap();
        assert_eq!(partial.dfa.get_states().len(), 3);

        let complete = nfa_to_dfa(&nfa("ab"), true, 100).unwrap();
        assert_eq!(complete.dfa.get_states().len(), 4);
        assert!(complete.subsets.iter().any(BTreeSet::is_empty));
        assert_eq!(complete.dfa.get_transitions().len(), 8);
    }

    #[test]
    fn test_state_limit() {
        let err = nfa_to_dfa(&nfa("(a|b)*a(a|b)(a|b)(a|b)"), false, 4).unwrap_err();
        assert_eq!(
            err.downcast_ref::<ConversionError>(),
            Some(&ConversionError::StateLimitExceeded { limit: 4 })
        );
    }

    #[test]
    fn test_minimal_dfa_for_a_then_b_or_c_star() {
        let dfa = nfa_to_dfa(&nfa("a(b|c)*"), false, 100).unwrap().dfa;
        let minimal = minimize(&dfa, false).unwrap();

        assert_eq!(names(&minimal), vec!["M0", "M1"]);
        assert_eq!(minimal.get_accepting_states(), BTreeSet::from(["M1"]));
        assert_eq!(
            minimal.get_transitions(),
            &[
                Transition::new("M0", Some("a"), "M1"),
                Transition::new("M1", Some("b"), "M1"),
                Transition::new("M1", Some("c"), "M1"),
            ]
        );
    }

    #[test]
    fn test_minimal_complete_dfa_keeps_one_dead_state() {
        let dfa = nfa_to_dfa(&nfa("a(b|c)*"), true, 100).unwrap().dfa;
        let minimal = minimize(&dfa, true).unwrap();

        assert_eq!(minimal.get_states().len(), 3);
        assert_eq!(minimal.get_transitions().len(), 9);
    }

    #[test]
    fn test_equivalent_regexes_share_a_minimal_dfa() {
        let first = minimize(&nfa_to_dfa(&nfa("(a|b)*"), false, 100).unwrap().dfa, false).unwrap();
        let second = minimize(&nfa_to_dfa(&nfa("(a*b*)*"), false, 100).unwrap().dfa, false).unwrap();

        assert_eq!(first, second);
    }
}
