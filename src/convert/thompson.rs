use crate::{
    automaton::{Automaton, MalformedAutomatonError, State, Transition, Variant},
    regex::Regex,
};

// Entry and exit state of a partially built machine
#[derive(Debug, Clone, Copy)]
struct Fragment {
    start: usize,
    accept: usize,
}

#[derive(Default)]
struct Builder {
    num_states: usize,
    transitions: Vec<(usize, Option<char>, usize)>,
}

impl Builder {
    fn new_state(&mut self) -> usize {
        self.num_states += 1;
        self.num_states - 1
    }

    fn epsilon(&mut self, from: usize, to: usize) {
        self.transitions.push((from, None, to));
    }

    fn build(&mut self, regex: &Regex) -> Fragment {
        match regex {
            Regex::Epsilon => {
                let start = self.new_state();
                let accept = self.new_state();
                self.epsilon(start, accept);
                Fragment { start, accept }
            }
            Regex::Literal(c) => {
                let start = self.new_state();
                let accept = self.new_state();
                self.transitions.push((start, Some(*c), accept));
                Fragment { start, accept }
            }
            Regex::Concat(items) if items.is_empty() => self.build(&Regex::Epsilon),
            Regex::Concat(items) => {
                let fragments: Vec<Fragment> = items.iter().map(|item| self.build(item)).collect();
                for pair in fragments.windows(2) {
                    self.epsilon(pair[0].accept, pair[1].start);
                }
                Fragment {
                    start: fragments[0].start,
                    accept: fragments[fragments.len() - 1].accept,
                }
            }
            Regex::Alternation(items) => {
                let start = self.new_state();
                let fragments: Vec<Fragment> = items.iter().map(|item| self.build(item)).collect();
                let accept = self.new_state();
                for fragment in fragments {
                    self.epsilon(start, fragment.start);
                    self.epsilon(fragment.accept, accept);
                }
                Fragment { start, accept }
            }
            Regex::Star(inner) => {
                let start = self.new_state();
                let body = self.build(inner);
                let accept = self.new_state();
                self.epsilon(start, body.start);
                self.epsilon(start, accept);
                self.epsilon(body.accept, body.start);
                self.epsilon(body.accept, accept);
                Fragment { start, accept }
            }
            Regex::Plus(inner) => {
                let start = self.new_state();
                let body = self.build(inner);
                let accept = self.new_state();
                self.epsilon(start, body.start);
                self.epsilon(body.accept, body.start);
                self.epsilon(body.accept, accept);
                Fragment { start, accept }
            }
            Regex::Optional(inner) => {
                let start = self.new_state();
                let body = self.build(inner);
                let accept = self.new_state();
                self.epsilon(start, body.start);
                self.epsilon(start, accept);
                self.epsilon(body.accept, accept);
                Fragment { start, accept }
            }
        }
    }
}

fn state_name(idx: usize) -> String {
    format!("q{idx}")
}

/// Thompson construction: one fixed fragment per operator, joined by epsilon
/// moves, states named `q0, q1, ...` in the order they are created.
pub fn regex_to_nfa(regex: &Regex) -> Result<Automaton, MalformedAutomatonError> {
    let mut builder = Builder::default();
    let fragment = builder.build(regex);

    let states = (0..builder.num_states)
        .map(|idx| {
            let mut state = State::new(state_name(idx));
            state.initial = idx == fragment.start;
            state.accepting = idx == fragment.accept;
            state
        })
        .collect();

    let transitions = builder
        .transitions
        .iter()
        .map(|(from, symbol, to)| {
            let symbol = symbol.map(|c| c.to_string());
            Transition::new(state_name(*from), symbol.as_deref(), state_name(*to))
        })
        .collect();

    Automaton::new(states, regex.get_alphabet(), transitions, Variant::Nfa)
}

#[cfg(test)]
mod thompson_test {
    use super::*;
    use crate::automaton::simulate::Simulator;

    fn nfa(text: &str) -> Automaton {
        regex_to_nfa(&Regex::parse(text).unwrap()).unwrap()
    }

    #[test]
    fn test_literal_fragment() {
        let automaton = nfa("a");

        assert_eq!(automaton.get_states().len(), 2);
        assert_eq!(automaton.get_initial_states(), vec!["q0"]);
        assert!(automaton.is_accepting("q1"));
        assert_eq!(
            automaton.get_transitions(),
            &[Transition::new("q0", Some("a"), "q1")]
        );
    }

    #[test]
    fn test_empty_sequence_is_the_empty_string() {
        let automaton = regex_to_nfa(&Regex::Concat(Vec::new())).unwrap();
        let simulator = Simulator::new(&automaton);

        assert_eq!(automaton.get_states().len(), 2);
        assert_eq!(simulator.accepts(""), Ok(true));
    }

    #[test]
    fn test_star_fragment_uses_epsilon_moves() {
        let automaton = nfa("a*");

        assert_eq!(automaton.get_states().len(), 4);
        assert_eq!(
            automaton
                .get_transitions()
                .iter()
                .filter(|transition| transition.is_epsilon())
                .count(),
            4
        );
    }

    #[test]
    fn test_nfa_accepts_the_language() {
        let automaton = nfa("a(b|c)*");
        let simulator = Simulator::new(&automaton);

        for (input, expected) in [("a", true), ("abcbc", true), ("", false), ("ba", false)] {
            assert_eq!(simulator.accepts(input), Ok(expected), "input {input:?}");
        }
    }
}
