use std::{
    collections::{BTreeSet, HashSet, VecDeque},
    fmt,
};

use eyre::{Report, Result};
use serde::Serialize;
use tracing::trace;

use super::{Action, Automaton, Move, Variant};
use crate::config::Limits;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimulationError {
    Rejected {
        state: String,
        symbol: String,
        position: usize,
    },
    InvalidSymbol {
        symbol: String,
        position: usize,
    },
    StepLimitExceeded {
        limit: usize,
    },
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected {
                state,
                symbol,
                position,
            } => write!(
                f,
                "Rejected: no transition from state {state:?} on {symbol:?} at position {position}"
            ),
            Self::InvalidSymbol { symbol, position } => write!(
                f,
                "Error: symbol {symbol:?} at position {position} is not in the input alphabet"
            ),
            Self::StepLimitExceeded { limit } => write!(
                f,
                "Error: simulation did not finish within {limit} steps"
            ),
        }
    }
}

impl std::error::Error for SimulationError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RejectReason {
    NoTransition {
        state: String,
        symbol: String,
        position: usize,
    },
    InvalidSymbol {
        symbol: String,
        position: usize,
    },
    /// The input was consumed but no current state accepts.
    NotAccepting { states: Vec<String> },
    /// Every run died before the input was consumed.
    NoAcceptingRun,
    /// The machine stopped in a non-accepting state.
    Halted { state: String, steps: usize },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTransition {
                state,
                symbol,
                position,
            } => write!(
                f,
                "no transition from {state} on {symbol:?} at position {position}"
            ),
            Self::InvalidSymbol { symbol, position } => write!(
                f,
                "{symbol:?} at position {position} is outside the alphabet"
            ),
            Self::NotAccepting { states } => {
                write!(f, "input ended in non-accepting state(s) {}", states.join(", "))
            }
            Self::NoAcceptingRun => write!(f, "no run reaches acceptance"),
            Self::Halted { state, steps } => {
                write!(f, "halted in non-accepting state {state} after {steps} steps")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accept => write!(f, "accepted"),
            Verdict::Reject(reason) => write!(f, "rejected: {reason}"),
        }
    }
}

/// A finished Turing machine run and how far the head travelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TmRun {
    pub verdict: Verdict,
    pub steps: usize,
    pub leftmost: isize,
    pub rightmost: isize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Configuration<'a> {
    state: &'a str,
    position: usize,
    // Top of the stack is the last element
    stack: Vec<&'a str>,
}

struct Tape<'a> {
    cells: VecDeque<&'a str>,
    // Head position of `cells[0]`
    origin: isize,
    blank: &'a str,
}

impl<'a> Tape<'a> {
    fn new(input: &[&'a str], blank: &'a str) -> Self {
        Tape {
            cells: input.iter().copied().collect(),
            origin: 0,
            blank,
        }
    }

    fn read(&self, head: isize) -> &'a str {
        let idx = head - self.origin;
        if idx < 0 {
            return self.blank;
        }
        self.cells.get(idx as usize).copied().unwrap_or(self.blank)
    }

    fn write(&mut self, head: isize, symbol: &'a str) {
        while head < self.origin {
            self.cells.push_front(self.blank);
            self.origin -= 1;
        }
        let idx = (head - self.origin) as usize;
        while self.cells.len() <= idx {
            self.cells.push_back(self.blank);
        }
        self.cells[idx] = symbol;
    }
}

pub struct Simulator<'a> {
    automaton: &'a Automaton,
    limits: Limits,
}

impl<'a> Simulator<'a> {
    pub fn new(automaton: &'a Automaton) -> Self {
        Simulator {
            automaton,
            limits: Limits::default(),
        }
    }

    pub fn with_limits(automaton: &'a Automaton, limits: Limits) -> Self {
        Simulator { automaton, limits }
    }

    // Input symbols are single characters
    fn tokenize<'s>(&self, input: &'s str) -> Result<Vec<&'s str>, RejectReason> {
        let mut symbols = Vec::new();
        for (position, (idx, c)) in input.char_indices().enumerate() {
            let symbol = &input[idx..idx + c.len_utf8()];
            if !self.automaton.get_alphabet().contains(symbol) {
                return Err(RejectReason::InvalidSymbol {
                    symbol: symbol.to_string(),
                    position,
                });
            }
            symbols.push(symbol);
        }
        Ok(symbols)
    }

    // The alphabet's own copy of each input symbol, so runs borrow only the automaton
    fn intern(&self, symbols: &[&str]) -> Vec<&'a str> {
        symbols
            .iter()
            .filter_map(|symbol| self.automaton.get_alphabet().get(*symbol))
            .map(String::as_str)
            .collect()
    }

    /// Runs the automaton. Only an exhausted step budget is an error.
    pub fn run(&self, input: &str) -> Result<Verdict, SimulationError> {
        let symbols = match self.tokenize(input) {
            Ok(symbols) => self.intern(&symbols),
            Err(reason) => return Ok(Verdict::Reject(reason)),
        };

        match self.automaton.get_variant() {
            Variant::Dfa => Ok(self.run_dfa(&symbols)),
            Variant::Nfa => Ok(self.run_nfa(&symbols)),
            Variant::Pda { .. } => self.run_pda(&symbols),
            Variant::Tm { .. } => self.run_tm_symbols(&symbols).map(|run| run.verdict),
        }
    }

    /// Acceptance as a yes/no answer. A missing transition or a foreign
    /// symbol is reported as an error rather than `false`.
    pub fn accepts(&self, input: &str) -> Result<bool, SimulationError> {
        match self.run(input)? {
            Verdict::Accept => Ok(true),
            Verdict::Reject(RejectReason::NoTransition {
                state,
                symbol,
                position,
            }) => Err(SimulationError::Rejected {
                state,
                symbol,
                position,
            }),
            Verdict::Reject(RejectReason::InvalidSymbol { symbol, position }) => {
                Err(SimulationError::InvalidSymbol { symbol, position })
            }
            Verdict::Reject(_) => Ok(false),
        }
    }

    fn run_dfa(&self, symbols: &[&'a str]) -> Verdict {
        let Some(mut current) = self.automaton.get_initial_states().first().copied() else {
            return Verdict::Reject(RejectReason::NoAcceptingRun);
        };

        for (position, &symbol) in symbols.iter().enumerate() {
            match self.automaton.targets(current, Some(symbol)).next() {
                Some(next) => current = next,
                None => {
                    return Verdict::Reject(RejectReason::NoTransition {
                        state: current.to_string(),
                        symbol: symbol.to_string(),
                        position,
                    });
                }
            }
        }

        if self.automaton.is_accepting(current) {
            Verdict::Accept
        } else {
            Verdict::Reject(RejectReason::NotAccepting {
                states: vec![current.to_string()],
            })
        }
    }

    /// States reachable from `states` through epsilon moves alone.
    pub fn epsilon_closure(&self, states: BTreeSet<&'a str>) -> BTreeSet<&'a str> {
        let mut closure = states.clone();
        let mut stack: Vec<&'a str> = states.into_iter().collect();

        while let Some(state) = stack.pop() {
            for next in self.automaton.targets(state, None) {
                if closure.insert(next) {
                    stack.push(next);
                }
            }
        }

        closure
    }

    fn run_nfa(&self, symbols: &[&'a str]) -> Verdict {
        let initial = self.automaton.get_initial_states().into_iter().collect();
        let mut current = self.epsilon_closure(initial);

        for &symbol in symbols {
            let moved: BTreeSet<&str> = current
                .iter()
                .flat_map(|&state| self.automaton.targets(state, Some(symbol)))
                .collect();
            current = self.epsilon_closure(moved);
            if current.is_empty() {
                return Verdict::Reject(RejectReason::NoAcceptingRun);
            }
        }

        if current.iter().any(|state| self.automaton.is_accepting(state)) {
            Verdict::Accept
        } else {
            Verdict::Reject(RejectReason::NotAccepting {
                states: current.iter().map(|state| state.to_string()).collect(),
            })
        }
    }

    // Breadth-first over (state, position, stack), each configuration visited once
    fn run_pda(&self, symbols: &[&'a str]) -> Result<Verdict, SimulationError> {
        let Variant::Pda { initial_stack, .. } = self.automaton.get_variant() else {
            return Ok(Verdict::Reject(RejectReason::NoAcceptingRun));
        };
        let by_empty_stack = self.automaton.get_accepting_states().is_empty();

        let mut queue: VecDeque<Configuration> = VecDeque::new();
        let mut visited: HashSet<Configuration> = HashSet::new();
        for state in self.automaton.get_initial_states() {
            queue.push_back(Configuration {
                state,
                position: 0,
                stack: initial_stack.iter().map(String::as_str).collect(),
            });
        }

        let mut steps = 0;
        while let Some(configuration) = queue.pop_front() {
            if !visited.insert(configuration.clone()) {
                continue;
            }
            steps += 1;
            if steps > self.limits.max_steps {
                return Err(SimulationError::StepLimitExceeded {
                    limit: self.limits.max_steps,
                });
            }

            // Check for acceptance once the input is consumed
            if configuration.position == symbols.len() {
                let accepted = if by_empty_stack {
                    configuration.stack.is_empty()
                } else {
                    self.automaton.is_accepting(configuration.state)
                };
                if accepted {
                    trace!(steps, "pda accepted");
                    return Ok(Verdict::Accept);
                }
            }

            let next_symbol = symbols.get(configuration.position).copied();
            for transition in self.automaton.transitions_from(configuration.state) {
                let Action::Stack { pop, push } = &transition.action else {
                    continue;
                };

                let position = match transition.symbol.as_deref() {
                    None => configuration.position,
                    Some(symbol) if Some(symbol) == next_symbol => configuration.position + 1,
                    Some(_) => continue,
                };

                let mut stack = configuration.stack.clone();
                if let Some(pop) = pop {
                    if stack.last() != Some(&pop.as_str()) {
                        continue;
                    }
                    stack.pop();
                }
                stack.extend(push.iter().rev().map(String::as_str));

                for target in &transition.to {
                    queue.push_back(Configuration {
                        state: target,
                        position,
                        stack: stack.clone(),
                    });
                }
            }
        }

        Ok(Verdict::Reject(RejectReason::NoAcceptingRun))
    }

    fn run_tm_symbols(&self, symbols: &[&'a str]) -> Result<TmRun, SimulationError> {
        let Variant::Tm { blank, .. } = self.automaton.get_variant() else {
            return Ok(TmRun {
                verdict: Verdict::Reject(RejectReason::NoAcceptingRun),
                steps: 0,
                leftmost: 0,
                rightmost: 0,
            });
        };
        let Some(mut state) = self.automaton.get_initial_states().first().copied() else {
            return Ok(TmRun {
                verdict: Verdict::Reject(RejectReason::NoAcceptingRun),
                steps: 0,
                leftmost: 0,
                rightmost: 0,
            });
        };

        let mut tape = Tape::new(symbols, blank);
        let mut head: isize = 0;
        let mut steps = 0;
        let (mut leftmost, mut rightmost) = (0, 0);

        loop {
            if self.automaton.is_accepting(state) {
                return Ok(TmRun {
                    verdict: Verdict::Accept,
                    steps,
                    leftmost,
                    rightmost,
                });
            }

            let read = tape.read(head);
            let transition = self
                .automaton
                .transitions_from(state)
                .find(|transition| transition.symbol.as_deref() == Some(read));

            let Some(transition) = transition else {
                return Ok(TmRun {
                    verdict: Verdict::Reject(RejectReason::Halted {
                        state: state.to_string(),
                        steps,
                    }),
                    steps,
                    leftmost,
                    rightmost,
                });
            };
            let (Action::Tape { write, direction }, Some(target)) =
                (&transition.action, transition.to.first())
            else {
                return Ok(TmRun {
                    verdict: Verdict::Reject(RejectReason::NoAcceptingRun),
                    steps,
                    leftmost,
                    rightmost,
                });
            };

            steps += 1;
            if steps > self.limits.max_steps {
                return Err(SimulationError::StepLimitExceeded {
                    limit: self.limits.max_steps,
                });
            }

            tape.write(head, write);
            head += match direction {
                Move::Left => -1,
                Move::Right => 1,
                Move::Stay => 0,
            };
            leftmost = leftmost.min(head);
            rightmost = rightmost.max(head);
            state = target.as_str();
        }
    }

    /// Runs a Turing machine and reports the head excursion along with the verdict.
    pub fn run_tm(&self, input: &str) -> Result<TmRun, SimulationError> {
        match self.tokenize(input) {
            Ok(symbols) => self.run_tm_symbols(&self.intern(&symbols)),
            Err(reason) => Ok(TmRun {
                verdict: Verdict::Reject(reason),
                steps: 0,
                leftmost: 0,
                rightmost: 0,
            }),
        }
    }
}

impl Automaton {
    pub fn accepts(&self, input: &str) -> Result<bool, SimulationError> {
        Simulator::new(self).accepts(input)
    }
}

pub fn simulate_with(automaton: &Automaton, input: &str, limits: Limits) -> Result<Verdict> {
    Simulator::with_limits(automaton, limits)
        .run(input)
        .map_err(Report::new)
}

pub fn simulate(automaton: &Automaton, input: &str) -> Result<Verdict> {
    simulate_with(automaton, input, Limits::default())
}

#[cfg(test)]
mod simulate_test {
    use super::*;
    use crate::automaton::parse_automaton;
    use pretty_assertions::assert_eq;

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

    const ANBN: &str = "\
states: q0, q1, q2
alphabet: a, b
stack alphabet: Z, A
initial: q0
accepting: q2
transitions:
q0, a, Z -> q0 / A Z
q0, a, A -> q0 / A A
q0, b, A -> q1 / ε
q1, b, A -> q1 / ε
q1, ε, Z -> q2 / Z
";

    fn load(text: &str) -> Automaton {
        parse_automaton(text).unwrap()
    }

    #[test]
    fn test_dfa_acceptance() {
        let dfa = load(EVEN_AS);

        assert_eq!(dfa.accepts("abab"), Ok(true));
        assert_eq!(dfa.accepts(""), Ok(true));
        assert_eq!(dfa.accepts("ab"), Ok(false));
        assert_eq!(
            simulate(&dfa, "ab").unwrap(),
            Verdict::Reject(RejectReason::NotAccepting {
                states: vec!["odd".to_string()]
            })
        );
    }

    #[test]
    fn test_dfa_foreign_symbol_and_missing_move() {
        let dfa = load("states: q0, q1\nalphabet: a, b\ninitial: q0\naccepting: q1\ntransitions:\nq0, a -> q1");

        assert_eq!(
            dfa.accepts("ac"),
            Err(SimulationError::InvalidSymbol {
                symbol: "c".to_string(),
                position: 1
            })
        );
        assert_eq!(
            dfa.accepts("b"),
            Err(SimulationError::Rejected {
                state: "q0".to_string(),
                symbol: "b".to_string(),
                position: 0
            })
        );
    }

    #[test]
    fn test_dfa_ignores_the_step_budget() {
        let dfa = load(EVEN_AS);
        let limits = Limits {
            max_steps: 1,
            ..Limits::default()
        };

        let verdict = simulate_with(&dfa, &"ab".repeat(500), limits).unwrap();
        assert_eq!(verdict, Verdict::Accept);
    }

    #[test]
    fn test_nfa_acceptance() {
        let nfa = load(
            "\
states: s, p, q, r
alphabet: a, b
initial: s
accepting: r
transitions:
s, ε -> r
s, a -> p
s, b -> p
p, a -> p, q
p, b -> p
q, b -> r
",
        );

        assert_eq!(nfa.accepts(""), Ok(true));
        assert_eq!(nfa.accepts("bab"), Ok(true));
        assert_eq!(nfa.accepts("aaab"), Ok(true));
        assert_eq!(nfa.accepts("aba"), Ok(false));
        assert_eq!(nfa.accepts("b"), Ok(false));
    }

    #[test]
    fn test_pda_accepts_by_final_state() {
        let pda = load(ANBN);

        assert_eq!(pda.accepts("ab"), Ok(true));
        assert_eq!(pda.accepts("aaabbb"), Ok(true));
        assert_eq!(pda.accepts("aab"), Ok(false));
        assert_eq!(pda.accepts("ba"), Ok(false));
        assert_eq!(pda.accepts(""), Ok(false));
    }

    #[test]
    fn test_pda_accepts_by_empty_stack() {
        let pda = load(
            "\
states: q0, q1
alphabet: a, b
stack alphabet: Z, A
initial: q0
transitions:
q0, a, Z -> q0 / A Z
q0, a, A -> q0 / A A
q0, b, A -> q1 / ε
q1, b, A -> q1 / ε
q1, ε, Z -> q1 / ε
",
        );

        assert_eq!(pda.accepts("aabb"), Ok(true));
        assert_eq!(pda.accepts("aab"), Ok(false));
    }

    #[test]
    fn test_pda_step_limit() {
        let pda = load(
            "states: q0\nalphabet: a\nstack alphabet: A\ninitial: q0\naccepting: q0\ntransitions:\nq0, ε, ε -> q0 / A",
        );

        let limits = Limits {
            max_steps: 200,
            ..Limits::default()
        };

        let err = simulate_with(&pda, "a", limits).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SimulationError>(),
            Some(&SimulationError::StepLimitExceeded { limit: 200 })
        );
    }

    #[test]
    fn test_tm_acceptance_and_head_excursion() {
        // Accepts a* by walking right to the first blank
        let tm = load(
            "states: q0, acc\nalphabet: a, b\ntape alphabet: a, b, _\ninitial: q0\naccepting: acc\ntransitions:\nq0, a -> q0, a, R\nq0, _ -> acc, _, S",
        );
        let simulator = Simulator::new(&tm);

        let run = simulator.run_tm("aaa").unwrap();
        assert_eq!(run.verdict, Verdict::Accept);
        assert_eq!(run.steps, 4);
        assert_eq!((run.leftmost, run.rightmost), (0, 3));

        let run = simulator.run_tm("ab").unwrap();
        assert_eq!(
            run.verdict,
            Verdict::Reject(RejectReason::Halted {
                state: "q0".to_string(),
                steps: 1
            })
        );
    }

    #[test]
    fn test_tm_step_limit() {
        let tm = load(
            "states: q0, acc\nalphabet: a\ntape alphabet: a, _\ninitial: q0\naccepting: acc\ntransitions:\nq0, a -> q0, a, S",
        );
        let limits = Limits {
            max_steps: 50,
            ..Limits::default()
        };

        let err = Simulator::with_limits(&tm, limits).run("a").unwrap_err();
        assert_eq!(err, SimulationError::StepLimitExceeded { limit: 50 });
    }
}
