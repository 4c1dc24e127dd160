use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    fmt,
};

use serde::Serialize;

pub mod loader;
pub mod simulate;

pub use loader::parse_automaton;

pub const EPSILON: &str = "ε";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum AutomatonKind {
    Dfa,
    Nfa,
    Pda,
    Tm,
}

impl AutomatonKind {
    pub fn get_keyword(self) -> &'static str {
        match self {
            AutomatonKind::Dfa => "dfa",
            AutomatonKind::Nfa => "nfa",
            AutomatonKind::Pda => "pda",
            AutomatonKind::Tm => "tm",
        }
    }
}

impl fmt::Display for AutomatonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AutomatonKind::Dfa => "deterministic finite automaton",
            AutomatonKind::Nfa => "nondeterministic finite automaton",
            AutomatonKind::Pda => "pushdown automaton",
            AutomatonKind::Tm => "Turing machine",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct State {
    pub name: String,
    pub initial: bool,
    pub accepting: bool,
}

impl State {
    pub fn new(name: impl Into<String>) -> Self {
        State {
            name: name.into(),
            initial: false,
            accepting: false,
        }
    }

    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    pub fn accepting(mut self) -> Self {
        self.accepting = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Move {
    Left,
    Right,
    Stay,
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let letter = match self {
            Move::Left => "L",
            Move::Right => "R",
            Move::Stay => "S",
        };
        write!(f, "{letter}")
    }
}

/// What a transition does besides changing state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Action {
    None,
    /// `pop` of `None` leaves the stack untouched; `push` lists the new top first.
    Stack {
        pop: Option<String>,
        push: Vec<String>,
    },
    Tape {
        write: String,
        direction: Move,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Transition {
    pub from: String,
    /// `None` is an epsilon move.
    pub symbol: Option<String>,
    pub to: Vec<String>,
    pub action: Action,
}

impl Transition {
    pub fn new(from: impl Into<String>, symbol: Option<&str>, to: impl Into<String>) -> Self {
        Transition {
            from: from.into(),
            symbol: symbol.map(str::to_string),
            to: vec![to.into()],
            action: Action::None,
        }
    }

    pub fn with_targets(mut self, to: Vec<String>) -> Self {
        self.to = to;
        self
    }

    pub fn with_action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn is_epsilon(&self) -> bool {
        self.symbol.is_none()
    }

    pub fn get_symbol(&self) -> &str {
        self.symbol.as_deref().unwrap_or(EPSILON)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Variant {
    Dfa,
    Nfa,
    Pda {
        stack_alphabet: BTreeSet<String>,
        initial_stack: Option<String>,
    },
    Tm {
        tape_alphabet: BTreeSet<String>,
        blank: String,
    },
}

impl Variant {
    pub fn get_kind(&self) -> AutomatonKind {
        match self {
            Variant::Dfa => AutomatonKind::Dfa,
            Variant::Nfa => AutomatonKind::Nfa,
            Variant::Pda { .. } => AutomatonKind::Pda,
            Variant::Tm { .. } => AutomatonKind::Tm,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Fault {
    Syntax(String),
    MissingSection(&'static str),
    UnknownType(String),
    NoStates,
    DuplicateState(String),
    UnknownState(String),
    UnknownSymbol(String),
    MultiCharacterSymbol(String),
    NoInitialState,
    MultipleInitialStates(Vec<String>),
    NoTargets,
    EpsilonTransition,
    Nondeterministic { state: String, symbol: String },
    UnknownStackSymbol(String),
    UnknownTapeSymbol(String),
    BlankInInputAlphabet(String),
    BlankNotInTapeAlphabet(String),
    InputNotInTapeAlphabet(String),
    WrongAction(AutomatonKind),
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fault::Syntax(reason) => write!(f, "{reason}"),
            Fault::MissingSection(section) => write!(f, "the {section:?} section is missing"),
            Fault::UnknownType(name) => {
                write!(f, "unknown automaton type {name:?}, expected dfa, nfa, pda or tm")
            }
            Fault::NoStates => write!(f, "the automaton has no states"),
            Fault::DuplicateState(name) => write!(f, "state {name:?} is declared twice"),
            Fault::UnknownState(name) => write!(f, "state {name:?} is not declared"),
            Fault::UnknownSymbol(symbol) => {
                write!(f, "symbol {symbol:?} is not in the input alphabet")
            }
            Fault::MultiCharacterSymbol(symbol) => write!(
                f,
                "input symbol {symbol:?} must be a single character"
            ),
            Fault::NoInitialState => write!(f, "no initial state"),
            Fault::MultipleInitialStates(names) => write!(
                f,
                "only a nondeterministic finite automaton may have several initial states, found {}",
                names.join(", ")
            ),
            Fault::NoTargets => write!(f, "the transition has no target state"),
            Fault::EpsilonTransition => write!(f, "epsilon moves are not allowed here"),
            Fault::Nondeterministic { state, symbol } => write!(
                f,
                "more than one move from state {state:?} on {symbol:?}"
            ),
            Fault::UnknownStackSymbol(symbol) => {
                write!(f, "{symbol:?} is not in the stack alphabet")
            }
            Fault::UnknownTapeSymbol(symbol) => write!(f, "{symbol:?} is not in the tape alphabet"),
            Fault::BlankInInputAlphabet(blank) => {
                write!(f, "the blank {blank:?} may not be an input symbol")
            }
            Fault::BlankNotInTapeAlphabet(blank) => {
                write!(f, "the blank {blank:?} is not in the tape alphabet")
            }
            Fault::InputNotInTapeAlphabet(symbol) => write!(
                f,
                "input symbol {symbol:?} is missing from the tape alphabet"
            ),
            Fault::WrongAction(kind) => write!(f, "this action does not belong to a {kind}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedAutomatonError {
    pub line: Option<usize>,
    /// Index of the offending transition when the error came from one.
    pub transition: Option<usize>,
    pub reason: Fault,
}

impl MalformedAutomatonError {
    pub fn new(reason: Fault) -> Self {
        MalformedAutomatonError {
            line: None,
            transition: None,
            reason,
        }
    }

    pub fn at_line(line: usize, reason: Fault) -> Self {
        MalformedAutomatonError {
            line: Some(line),
            transition: None,
            reason,
        }
    }

    fn at_transition(idx: usize, reason: Fault) -> Self {
        MalformedAutomatonError {
            line: None,
            transition: Some(idx),
            reason,
        }
    }
}

impl fmt::Display for MalformedAutomatonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.line, self.transition) {
            (Some(line), _) => write!(f, "Error on line {line}: {}", self.reason),
            (None, Some(idx)) => write!(f, "Error in transition #{}: {}", idx + 1, self.reason),
            (None, None) => write!(f, "Error: {}", self.reason),
        }
    }
}

impl std::error::Error for MalformedAutomatonError {}

/// A validated automaton. Built once through [`Automaton::new`], never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Automaton {
    states: Vec<State>,
    alphabet: BTreeSet<String>,
    transitions: Vec<Transition>,
    variant: Variant,
}

impl Automaton {
    pub fn new(
        states: Vec<State>,
        alphabet: BTreeSet<String>,
        transitions: Vec<Transition>,
        variant: Variant,
    ) -> Result<Self, MalformedAutomatonError> {
        let automaton = Automaton {
            states,
            alphabet,
            transitions,
            variant,
        };
        automaton.validate()?;
        Ok(automaton)
    }

    fn validate(&self) -> Result<(), MalformedAutomatonError> {
        let kind = self.get_kind();

        // Check the state set
        if self.states.is_empty() {
            return Err(MalformedAutomatonError::new(Fault::NoStates));
        }
        let mut names = HashSet::new();
        for state in &self.states {
            if !names.insert(state.name.as_str()) {
                return Err(MalformedAutomatonError::new(Fault::DuplicateState(
                    state.name.clone(),
                )));
            }
        }

        let initial = self.get_initial_states();
        if initial.is_empty() {
            return Err(MalformedAutomatonError::new(Fault::NoInitialState));
        }
        if initial.len() > 1 && kind != AutomatonKind::Nfa {
            return Err(MalformedAutomatonError::new(Fault::MultipleInitialStates(
                initial.iter().map(|name| name.to_string()).collect(),
            )));
        }

        // Check the alphabet
        for symbol in &self.alphabet {
            if symbol.chars().count() != 1 {
                return Err(MalformedAutomatonError::new(Fault::MultiCharacterSymbol(
                    symbol.clone(),
                )));
            }
        }

        match &self.variant {
            Variant::Pda {
                stack_alphabet,
                initial_stack: Some(bottom),
            } if !stack_alphabet.contains(bottom) => {
                return Err(MalformedAutomatonError::new(Fault::UnknownStackSymbol(
                    bottom.clone(),
                )));
            }
            Variant::Tm {
                tape_alphabet,
                blank,
            } => {
                if !tape_alphabet.contains(blank) {
                    return Err(MalformedAutomatonError::new(Fault::BlankNotInTapeAlphabet(
                        blank.clone(),
                    )));
                }
                if self.alphabet.contains(blank) {
                    return Err(MalformedAutomatonError::new(Fault::BlankInInputAlphabet(
                        blank.clone(),
                    )));
                }
                if let Some(missing) = self.alphabet.iter().find(|s| !tape_alphabet.contains(*s)) {
                    return Err(MalformedAutomatonError::new(Fault::InputNotInTapeAlphabet(
                        missing.clone(),
                    )));
                }
            }
            _ => {}
        }

        // Check each transition on its own
        for (idx, transition) in self.transitions.iter().enumerate() {
            self.validate_transition(transition)
                .map_err(|fault| MalformedAutomatonError::at_transition(idx, fault))?;
        }

        // Check determinism where the kind demands it
        if matches!(kind, AutomatonKind::Dfa | AutomatonKind::Tm) {
            let mut seen: HashSet<(&str, &str)> = HashSet::new();
            for (idx, transition) in self.transitions.iter().enumerate() {
                if !seen.insert((&transition.from, transition.get_symbol())) {
                    return Err(MalformedAutomatonError::at_transition(
                        idx,
                        Fault::Nondeterministic {
                            state: transition.from.clone(),
                            symbol: transition.get_symbol().to_string(),
                        },
                    ));
                }
            }
        }

        Ok(())
    }

    fn validate_transition(&self, transition: &Transition) -> Result<(), Fault> {
        let kind = self.get_kind();

        if !self.has_state(&transition.from) {
            return Err(Fault::UnknownState(transition.from.clone()));
        }
        if transition.to.is_empty() {
            return Err(Fault::NoTargets);
        }
        if let Some(target) = transition.to.iter().find(|to| !self.has_state(to)) {
            return Err(Fault::UnknownState(target.clone()));
        }
        if transition.to.len() > 1 && kind != AutomatonKind::Nfa {
            return Err(Fault::Nondeterministic {
                state: transition.from.clone(),
                symbol: transition.get_symbol().to_string(),
            });
        }

        match (&self.variant, &transition.action) {
            (Variant::Dfa | Variant::Nfa, Action::None) => {
                if transition.is_epsilon() && kind == AutomatonKind::Dfa {
                    return Err(Fault::EpsilonTransition);
                }
                self.check_input_symbol(transition)
            }
            (Variant::Pda { stack_alphabet, .. }, Action::Stack { pop, push }) => {
                self.check_input_symbol(transition)?;
                if let Some(symbol) = pop.iter().chain(push.iter()).find(|s| !stack_alphabet.contains(*s)) {
                    return Err(Fault::UnknownStackSymbol(symbol.clone()));
                }
                Ok(())
            }
            (Variant::Tm { tape_alphabet, .. }, Action::Tape { write, .. }) => {
                let Some(read) = &transition.symbol else {
                    return Err(Fault::EpsilonTransition);
                };
                if !tape_alphabet.contains(read) {
                    return Err(Fault::UnknownTapeSymbol(read.clone()));
                }
                if !tape_alphabet.contains(write) {
                    return Err(Fault::UnknownTapeSymbol(write.clone()));
                }
                Ok(())
            }
            _ => Err(Fault::WrongAction(kind)),
        }
    }

    fn check_input_symbol(&self, transition: &Transition) -> Result<(), Fault> {
        match &transition.symbol {
            Some(symbol) if !self.alphabet.contains(symbol) => {
                Err(Fault::UnknownSymbol(symbol.clone()))
            }
            _ => Ok(()),
        }
    }

    pub fn get_kind(&self) -> AutomatonKind {
        self.variant.get_kind()
    }

    pub fn get_states(&self) -> &[State] {
        &self.states
    }

    pub fn get_alphabet(&self) -> &BTreeSet<String> {
        &self.alphabet
    }

    pub fn get_transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn get_variant(&self) -> &Variant {
        &self.variant
    }

    pub fn has_state(&self, name: &str) -> bool {
        self.states.iter().any(|state| state.name == name)
    }

    pub fn get_initial_states(&self) -> Vec<&str> {
        self.states
            .iter()
            .filter(|state| state.initial)
            .map(|state| state.name.as_str())
            .collect()
    }

    pub fn get_accepting_states(&self) -> BTreeSet<&str> {
        self.states
            .iter()
            .filter(|state| state.accepting)
            .map(|state| state.name.as_str())
            .collect()
    }

    pub fn is_accepting(&self, name: &str) -> bool {
        self.states
            .iter()
            .any(|state| state.accepting && state.name == name)
    }

    pub fn transitions_from<'a>(&'a self, state: &'a str) -> impl Iterator<Item = &'a Transition> {
        self.transitions
            .iter()
            .filter(move |transition| transition.from == state)
    }

    /// Targets of `state` on `symbol` (`None` for epsilon).
    pub fn targets<'a>(&'a self, state: &'a str, symbol: Option<&'a str>) -> impl Iterator<Item = &'a str> {
        self.transitions_from(state)
            .filter(move |transition| transition.symbol.as_deref() == symbol)
            .flat_map(|transition| transition.to.iter().map(String::as_str))
    }

    pub fn has_epsilon(&self) -> bool {
        self.transitions.iter().any(Transition::is_epsilon)
    }

    /// State graph edges, ignoring symbols and actions.
    pub fn get_edges(&self) -> BTreeMap<&str, BTreeSet<&str>> {
        let mut edges: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for transition in &self.transitions {
            edges
                .entry(transition.from.as_str())
                .or_default()
                .extend(transition.to.iter().map(String::as_str));
        }
        edges
    }

    /// Whether at most one move is ever possible, whatever the declared kind.
    pub fn is_deterministic(&self) -> bool {
        match &self.variant {
            Variant::Dfa | Variant::Tm { .. } => true,
            Variant::Nfa => {
                let mut seen = HashSet::new();
                self.get_initial_states().len() == 1
                    && self.transitions.iter().all(|transition| {
                        !transition.is_epsilon()
                            && transition.to.len() == 1
                            && seen.insert((&transition.from, &transition.symbol))
                    })
            }
            Variant::Pda { .. } => {
                let conflicting = |first: &Transition, second: &Transition| {
                    let inputs = first.symbol.is_none()
                        || second.symbol.is_none()
                        || first.symbol == second.symbol;
                    let pops = match (&first.action, &second.action) {
                        (Action::Stack { pop: a, .. }, Action::Stack { pop: b, .. }) => {
                            a.is_none() || b.is_none() || a == b
                        }
                        _ => true,
                    };
                    first.from == second.from && inputs && pops
                };
                self.transitions.iter().enumerate().all(|(idx, first)| {
                    self.transitions[idx + 1..]
                        .iter()
                        .all(|second| !conflicting(first, second))
                })
            }
        }
    }
}

fn join<'a>(items: impl IntoIterator<Item = &'a str>) -> String {
    items.into_iter().map(loader::quote).collect::<Vec<_>>().join(", ")
}

// Quoted symbol, or ε for a missing one
fn symbol_or_epsilon(symbol: Option<&str>) -> String {
    symbol.map_or_else(|| EPSILON.to_string(), loader::quote)
}

// Renders the description format read by `parse_automaton`
impl fmt::Display for Automaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "type: {}", self.get_kind().get_keyword())?;
        writeln!(
            f,
            "states: {}",
            join(self.states.iter().map(|state| state.name.as_str()))
        )?;
        writeln!(f, "alphabet: {}", join(self.alphabet.iter().map(String::as_str)))?;

        match &self.variant {
            Variant::Pda {
                stack_alphabet,
                initial_stack,
            } => {
                writeln!(
                    f,
                    "stack alphabet: {}",
                    join(stack_alphabet.iter().map(String::as_str))
                )?;
                writeln!(
                    f,
                    "initial stack: {}",
                    symbol_or_epsilon(initial_stack.as_deref())
                )?;
            }
            Variant::Tm {
                tape_alphabet,
                blank,
            } => {
                writeln!(
                    f,
                    "tape alphabet: {}",
                    join(tape_alphabet.iter().map(String::as_str))
                )?;
                writeln!(f, "blank: {}", loader::quote(blank))?;
            }
            Variant::Dfa | Variant::Nfa => {}
        }

        writeln!(f, "initial: {}", join(self.get_initial_states()))?;
        writeln!(f, "accepting: {}", join(self.get_accepting_states()))?;
        write!(f, "transitions:")?;

        for transition in &self.transitions {
            let targets = join(transition.to.iter().map(String::as_str));
            write!(
                f,
                "\n{}, {}",
                loader::quote(&transition.from),
                symbol_or_epsilon(transition.symbol.as_deref())
            )?;
            match &transition.action {
                Action::None => write!(f, " -> {targets}")?,
                Action::Stack { pop, push } => {
                    let push = if push.is_empty() {
                        EPSILON.to_string()
                    } else {
                        push.iter()
                            .map(|symbol| loader::quote(symbol))
                            .collect::<Vec<_>>()
                            .join(" ")
                    };
                    write!(
                        f,
                        ", {} -> {targets} / {push}",
                        symbol_or_epsilon(pop.as_deref())
                    )?;
                }
                Action::Tape { write, direction } => write!(
                    f,
                    " -> {targets}, {}, {direction}",
                    loader::quote(write)
                )?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod automaton_test {
    use super::*;

    fn alphabet(symbols: &[&str]) -> BTreeSet<String> {
        symbols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_dfa_rejects_epsilon() {
        let result = Automaton::new(
            vec![State::new("q0").initial(), State::new("q1").accepting()],
            alphabet(&["a"]),
            vec![Transition::new("q0", None, "q1")],
            Variant::Dfa,
        );

        let err = result.unwrap_err();
        assert_eq!(err.transition, Some(0));
        assert_eq!(err.reason, Fault::EpsilonTransition);
    }

    #[test]
    fn test_dfa_rejects_two_moves_on_one_symbol() {
        let result = Automaton::new(
            vec![State::new("q0").initial(), State::new("q1").accepting()],
            alphabet(&["a"]),
            vec![
                Transition::new("q0", Some("a"), "q0"),
                Transition::new("q0", Some("a"), "q1"),
            ],
            Variant::Dfa,
        );

        assert_eq!(
            result.unwrap_err().reason,
            Fault::Nondeterministic {
                state: "q0".to_string(),
                symbol: "a".to_string()
            }
        );
    }

    #[test]
    fn test_nfa_allows_several_initial_states() {
        let automaton = Automaton::new(
            vec![State::new("p").initial(), State::new("q").initial().accepting()],
            alphabet(&["a"]),
            vec![Transition::new("p", Some("a"), "q")],
            Variant::Nfa,
        )
        .unwrap();

        assert_eq!(automaton.get_initial_states(), vec!["p", "q"]);
        assert!(!automaton.is_deterministic());
    }

    #[test]
    fn test_pda_stack_symbols_are_checked() {
        let result = Automaton::new(
            vec![State::new("q0").initial()],
            alphabet(&["a"]),
            vec![Transition::new("q0", Some("a"), "q0").with_action(Action::Stack {
                pop: Some("Z".to_string()),
                push: vec!["Y".to_string()],
            })],
            Variant::Pda {
                stack_alphabet: alphabet(&["Z"]),
                initial_stack: Some("Z".to_string()),
            },
        );

        assert_eq!(
            result.unwrap_err().reason,
            Fault::UnknownStackSymbol("Y".to_string())
        );
    }

    #[test]
    fn test_tm_blank_must_stay_off_the_input() {
        let result = Automaton::new(
            vec![State::new("q0").initial()],
            alphabet(&["a", "_"]),
            vec![],
            Variant::Tm {
                tape_alphabet: alphabet(&["a", "_"]),
                blank: "_".to_string(),
            },
        );

        assert_eq!(
            result.unwrap_err().reason,
            Fault::BlankInInputAlphabet("_".to_string())
        );
    }

    #[test]
    fn test_finite_action_in_tm_is_rejected() {
        let result = Automaton::new(
            vec![State::new("q0").initial()],
            alphabet(&["a"]),
            vec![Transition::new("q0", Some("a"), "q0")],
            Variant::Tm {
                tape_alphabet: alphabet(&["a", "_"]),
                blank: "_".to_string(),
            },
        );

        assert_eq!(
            result.unwrap_err().reason,
            Fault::WrongAction(AutomatonKind::Tm)
        );
    }
}
