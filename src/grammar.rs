use std::{
    collections::{BTreeSet, HashMap, HashSet, VecDeque},
    fmt,
};

use serde::Serialize;
use tracing::warn;

use crate::cfg::{Grammar, Production, Symbol};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrammarError {
    EmptyGrammarError,
    InvalidGoalError(String),
    ProductionNotDefinedError(String),
    NoNonTerminalError(Production),
}

impl fmt::Display for GrammarError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGrammarError => write!(f, "Error: the grammar has no productions"),
            Self::InvalidGoalError(start) => write!(
                f,
                "Error: Invalid goal term {start:?}! The start symbol must be a non-terminal with at least one production"
            ),
            Self::ProductionNotDefinedError(name) => {
                write!(f, "Error: Undefined non-terminal {name:?} encountered")
            }
            Self::NoNonTerminalError(production) => write!(
                f,
                "Error: the left-hand side of {production} contains no non-terminal"
            ),
        }
    }
}

impl std::error::Error for GrammarError {}

/// Problems that leave the grammar usable for classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum GrammarWarning {
    Unreachable(Vec<String>),
    NonProductive(Vec<String>),
}

impl fmt::Display for GrammarWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable(names) => write!(
                f,
                "non-terminals never reached from the start symbol: {}",
                names.join(", ")
            ),
            Self::NonProductive(names) => write!(
                f,
                "non-terminals that derive no terminal string: {}",
                names.join(", ")
            ),
        }
    }
}

// Every non-terminal that appears on some left-hand side
fn get_lhs_non_terminals(grammar: &Grammar) -> BTreeSet<&str> {
    grammar
        .get_productions()
        .iter()
        .flat_map(|production| production.get_lhs().iter())
        .filter(|symbol| symbol.is_non_terminal())
        .map(Symbol::get_name)
        .collect()
}

// Map each left-hand non-terminal to the non-terminals its productions use
fn get_term_to_non_terminal_map(grammar: &Grammar) -> HashMap<&str, HashSet<&str>> {
    let mut term_to_non_terminal_map: HashMap<&str, HashSet<&str>> = HashMap::new();

    for production in grammar.get_productions() {
        let used: Vec<&str> = production
            .get_rhs()
            .iter()
            .chain(production.get_lhs().iter())
            .filter(|symbol| symbol.is_non_terminal())
            .map(Symbol::get_name)
            .collect();

        for lhs in production.get_lhs().iter().filter(|s| s.is_non_terminal()) {
            term_to_non_terminal_map
                .entry(lhs.get_name())
                .or_default()
                .extend(used.iter().copied());
        }
    }

    term_to_non_terminal_map
}

// Check that the goal term is a non-terminal with at least one production
fn check_goal(grammar: &Grammar) -> Result<(), GrammarError> {
    if grammar.get_productions().is_empty() {
        return Err(GrammarError::EmptyGrammarError);
    }

    let goal = grammar.get_start();
    let has_production = grammar
        .get_productions()
        .iter()
        .any(|production| production.get_lhs().contains(&Symbol::non_terminal(goal)));

    if !has_production {
        return Err(GrammarError::InvalidGoalError(goal.to_string()));
    }

    Ok(())
}

// Check that every non-terminal used on a right-hand side is defined somewhere
fn check_completeness(grammar: &Grammar) -> Result<(), GrammarError> {
    let defined = get_lhs_non_terminals(grammar);

    for production in grammar.get_productions() {
        if !production.get_lhs().iter().any(Symbol::is_non_terminal) {
            return Err(GrammarError::NoNonTerminalError(production.clone()));
        }

        for symbol in production.get_rhs() {
            if let Symbol::NonTerminal(name) = symbol {
                if !defined.contains(name.as_str()) {
                    return Err(GrammarError::ProductionNotDefinedError(name.clone()));
                }
            }
        }
    }

    Ok(())
}

/// Structural invariants every `Grammar` upholds.
pub fn check_structure(grammar: &Grammar) -> Result<(), GrammarError> {
    check_goal(grammar)?;
    check_completeness(grammar)?;
    Ok(())
}

fn check_reachability(
    term_to_non_terminal_map: &HashMap<&str, HashSet<&str>>,
    goal: &str,
    defined: &BTreeSet<&str>,
) -> Option<GrammarWarning> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut queue: VecDeque<&str> = VecDeque::new();

    queue.push_back(goal);

    while let Some(term) = queue.pop_front() {
        if !visited.insert(term) {
            continue;
        }
        if let Some(terms) = term_to_non_terminal_map.get(term) {
            queue.extend(terms.iter());
        }
    }

    let unreachable: Vec<String> = defined
        .iter()
        .filter(|name| !visited.contains(*name))
        .map(|name| name.to_string())
        .collect();

    if unreachable.is_empty() {
        None
    } else {
        Some(GrammarWarning::Unreachable(unreachable))
    }
}

fn check_productivity(grammar: &Grammar, defined: &BTreeSet<&str>) -> Option<GrammarWarning> {
    let mut productive: HashSet<&str> = HashSet::new();

    loop {
        let num_productive = productive.len();

        for production in grammar.get_productions() {
            let body_productive = production.get_rhs().iter().all(|symbol| match symbol {
                Symbol::Terminal(_) => true,
                Symbol::NonTerminal(name) => productive.contains(name.as_str()),
            });

            if body_productive {
                for symbol in production.get_lhs().iter().filter(|s| s.is_non_terminal()) {
                    productive.insert(symbol.get_name());
                }
            }
        }

        if num_productive == productive.len() {
            break;
        }
    }

    let non_productive: Vec<String> = defined
        .iter()
        .filter(|name| !productive.contains(*name))
        .map(|name| name.to_string())
        .collect();

    if non_productive.is_empty() {
        None
    } else {
        Some(GrammarWarning::NonProductive(non_productive))
    }
}

/// Runs the structural checks and collects the non-fatal findings.
pub fn check_correctness(grammar: &Grammar) -> Result<Vec<GrammarWarning>, GrammarError> {
    check_structure(grammar)?;

    let defined = get_lhs_non_terminals(grammar);
    let term_to_non_terminal_map = get_term_to_non_terminal_map(grammar);

    let mut warnings = Vec::new();
    warnings.extend(check_reachability(
        &term_to_non_terminal_map,
        grammar.get_start(),
        &defined,
    ));
    warnings.extend(check_productivity(grammar, &defined));

    for warning in &warnings {
        warn!(%warning, "grammar check");
    }

    Ok(warnings)
}
