use std::collections::BTreeSet;

use eyre::{Report, Result};
use tracing::{debug, warn};

use super::{
    Action, Automaton, AutomatonKind, Fault, MalformedAutomatonError, Move, State, Transition,
    Variant,
};

const EPSILON_TOKENS: [&str; 4] = ["ε", "λ", "eps", "epsilon"];

fn is_epsilon(token: &str) -> bool {
    EPSILON_TOKENS.contains(&token)
}

/// Quotes a symbol or state name the loader would otherwise split, strip or
/// read as epsilon.
pub(super) fn quote(text: &str) -> String {
    let plain = !text.is_empty()
        && !is_epsilon(text)
        && !text.contains("->")
        && !text
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, ',' | '#' | '"' | '\\' | '/'));
    if plain {
        text.to_string()
    } else {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    }
}

fn unquote(token: &str) -> String {
    let Some(inner) = token
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .filter(|_| token.len() >= 2)
    else {
        return token.to_string();
    };
    let mut text = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => text.extend(chars.next()),
            other => text.push(other),
        }
    }
    text
}

// Byte offsets of every char outside double quotes
fn unquoted_positions(text: &str) -> Vec<(usize, char)> {
    let mut positions = Vec::new();
    let mut in_quote = false;
    let mut escaped = false;

    for (idx, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quote => escaped = true,
            '"' => in_quote = !in_quote,
            _ if !in_quote => positions.push((idx, c)),
            _ => {}
        }
    }
    positions
}

// A `#` opens a comment at the start of a line or after whitespace
fn strip_comment(line: &str) -> &str {
    unquoted_positions(line)
        .into_iter()
        .find(|&(idx, c)| {
            c == '#' && line[..idx].chars().next_back().is_none_or(char::is_whitespace)
        })
        .map_or(line, |(idx, _)| &line[..idx])
}

fn split_once_unquoted<'t>(text: &'t str, pattern: &str) -> Option<(&'t str, &'t str)> {
    unquoted_positions(text)
        .into_iter()
        .find(|(idx, _)| text[*idx..].starts_with(pattern))
        .map(|(idx, _)| (&text[..idx], &text[idx + pattern.len()..]))
}

// Raw tokens between separators, quotes kept so epsilon can be told apart
fn split_tokens(text: &str, is_separator: impl Fn(char) -> bool) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut start = 0;
    for (idx, c) in unquoted_positions(text) {
        if is_separator(c) {
            tokens.push(text[start..idx].trim());
            start = idx + c.len_utf8();
        }
    }
    tokens.push(text[start..].trim());
    tokens.into_iter().filter(|token| !token.is_empty()).collect()
}

fn split_list(text: &str) -> Vec<String> {
    split_tokens(text, |c| c == ',')
        .into_iter()
        .map(unquote)
        .collect()
}

#[derive(Debug, Default)]
struct Description {
    kind: Option<AutomatonKind>,
    states: Option<(usize, Vec<String>)>,
    alphabet: Vec<String>,
    stack_alphabet: Option<Vec<String>>,
    // Some(None) when the description asks for an empty initial stack
    initial_stack: Option<Option<String>>,
    tape_alphabet: Option<Vec<String>>,
    blank: Option<String>,
    initial: Option<(usize, Vec<String>)>,
    accepting: Option<(usize, Vec<String>)>,
    // Transition lines, kept raw until the kind is known
    transitions: Vec<(usize, String)>,
}

impl Description {
    fn read(text: &str) -> Result<Self, MalformedAutomatonError> {
        let mut description = Description::default();
        let mut in_transitions = false;

        for (idx, raw) in text.lines().enumerate() {
            let line = idx + 1;
            let content = strip_comment(raw).trim();
            if content.is_empty() {
                continue;
            }

            if in_transitions {
                description.transitions.push((line, content.to_string()));
                continue;
            }

            let Some((key, value)) = content.split_once(':') else {
                return Err(MalformedAutomatonError::at_line(
                    line,
                    Fault::Syntax(format!("expected `key: value`, found {content:?}")),
                ));
            };
            let value = value.trim();

            match key.trim().to_lowercase().as_str() {
                "type" => {
                    let kind = match value.to_lowercase().as_str() {
                        "dfa" => AutomatonKind::Dfa,
                        "nfa" => AutomatonKind::Nfa,
                        "pda" => AutomatonKind::Pda,
                        "tm" => AutomatonKind::Tm,
                        other => {
                            return Err(MalformedAutomatonError::at_line(
                                line,
                                Fault::UnknownType(other.to_string()),
                            ));
                        }
                    };
                    description.kind = Some(kind);
                }
                "states" => description.states = Some((line, split_list(value))),
                "alphabet" => description.alphabet = split_list(value),
                "stack alphabet" => description.stack_alphabet = Some(split_list(value)),
                "initial stack" => {
                    description.initial_stack = Some(input_symbol(value));
                }
                "tape alphabet" => description.tape_alphabet = Some(split_list(value)),
                "blank" => description.blank = Some(unquote(value)),
                "initial" => description.initial = Some((line, split_list(value))),
                "accepting" | "final" => description.accepting = Some((line, split_list(value))),
                "transitions" => {
                    in_transitions = true;
                    if !value.is_empty() {
                        description.transitions.push((line, value.to_string()));
                    }
                }
                other => {
                    return Err(MalformedAutomatonError::at_line(
                        line,
                        Fault::Syntax(format!("unknown section {other:?}")),
                    ));
                }
            }
        }

        Ok(description)
    }

    // Explicit type first, then the alphabets the description declares
    fn infer_kind(&self, transitions: &[Transition]) -> AutomatonKind {
        if let Some(kind) = self.kind {
            return kind;
        }
        if self.tape_alphabet.is_some() || self.blank.is_some() {
            return AutomatonKind::Tm;
        }
        if self.stack_alphabet.is_some() {
            return AutomatonKind::Pda;
        }

        let single_initial = self
            .initial
            .as_ref()
            .is_none_or(|(_, initial)| initial.len() <= 1);
        let mut seen = BTreeSet::new();
        let deterministic = single_initial
            && transitions.iter().all(|transition| {
                !transition.is_epsilon()
                    && transition.to.len() == 1
                    && seen.insert((transition.from.clone(), transition.symbol.clone()))
            });

        if deterministic {
            AutomatonKind::Dfa
        } else {
            AutomatonKind::Nfa
        }
    }

    fn build_states(&self) -> Result<Vec<State>, MalformedAutomatonError> {
        let Some((states_line, names)) = &self.states else {
            return Err(MalformedAutomatonError::new(Fault::MissingSection("states")));
        };
        if names.is_empty() {
            return Err(MalformedAutomatonError::at_line(*states_line, Fault::NoStates));
        }

        let mut states: Vec<State> = names.iter().map(State::new).collect();

        let initial: Vec<(usize, &str)> = match &self.initial {
            Some((line, initial)) => {
                if initial.is_empty() {
                    return Err(MalformedAutomatonError::at_line(*line, Fault::NoInitialState));
                }
                initial.iter().map(|name| (*line, name.as_str())).collect()
            }
            None => {
                warn!(state = %names[0], "initial state not declared, defaulting to the first state");
                vec![(*states_line, names[0].as_str())]
            }
        };
        let accepting = self
            .accepting
            .iter()
            .flat_map(|(line, names)| names.iter().map(move |name| (*line, name.as_str())));

        for (line, name) in initial {
            let Some(state) = states.iter_mut().find(|state| state.name == name) else {
                return Err(MalformedAutomatonError::at_line(
                    line,
                    Fault::UnknownState(name.to_string()),
                ));
            };
            state.initial = true;
        }
        for (line, name) in accepting {
            let Some(state) = states.iter_mut().find(|state| state.name == name) else {
                return Err(MalformedAutomatonError::at_line(
                    line,
                    Fault::UnknownState(name.to_string()),
                ));
            };
            state.accepting = true;
        }

        Ok(states)
    }
}

fn syntax(line: usize, reason: impl Into<String>) -> MalformedAutomatonError {
    MalformedAutomatonError::at_line(line, Fault::Syntax(reason.into()))
}

fn input_symbol(token: &str) -> Option<String> {
    if is_epsilon(token) { None } else { Some(unquote(token)) }
}

// q0, a -> q1[, q2 ...]
fn parse_finite_transition(line: usize, text: &str) -> Result<Transition, MalformedAutomatonError> {
    let Some((left, right)) = split_once_unquoted(text, "->") else {
        return Err(syntax(line, format!("expected `state, symbol -> target`, found {text:?}")));
    };
    let left = split_tokens(left, |c| c == ',');
    let [from, symbol] = &left[..] else {
        return Err(syntax(line, "expected `state, symbol` before `->`"));
    };

    let targets = split_list(right);
    if targets.is_empty() {
        return Err(MalformedAutomatonError::at_line(line, Fault::NoTargets));
    }

    Ok(Transition::new(unquote(from), input_symbol(symbol).as_deref(), "").with_targets(targets))
}

// q0, a, Z -> q1 / A Z
fn parse_pda_transition(line: usize, text: &str) -> Result<Transition, MalformedAutomatonError> {
    let Some((left, right)) = split_once_unquoted(text, "->") else {
        return Err(syntax(
            line,
            format!("expected `state, input, pop -> target / push`, found {text:?}"),
        ));
    };
    let left = split_tokens(left, |c| c == ',');
    let [from, symbol, pop] = &left[..] else {
        return Err(syntax(line, "expected `state, input, pop` before `->`"));
    };

    let (target, push) = match split_once_unquoted(right, "/") {
        Some((target, push)) => (target.trim(), push.trim()),
        None => (right.trim(), ""),
    };
    if target.is_empty() {
        return Err(MalformedAutomatonError::at_line(line, Fault::NoTargets));
    }

    let push: Vec<String> = split_tokens(push, char::is_whitespace)
        .into_iter()
        .filter_map(input_symbol)
        .collect();
    let pop = input_symbol(pop);

    Ok(
        Transition::new(unquote(from), input_symbol(symbol).as_deref(), unquote(target))
            .with_action(Action::Stack { pop, push }),
    )
}

// q0, a -> q1, X, R
fn parse_tm_transition(line: usize, text: &str) -> Result<Transition, MalformedAutomatonError> {
    let Some((left, right)) = split_once_unquoted(text, "->") else {
        return Err(syntax(
            line,
            format!("expected `state, read -> target, write, move`, found {text:?}"),
        ));
    };
    let left = split_list(left);
    let [from, read] = &left[..] else {
        return Err(syntax(line, "expected `state, read` before `->`"));
    };
    let right = split_list(right);
    let [target, write, direction] = &right[..] else {
        return Err(syntax(line, "expected `target, write, move` after `->`"));
    };

    let direction = match direction.as_str() {
        "L" | "l" | "left" | "<" => Move::Left,
        "R" | "r" | "right" | ">" => Move::Right,
        "S" | "s" | "N" | "stay" | "-" => Move::Stay,
        other => return Err(syntax(line, format!("unknown head move {other:?}, expected L, R or S"))),
    };

    Ok(Transition::new(from, Some(read), target).with_action(Action::Tape {
        write: write.clone(),
        direction,
    }))
}

fn parse_rules(text: &str) -> Result<Automaton, MalformedAutomatonError> {
    let description = Description::read(text)?;

    // Transition shape follows the declared alphabets, the FA split comes after
    let shape = match description.kind {
        Some(kind) => kind,
        None if description.tape_alphabet.is_some() || description.blank.is_some() => {
            AutomatonKind::Tm
        }
        None if description.stack_alphabet.is_some() => AutomatonKind::Pda,
        None => AutomatonKind::Nfa,
    };

    let mut lines = Vec::with_capacity(description.transitions.len());
    let mut transitions = Vec::with_capacity(description.transitions.len());
    for (line, text) in &description.transitions {
        let transition = match shape {
            AutomatonKind::Dfa | AutomatonKind::Nfa => parse_finite_transition(*line, text)?,
            AutomatonKind::Pda => parse_pda_transition(*line, text)?,
            AutomatonKind::Tm => parse_tm_transition(*line, text)?,
        };
        lines.push(*line);
        transitions.push(transition);
    }

    let kind = description.infer_kind(&transitions);
    let states = description.build_states()?;
    let alphabet: BTreeSet<String> = description.alphabet.iter().cloned().collect();

    let variant = match kind {
        AutomatonKind::Dfa => Variant::Dfa,
        AutomatonKind::Nfa => Variant::Nfa,
        AutomatonKind::Pda => {
            let listed = description.stack_alphabet.clone().unwrap_or_default();
            let initial_stack = description
                .initial_stack
                .clone()
                .unwrap_or_else(|| listed.first().cloned());
            Variant::Pda {
                stack_alphabet: listed.into_iter().collect(),
                initial_stack,
            }
        }
        AutomatonKind::Tm => {
            let Some(tape_alphabet) = &description.tape_alphabet else {
                return Err(MalformedAutomatonError::new(Fault::MissingSection(
                    "tape alphabet",
                )));
            };
            Variant::Tm {
                tape_alphabet: tape_alphabet.iter().cloned().collect(),
                blank: description.blank.clone().unwrap_or_else(|| "_".to_string()),
            }
        }
    };

    Automaton::new(states, alphabet, transitions, variant).map_err(|mut err| {
        if let Some(idx) = err.transition {
            err.line = lines.get(idx).copied();
        }
        err
    })
}

/// Reads an automaton description.
///
/// ```text
/// states: q0, q1
/// alphabet: a, b
/// initial: q0
/// accepting: q1
/// transitions:
/// q0, a -> q1
/// ```
pub fn parse_automaton(text: &str) -> Result<Automaton> {
    let automaton = parse_rules(text).map_err(Report::new)?;
    debug!(
        kind = ?automaton.get_kind(),
        states = automaton.get_states().len(),
        transitions = automaton.get_transitions().len(),
        "loaded automaton"
    );
    Ok(automaton)
}
