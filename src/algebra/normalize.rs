//! Rewriting human-typed equations into a canonical, whitespace-separated
//! token string.

use log::trace;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::{
    error::Error,
    fmt::{self, Display, Formatter},
};

/// Names which are always parsed as a function call when followed by `(`,
/// longest first.
pub const FUNCTIONS: &[&str] = &[
    "arcsin", "arccos", "arctan", "cosec", "sqrt", "sin", "cos", "tan", "sec",
    "cot", "log", "ln",
];

/// Reserved constant names.
pub const CONSTANTS: &[&str] = &["theta", "pi", "e"];

/// `x` or `y` directly after another letter or digit.
static IMPLIED_XY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9A-Za-z])([xy])").unwrap());

/// A whole word, a number or `)` directly before `(`.
static BEFORE_PAREN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z_][0-9A-Za-z_]*|[0-9.]+|\))\(").unwrap()
});

static AFTER_PAREN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\)([0-9A-Za-z(])").unwrap());

static NUMBER_BEFORE_RESERVED: Lazy<Regex> = Lazy::new(|| {
    let words: Vec<&str> =
        FUNCTIONS.iter().chain(CONSTANTS).copied().collect();
    // the number can't be the tail of an identifier like `var5e`
    let pattern =
        format!(r"(^|[^0-9A-Za-z_.])([0-9.]+)({})\b", words.join("|"));
    Regex::new(&pattern).unwrap()
});

static OPERATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[()^/*+\-]").unwrap());

static WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Za-z_][0-9A-Za-z_]*").unwrap());

/// Rewrite `raw` into a string where every token is separated by a single
/// space.
///
/// The rewrites happen in a fixed order:
///
/// 1. strip all whitespace
/// 2. `[` and `]` become `(` and `)`
/// 3. a letter or digit followed by `x` or `y` is a multiplication (`8x`,
///    `xy`, `ax`)
/// 4. a word, number or `)` followed by `(` is a multiplication unless the
///    word is one of the [`FUNCTIONS`], and a `)` followed by a word, digit or
///    `(` is always a multiplication
/// 5. a number followed by a reserved word is a multiplication (`2pi`),
///    unless the number ends an identifier (`var5e`)
/// 6. operators and brackets are padded with spaces
/// 7. reserved words are padded with spaces
///
/// Finally the brackets must balance.
pub fn normalize(raw: &str) -> Result<String, NormalizationError> {
    let equation: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '[' => '(',
            ']' => ')',
            other => other,
        })
        .collect();

    let equation = replace_until_stable(&IMPLIED_XY, equation, "${1}*${2}");
    let equation = implicit_multiplication(&equation);
    let equation =
        NUMBER_BEFORE_RESERVED.replace_all(&equation, "${1}${2}*${3}");
    let equation = OPERATOR.replace_all(&equation, " $0 ");
    let equation = WORD.replace_all(&equation, |caps: &Captures<'_>| {
        let word = &caps[0];
        if is_reserved(word) {
            format!(" {} ", word)
        } else {
            word.to_string()
        }
    });

    let normalized = equation.split_whitespace().collect::<Vec<_>>().join(" ");
    check_brackets(&normalized)?;

    trace!("Normalized \"{}\" to \"{}\"", raw, normalized);

    Ok(normalized)
}

/// Is this one of the reserved function or constant names?
pub fn is_reserved(word: &str) -> bool {
    FUNCTIONS.contains(&word) || CONSTANTS.contains(&word)
}

/// Apply a replacement repeatedly, so overlapping matches (`xxx`) are all
/// rewritten.
fn replace_until_stable(re: &Regex, mut text: String, rep: &str) -> String {
    loop {
        let next = re.replace_all(&text, rep).into_owned();
        if next == text {
            return text;
        }
        text = next;
    }
}

fn implicit_multiplication(equation: &str) -> String {
    let equation =
        BEFORE_PAREN.replace_all(equation, |caps: &Captures<'_>| {
            let before = &caps[1];
            if FUNCTIONS.contains(&before) {
                format!("{}(", before)
            } else {
                format!("{}*(", before)
            }
        });

    AFTER_PAREN.replace_all(&equation, ")*${1}").into_owned()
}

fn check_brackets(equation: &str) -> Result<(), NormalizationError> {
    let opening = equation.matches('(').count();
    let closing = equation.matches(')').count();

    if opening == closing {
        Ok(())
    } else {
        Err(NormalizationError::UnbalancedBrackets { opening, closing })
    }
}

/// Errors that may occur while normalizing an equation.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizationError {
    UnbalancedBrackets { opening: usize, closing: usize },
}

impl Display for NormalizationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationError::UnbalancedBrackets { opening, closing } => {
                write!(
                    f,
                    "Unbalanced brackets: {} opening but {} closing",
                    opening, closing
                )
            },
        }
    }
}

impl Error for NormalizationError {}
