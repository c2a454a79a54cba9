//! This module provides the pseudocode sanitizer for custom blocks, utilizing the `pest` crate.
//!
//! Pseudocode is never rejected. Instead it is tokenized with the grammar in
//! `pseudocode.pest` and rebuilt from its legal tokens only: vocabulary words, comparator
//! symbols and integers, separated by normalized whitespace. Both free-text edits and
//! palette insertions go through [`sanitize`], so stored pseudocode only ever contains
//! legal tokens.

use lazy_static::lazy_static;
use pest::{iterators::Pair, Parser as PestParser};
use pest_derive::Parser as PestParser;
use regex::Regex;

/// Derives a `PestParser` for the pseudocode token grammar defined in `pseudocode.pest`.
#[derive(PestParser)]
#[grammar = "pseudocode.pest"]
pub struct PseudocodeParser;

/// Comparator symbols accepted in pseudocode.
pub const COMPARATORS: [&str; 9] = [">=", "≤", "<=", "≥", ">", "<", "==", "=", "!="];

/// Words accepted in pseudocode, compared case-insensitively.
pub const VOCABULARY: [&str; 38] = [
    "add",
    "and",
    "blank",
    "clear",
    "condition",
    "copy",
    "decrement",
    "divide",
    "double",
    "duplicate",
    "exponent",
    "exponentiation",
    "else",
    "erase",
    "fan-out",
    "fanout",
    "false",
    "base",
    "factorial",
    "if",
    "increment",
    "input",
    "nonzero",
    "power",
    "positive",
    "remove",
    "reset",
    "second",
    "result",
    "subtract",
    "then",
    "times",
    "true",
    "value",
    "zero",
    "halve",
    "multiply",
    "by",
];

/// A labelled group of tokens offered by an editor palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenGroup {
    pub label: &'static str,
    pub tokens: &'static [&'static str],
}

/// The palette of insertable tokens, grouped the way the editor shows them.
pub const TOKEN_GROUPS: [TokenGroup; 3] = [
    TokenGroup {
        label: "Actions",
        tokens: &[
            "copy",
            "increment",
            "decrement",
            "erase",
            "clear",
            "add",
            "subtract",
            "multiply",
            "divide",
            "halve",
            "double",
            "power",
            "factorial",
        ],
    },
    TokenGroup {
        label: "Conditions",
        tokens: &[
            "if", "zero", "nonzero", "positive", ">=", "≤", "<=", "≥", ">", "<", "=", "!=",
        ],
    },
    TokenGroup {
        label: "References",
        tokens: &[
            "input", "second", "value", "base", "exponent", "then", "else", "true", "false",
            "result",
        ],
    },
];

lazy_static! {
    static ref HORIZONTAL_SPACE: Regex = Regex::new(r"[\t ]+").unwrap();
    static ref ANY_SPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Returns `true` if `word` belongs to the pseudocode vocabulary, ignoring ASCII case.
pub fn is_valid_word(word: &str) -> bool {
    let normalized = word.to_ascii_lowercase();
    VOCABULARY.contains(&normalized.as_str())
}

/// Returns `true` if `symbol` is one of the accepted comparator symbols.
pub fn is_comparator(symbol: &str) -> bool {
    COMPARATORS.contains(&symbol)
}

/// Sanitizes raw pseudocode text.
///
/// Illegal words and stray characters are silently dropped, runs of spaces and tabs
/// collapse to a single space, spaces before a newline are removed and leading
/// whitespace is stripped. Line breaks are preserved.
///
/// # Examples
///
/// ```
/// assert_eq!(tmc::parser::sanitize("add 2 foo subtract"), "add 2 subtract");
/// ```
pub fn sanitize(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let root = match PseudocodeParser::parse(Rule::pseudocode, value) {
        Ok(mut pairs) => pairs.next(),
        Err(e) => {
            log::warn!("pseudocode could not be tokenized: {}", e);
            None
        }
    };
    let Some(root) = root else {
        return String::new();
    };

    let rebuilt: String = root.into_inner().map(legal_text).collect();

    HORIZONTAL_SPACE
        .replace_all(&rebuilt, " ")
        .replace(" \n", "\n")
        .trim_start()
        .to_string()
}

/// Returns the text a token contributes to the sanitized output.
fn legal_text<'i>(pair: Pair<'i, Rule>) -> &'i str {
    match pair.as_rule() {
        Rule::numeral | Rule::spacing => pair.as_str(),
        Rule::comparator if is_comparator(pair.as_str()) => pair.as_str(),
        Rule::word if is_valid_word(pair.as_str()) => pair.as_str(),
        _ => "",
    }
}

/// Appends a palette token to existing pseudocode and sanitizes the result.
///
/// The token is separated from the existing text by a single space, unless the text is
/// empty or ends with a line break. Inserting `if` leaves a trailing space for the
/// condition that follows.
pub fn insert_token(value: &str, token: &str) -> String {
    let separator = if value.trim().is_empty() || value.ends_with('\n') {
        ""
    } else {
        " "
    };

    let joined = format!("{value}{separator}{token}");
    let mut next = ANY_SPACE
        .replace_all(&joined, |caps: &regex::Captures| {
            if caps[0].contains('\n') {
                "\n"
            } else {
                " "
            }
        })
        .into_owned();

    if token == "if" {
        next.push(' ');
    }

    sanitize(&next)
}
