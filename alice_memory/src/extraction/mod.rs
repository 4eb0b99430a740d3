//! Fact extraction from what the customer says.
//!
//! Pure functions over text: no state, no I/O. Only the customer's side of a
//! pair is scanned, so phrasing in assistant replies ("I am your assistant")
//! never turns into a fact.

pub mod patterns;

use alice_core::UserFacts;
use alice_core::facts::keys;
use regex::{Match, Regex};

/// A candidate longer than this is a sentence, not a value.
const MAX_WORDS: usize = 5;
/// Shortest accepted account or customer id.
const MIN_ID_LEN: usize = 4;

/// Extract durable facts from one exchange.
///
/// `answer` is accepted so callers can pass the whole pair, and is not
/// scanned. Returns an empty map when nothing is recognised.
#[must_use]
pub fn extract(question: &str, _answer: &str) -> UserFacts {
    let mut facts = UserFacts::new();

    if let Some(name) = extract_name(question) {
        facts.insert(keys::NAME, name);
    }
    if let Some(account) = extract_id(question, patterns::account_intro()) {
        facts.insert(keys::ACCOUNT_NUMBER, account);
    }
    if let Some(customer) = extract_id(question, patterns::customer_intro()) {
        facts.insert(keys::CUSTOMER_ID, customer);
    }

    facts
}

/// Every match of `re` in `text`, left to right, including overlapping ones.
fn occurrences<'a>(re: &'a Regex, text: &'a str) -> impl Iterator<Item = Match<'a>> {
    let mut pos = 0;
    std::iter::from_fn(move || {
        if pos > text.len() {
            return None;
        }
        let found = re.find_at(text, pos)?;
        pos = found.start() + text[found.start()..].chars().next().map_or(1, char::len_utf8);
        Some(found)
    })
}

/// The text after an intro phrase, up to the first terminator.
fn candidate(rest: &str) -> &str {
    let end = patterns::terminator()
        .find(rest)
        .map_or(rest.len(), |m| m.start());
    rest[..end].trim()
}

fn extract_name(text: &str) -> Option<String> {
    occurrences(patterns::name_intro(), text).find_map(|intro| {
        let value = candidate(&text[intro.end()..]);
        accept_name(value, patterns::is_weak_name_intro(intro.as_str()))
    })
}

fn accept_name(value: &str, weak_intro: bool) -> Option<String> {
    let words: Vec<&str> = value.split_whitespace().collect();
    if words.is_empty() || words.len() > MAX_WORDS {
        return None;
    }
    if !value.chars().any(char::is_alphabetic) || value.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }
    if patterns::name_intro().is_match(value) {
        return None;
    }
    if words
        .first()
        .is_some_and(|w| patterns::NOT_A_NAME.contains(&w.to_lowercase().as_str()))
    {
        return None;
    }
    // "I am fine" or "this is urgent" only count when written like a name.
    if weak_intro && !words.iter().all(|w| w.starts_with(char::is_uppercase)) {
        return None;
    }

    Some(
        words
            .iter()
            .map(|w| capitalize(w))
            .collect::<Vec<_>>()
            .join(" "),
    )
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect()
    })
}

fn extract_id(text: &str, intro: &Regex) -> Option<String> {
    occurrences(intro, text).find_map(|found| {
        let rest = &text[found.end()..];
        let skip = patterns::id_connector().find(rest).map_or(0, |m| m.end());
        let value = candidate(&rest[skip..]);
        (value.len() >= MIN_ID_LEN && patterns::id_value().is_match(value))
            .then(|| value.to_string())
    })
}
