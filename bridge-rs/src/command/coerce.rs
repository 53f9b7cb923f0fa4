//! Literal token coercion
//!
//! Turns the textual value of a parameter into a typed [`CoercedValue`].
//! Coercion is total: any input that matches no rule is kept as a string.

use super::types::CoercedValue;

const TRUE_MARKER: &str = "$true";
const FALSE_MARKER: &str = "$false";
const NULL_MARKER: &str = "$null";

/// Coerce a literal token into a typed parameter value
///
/// Rules are checked in order:
/// 1. `$true` / `$false` (any case) → `Bool`
/// 2. `$null` → `Null`
/// 3. a token wrapped in one pair of matching quotes → `String` without quotes
/// 4. a comma outside quotes → `StringArray`, each element trimmed and unquoted
/// 5. a 64-bit integer → `Int64`
/// 6. anything else → `String`
///
/// # Examples
/// ```
/// use bridge_rs::command::{coerce, CoercedValue};
///
/// assert_eq!(coerce("$true"), CoercedValue::Bool(true));
/// assert_eq!(coerce("'a,b'"), CoercedValue::String("a,b".to_string()));
/// assert_eq!(coerce("42"), CoercedValue::Int64(42));
/// ```
pub fn coerce(token: &str) -> CoercedValue {
    let token = token.trim();

    if token.eq_ignore_ascii_case(TRUE_MARKER) {
        return CoercedValue::Bool(true);
    }
    if token.eq_ignore_ascii_case(FALSE_MARKER) {
        return CoercedValue::Bool(false);
    }
    if token.eq_ignore_ascii_case(NULL_MARKER) {
        return CoercedValue::Null;
    }

    if let Some(inner) = strip_quotes(token) {
        return CoercedValue::String(inner.to_string());
    }

    if has_top_level_comma(token) {
        return CoercedValue::StringArray(split_list(token));
    }

    if let Ok(number) = token.parse::<i64>() {
        return CoercedValue::Int64(number);
    }

    CoercedValue::String(token.to_string())
}

/// Return the inside of a token wrapped in one pair of matching quotes
///
/// `'a,b'` yields `a,b`; `'a','b'` yields `None` because the opening quote
/// closes before the end of the token.
pub(crate) fn strip_quotes(token: &str) -> Option<&str> {
    let quote = token.chars().next().filter(|c| is_quote(*c))?;
    if token.len() < 2 || !token.ends_with(quote) {
        return None;
    }

    let inner = &token[1..token.len() - 1];
    if inner.contains(quote) {
        return None;
    }
    Some(inner)
}

/// Strip one pair of matching quotes if present
pub(crate) fn unquote(token: &str) -> &str {
    strip_quotes(token).unwrap_or(token)
}

/// Split a comma list outside quotes, trimming and unquoting each element
///
/// Empty unquoted elements (`a,,b`, trailing commas) are dropped; an
/// explicitly quoted empty string is kept.
pub(crate) fn split_list(token: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in token.chars() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
                current.push(c);
            }
            None if is_quote(c) => {
                quote = Some(c);
                current.push(c);
            }
            None if c == ',' => {
                push_item(&mut items, &current);
                current.clear();
            }
            None => current.push(c),
        }
    }
    push_item(&mut items, &current);

    items
}

fn push_item(items: &mut Vec<String>, raw: &str) {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return;
    }
    items.push(unquote(trimmed).to_string());
}

fn has_top_level_comma(token: &str) -> bool {
    let mut quote: Option<char> = None;
    for c in token.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if is_quote(c) => quote = Some(c),
            None if c == ',' => return true,
            None => {}
        }
    }
    false
}

pub(crate) fn is_quote(c: char) -> bool {
    c == '\'' || c == '"'
}
