//! Command line compiler
//!
//! Compiles a single-line, pipe-delimited command string into a
//! [`Pipeline`] of [`CommandDescriptor`]s without evaluating it.
//!
//! # Grammar
//! ```text
//! pipeline := stage ( '|' stage )*
//! stage    := name positional? named*
//! named    := '-' key ( ':' value? )? value*
//! ```
//!
//! Single and double quotes suspend whitespace and pipe splitting until the
//! matching quote of the same kind. Quotes do not nest and an opening quote
//! of the other kind inside a quoted run is a literal character.

use tracing::debug;

use super::coerce::{coerce, is_quote, split_list, unquote};
use super::types::{CoercedValue, CommandDescriptor, ParameterBinding, Pipeline};

/// Compile a command string into a pipeline
///
/// Compilation never fails. Empty stages and stages whose name is blank
/// (such as a lone `''`) are skipped, and an unterminated quote is closed
/// at the end of input; the remote endpoint rejects anything that is still
/// not a valid command when it runs.
///
/// Rendering the result with `Display` compiles back to the same pipeline,
/// except that a one-element list reads back as a plain string and a value
/// holding both quote kinds gains literal quotes.
///
/// # Examples
/// ```
/// use bridge_rs::command::{compile, CoercedValue, ParameterBinding};
///
/// let pipeline = compile("Get-Mailbox -ResultSize 100 | Select-Object Name, Alias");
/// let stages = pipeline.commands();
/// assert_eq!(stages.len(), 2);
/// assert_eq!(stages[0].name, "Get-Mailbox");
/// assert_eq!(
///     stages[0].parameters,
///     vec![ParameterBinding::named("ResultSize", CoercedValue::Int64(100))]
/// );
/// assert_eq!(stages[1].positional(), Some(&["Name".to_string(), "Alias".to_string()][..]));
/// ```
pub fn compile(command: &str) -> Pipeline {
    let commands = scan(command)
        .into_iter()
        .filter_map(build_stage)
        .collect();

    Pipeline::new(commands)
}

/// Split the input into stages of whitespace-delimited tokens
///
/// Tokens keep their quotes so coercion can tell `'42'` from `42`.
fn scan(command: &str) -> Vec<Vec<String>> {
    let mut stages = Vec::new();
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in command.chars() {
        match quote {
            Some(q) => {
                current.push(c);
                if c == q {
                    quote = None;
                }
            }
            None if is_quote(c) => {
                quote = Some(c);
                current.push(c);
            }
            None if c == '|' => {
                flush_token(&mut tokens, &mut current);
                stages.push(std::mem::take(&mut tokens));
            }
            None if c.is_whitespace() => flush_token(&mut tokens, &mut current),
            None => current.push(c),
        }
    }

    if let Some(q) = quote {
        debug!("Unterminated {} quote, closing at end of input", q);
        current.push(q);
    }
    flush_token(&mut tokens, &mut current);
    stages.push(tokens);

    stages
}

fn flush_token(tokens: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

/// Bind one stage's tokens to a command descriptor
fn build_stage(tokens: Vec<String>) -> Option<CommandDescriptor> {
    let mut tokens = tokens.into_iter().peekable();
    let name = unquote(&tokens.next()?).to_string();
    if name.trim().is_empty() {
        debug!("Skipping stage with a blank command name");
        return None;
    }
    let mut parameters = Vec::new();

    let mut positional = Vec::new();
    while let Some(token) = tokens.next_if(|t| !is_parameter_name(t)) {
        positional.push(token);
    }
    if !positional.is_empty() {
        let values = split_list(&positional.join(" "));
        if !values.is_empty() {
            parameters.push(ParameterBinding::PositionalList { values });
        }
    }

    while let Some(token) = tokens.next() {
        let (key, inline) = split_parameter(&token);

        let mut parts: Vec<String> = inline.into_iter().collect();
        while let Some(part) = tokens.next_if(|t| !is_parameter_name(t)) {
            parts.push(part);
        }

        let joined = parts.join(" ");
        let raw = joined.trim_end_matches(|c: char| c == ',' || c.is_whitespace());
        let value = if raw.is_empty() {
            CoercedValue::Bool(true)
        } else {
            coerce(raw)
        };

        parameters.push(ParameterBinding::Named {
            key: key.to_string(),
            value,
        });
    }

    Some(CommandDescriptor { name, parameters })
}

/// A parameter name is `-` followed by a letter, so `-1` stays a value
fn is_parameter_name(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next() == Some('-') && chars.next().is_some_and(|c| c.is_alphabetic())
}

/// Split `-Key` or `-Key:value` into its key and inline value
fn split_parameter(token: &str) -> (&str, Option<String>) {
    let body = &token[1..];
    match body.split_once(':') {
        Some((key, value)) if !value.is_empty() => (key, Some(value.to_string())),
        Some((key, _)) => (key, None),
        None => (body, None),
    }
}
