use std::sync::LazyLock;

use regex::Regex;

use super::{Comparison, Operand, Operator, Predicate, anchored_regex};
use crate::errors::{CsvDapError, Result};
use crate::scalar::ScalarValue;
use crate::source::Header;

/// Operator tokens in the order they're tried at each position. Two
/// character operators come first so `<=` isn't read as `<`.
static OPERATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("<=|>=|!=|=~|>|<|=").expect("regex to build"));

/// Returns true if the text contains a comparison operator.
pub fn has_operator(text: &str) -> bool {
    OPERATOR.is_match(text)
}

impl Comparison {
    /// Parse a single `lhs OP rhs` clause against a header.
    pub fn parse(text: &str, header: &Header) -> Result<Comparison> {
        let Some(found) = OPERATOR.find(text) else {
            return Err(CsvDapError::invalid_expression(text, "missing comparison operator"));
        };

        let op = Operator::from_token(found.as_str())
            .ok_or_else(|| CsvDapError::invalid_expression(text, "unknown operator"))?;
        let lhs = text[..found.start()].trim();
        let rhs = text[found.end()..].trim();

        if lhs.is_empty() {
            return Err(CsvDapError::invalid_expression(text, "missing column"));
        }
        let lhs = header.resolve(lhs).ok_or_else(|| {
            CsvDapError::invalid_expression(text, format!("'{lhs}' is not a column"))
        })?;

        let operand =
            parse_operand(rhs, header).map_err(|r| CsvDapError::invalid_expression(text, r))?;
        let rhs = match (op, operand) {
            (Operator::Match, Operand::Literal(literal)) => {
                // Unquoted patterns are used exactly as written.
                let pattern = if is_quoted(rhs) {
                    literal.as_text().into_owned()
                } else {
                    rhs.to_string()
                };
                let re = anchored_regex(&pattern).map_err(|e| {
                    CsvDapError::invalid_expression(text, format!("invalid pattern: {e}"))
                })?;
                Operand::Pattern(re)
            }
            (_, rhs) => rhs,
        };

        Ok(Comparison {
            text: text.to_string(),
            lhs,
            op,
            rhs,
        })
    }
}

impl Predicate {
    /// Parse and AND together a list of expressions.
    ///
    /// Each expression may itself hold several clauses joined by `&`.
    pub fn conjunction<S: AsRef<str>>(exprs: &[S], header: &Header) -> Result<Predicate> {
        let mut comparisons = Vec::with_capacity(exprs.len());
        for expr in exprs {
            for clause in split_conjunction(expr.as_ref()) {
                comparisons.push(Comparison::parse(clause, header)?);
            }
        }
        Ok(Predicate::new(comparisons))
    }
}

/// Resolve the right side of a comparison.
///
/// Quoted tokens are always literals. Unquoted tokens naming a column
/// (qualified or not) are column references, except that numbers only
/// refer to a column on an exact name match.
fn parse_operand(rhs: &str, header: &Header) -> Result<Operand, String> {
    if is_quoted(rhs) {
        return parse_literal(rhs).map(Operand::Literal);
    }
    if let Some(idx) = header.position(rhs) {
        return Ok(Operand::Column(idx));
    }
    if rhs.parse::<f64>().is_err() {
        if let Some(idx) = header.resolve(rhs) {
            return Ok(Operand::Column(idx));
        }
    }
    parse_literal(rhs).map(Operand::Literal)
}

fn is_quoted(text: &str) -> bool {
    text.starts_with(['"', '\''])
}

/// Parse a literal from the closed grammar: integers, floats, quoted
/// strings, `true`, `false`, `none`, and bare text.
pub fn parse_literal(text: &str) -> Result<ScalarValue, String> {
    if text.is_empty() {
        return Err("missing value".to_string());
    }

    if let Some(quote) = text.chars().next().filter(|c| *c == '"' || *c == '\'') {
        return parse_quoted(text, quote).map(ScalarValue::Utf8);
    }

    match ScalarValue::coerce(text) {
        ScalarValue::Utf8(_) => (),
        number => return Ok(number),
    }

    match text.to_ascii_lowercase().as_str() {
        "true" => return Ok(ScalarValue::Boolean(true)),
        "false" => return Ok(ScalarValue::Boolean(false)),
        "none" | "null" => return Ok(ScalarValue::Null),
        _ => (),
    }

    if text.contains(['"', '\'']) {
        return Err(format!("unexpected quote in '{text}'"));
    }

    Ok(ScalarValue::Utf8(text.to_string()))
}

fn parse_quoted(text: &str, quote: char) -> Result<String, String> {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().skip(1);

    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some((_, 'n')) => out.push('\n'),
                Some((_, 't')) => out.push('\t'),
                Some((_, escaped @ ('\\' | '"' | '\''))) => out.push(escaped),
                // Anything else is kept as typed, e.g. regex classes like `\d`.
                Some((_, other)) => {
                    out.push('\\');
                    out.push(other);
                }
                None => return Err("unterminated escape".to_string()),
            },
            c if c == quote => {
                let rest = &text[idx + c.len_utf8()..];
                if !rest.is_empty() {
                    return Err(format!("unexpected '{rest}' after string"));
                }
                return Ok(out);
            }
            c => out.push(c),
        }
    }

    Err("unterminated string".to_string())
}

/// Split text on `&` outside of quoted strings, dropping empty clauses.
pub fn split_conjunction(text: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (idx, c) in text.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (Some(_), '\\') => escaped = true,
            (Some(q), c) if c == q => quote = None,
            (None, '"' | '\'') => quote = Some(c),
            (None, '&') => {
                clauses.push(&text[start..idx]);
                start = idx + 1;
            }
            _ => (),
        }
    }
    clauses.push(&text[start..]);

    clauses
        .into_iter()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect()
}
