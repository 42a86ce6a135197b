use crate::document::{Document, Value};
use crate::errors::{self, ErrorKind, MartenError, MartenResult};
use crate::query::path::{lookup_path, Candidates};
use regex::Regex;

/// Evaluates a filter against a document.
///
/// A filter is itself a document whose entries are either literal equality
/// tests (`{field: value}`, with dotted-path traversal) or operator
/// documents (`{field: {$op: arg}}`). Top-level `$and`/`$or`/`$nor` combine
/// sub-filters; any other `$`-prefixed key at the filter root is rejected.
///
/// All entries of a filter must hold for the document to match.
pub fn matches(doc: &Document, filter: &Document) -> MartenResult<bool> {
    for (key, condition) in filter.iter() {
        let matched = match key {
            "$and" => logical(doc, key, condition)?.iter().all(|m| *m),
            "$or" => logical(doc, key, condition)?.iter().any(|m| *m),
            "$nor" => !logical(doc, key, condition)?.iter().any(|m| *m),
            _ if key.starts_with('$') => {
                return Err(errors::unknown_top_level_operator(key));
            }
            _ => field_matches(doc, key, condition)?,
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Evaluates each sub-filter of a logical operator's array argument.
fn logical(doc: &Document, op: &str, condition: &Value) -> MartenResult<Vec<bool>> {
    let array = condition.as_array().ok_or_else(|| {
        log::error!("{} argument is not an array", op);
        MartenError::new(
            &format!("{} must be an array", op),
            ErrorKind::BadValue,
        )
    })?;
    if array.is_empty() {
        return Err(MartenError::new(
            &format!("{} argument must be a non-empty array", op),
            ErrorKind::BadValue,
        ));
    }
    let mut results = Vec::with_capacity(array.len());
    for element in array {
        let sub_filter = element.as_document().ok_or_else(|| {
            MartenError::new(
                &format!("{} argument's entries must be objects", op),
                ErrorKind::BadValue,
            )
        })?;
        results.push(matches(doc, sub_filter)?);
    }
    Ok(results)
}

fn field_matches(doc: &Document, path: &str, condition: &Value) -> MartenResult<bool> {
    let candidates = lookup_path(doc, path);
    match condition {
        Value::Document(spec) if is_operator_document(spec) => {
            operators_match(&candidates, spec)
        }
        _ => equality_match(&candidates, condition),
    }
}

/// A non-empty document whose first key starts with `$` is an operator
/// document; anything else is a literal.
fn is_operator_document(spec: &Document) -> bool {
    spec.first_key().is_some_and(|k| k.starts_with('$'))
}

fn operators_match(candidates: &Candidates<'_>, spec: &Document) -> MartenResult<bool> {
    for (op, arg) in spec.iter() {
        // consumed together with $regex
        if op == "$options" {
            continue;
        }
        let matched = match op {
            "$eq" => equality_match(candidates, arg)?,
            "$ne" => !equality_match(candidates, arg)?,
            "$gt" => ordered_match(candidates, arg, |ord| ord == std::cmp::Ordering::Greater),
            "$gte" => ordered_match(candidates, arg, |ord| ord != std::cmp::Ordering::Less),
            "$lt" => ordered_match(candidates, arg, |ord| ord == std::cmp::Ordering::Less),
            "$lte" => ordered_match(candidates, arg, |ord| ord != std::cmp::Ordering::Greater),
            "$in" => in_match(candidates, arg, "$in")?,
            "$nin" => !in_match(candidates, arg, "$nin")?,
            "$exists" => {
                let wanted = truthy(arg);
                candidates.is_empty() != wanted
            }
            "$regex" => regex_match(candidates, arg, spec.get("$options"))?,
            "$not" => !negated_match(candidates, arg)?,
            _ => return Err(errors::unknown_operator(op)),
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Literal equality: a candidate matches when it deep-equals the expected
/// value, when it is an array containing an equal element, or when the
/// expected value is a regex matching a candidate string. A `null` literal
/// also matches a missing field.
fn equality_match(candidates: &Candidates<'_>, expected: &Value) -> MartenResult<bool> {
    if candidates.is_empty() {
        return Ok(*expected == Value::Null);
    }
    if let Value::Regex { pattern, options } = expected {
        let regex = build_regex(pattern, options)?;
        return Ok(candidates.iter().any(|v| string_matches(v, &regex)));
    }
    for candidate in candidates {
        if *candidate == expected {
            return Ok(true);
        }
        if let Value::Array(elements) = candidate {
            if elements.iter().any(|e| e == expected) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Range comparison: candidates (or their array elements) must share the
/// expected value's kind class to be comparable; the total value order then
/// decides.
fn ordered_match<F>(candidates: &Candidates<'_>, expected: &Value, accept: F) -> bool
where
    F: Fn(std::cmp::Ordering) -> bool,
{
    fn comparable(a: &Value, b: &Value) -> bool {
        (a.is_number() && b.is_number())
            || std::mem::discriminant(a) == std::mem::discriminant(b)
    }

    for candidate in candidates {
        if comparable(candidate, expected) && accept((*candidate).cmp(expected)) {
            return true;
        }
        if let Value::Array(elements) = candidate {
            for element in elements {
                if comparable(element, expected) && accept(element.cmp(expected)) {
                    return true;
                }
            }
        }
    }
    false
}

fn in_match(candidates: &Candidates<'_>, arg: &Value, op: &str) -> MartenResult<bool> {
    let allowed = arg.as_array().ok_or_else(|| {
        log::error!("{} argument is not an array", op);
        MartenError::new(&format!("{} needs an array", op), ErrorKind::BadValue)
    })?;
    for expected in allowed {
        if equality_match(candidates, expected)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// `$not` accepts an operator document or a regex and negates it.
fn negated_match(candidates: &Candidates<'_>, arg: &Value) -> MartenResult<bool> {
    match arg {
        Value::Document(spec) if is_operator_document(spec) => {
            operators_match(candidates, spec)
        }
        Value::Regex { pattern, options } => {
            let regex = build_regex(pattern, options)?;
            Ok(candidates.iter().any(|v| string_matches(v, &regex)))
        }
        _ => Err(MartenError::new(
            "$not needs a regex or a document",
            ErrorKind::BadValue,
        )),
    }
}

fn regex_match(
    candidates: &Candidates<'_>,
    arg: &Value,
    sibling_options: Option<&Value>,
) -> MartenResult<bool> {
    let (pattern, inline_options) = match arg {
        Value::String(pattern) => (pattern.as_str(), ""),
        Value::Regex { pattern, options } => (pattern.as_str(), options.as_str()),
        other => {
            return Err(MartenError::new(
                &format!("$regex has to be a string, but is of type: {}", other.type_name()),
                ErrorKind::BadValue,
            ));
        }
    };

    let options = match sibling_options {
        Some(Value::String(options)) => options.as_str(),
        Some(other) => {
            return Err(MartenError::new(
                &format!(
                    "$options has to be a string, but is of type: {}",
                    other.type_name()
                ),
                ErrorKind::BadValue,
            ));
        }
        None => inline_options,
    };

    let regex = build_regex(pattern, options)?;
    Ok(candidates.iter().any(|v| string_matches(v, &regex)))
}

/// Compiles a wire-protocol regex, mapping the `i`, `s`, and `m` option
/// letters to the engine's inline flags.
fn build_regex(pattern: &str, options: &str) -> MartenResult<Regex> {
    let mut flags = String::new();
    for option in options.chars() {
        match option {
            'i' | 's' | 'm' => flags.push(option),
            other => {
                return Err(MartenError::new(
                    &format!("invalid flag in regex options: {}", other),
                    ErrorKind::BadValue,
                ));
            }
        }
    }
    let full = if flags.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", flags, pattern)
    };
    Regex::new(&full).map_err(|e| {
        log::error!("invalid regex pattern '{}': {}", pattern, e);
        MartenError::new(&format!("invalid regex pattern: {}", pattern), ErrorKind::BadValue)
    })
}

/// Pattern match against a string candidate or the string elements of an
/// array candidate.
fn string_matches(candidate: &Value, regex: &Regex) -> bool {
    match candidate {
        Value::String(s) => regex.is_match(s),
        Value::Array(elements) => elements.iter().any(|e| match e {
            Value::String(s) => regex.is_match(s),
            _ => false,
        }),
        _ => false,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Int32(0) | Value::Int64(0) => false,
        Value::Double(d) => *d != 0.0,
        _ => true,
    }
}
