//! ABOUTME: Hand-rolled recursive-descent parser for the REM query grammar (§6 ABNF)
//! ABOUTME: No parser-combinator crate: tokenize once, then recursive descent over the token stream

use crate::plan::{Combinator, OrderBy, QueryPlan, SortDirection, WhereClause};
use p8fs_core::P8fsError;
use serde_json::Value;

/// One lexical token plus the byte offset it started at, so a parse
/// failure can report where in the original string it occurred.
#[derive(Debug, Clone, PartialEq)]
struct Token {
    text: String,
    offset: usize,
}

fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i] as char;
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == ',' {
            tokens.push(Token { text: ",".to_string(), offset: i });
            i += 1;
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            let start = i;
            i += 1;
            let content_start = i;
            while i < bytes.len() && bytes[i] as char != quote {
                i += 1;
            }
            let text = input[content_start..i].to_string();
            i += 1; // closing quote
            tokens.push(Token { text, offset: start });
            continue;
        }
        let start = i;
        while i < bytes.len() {
            let c = bytes[i] as char;
            if c.is_whitespace() || c == ',' {
                break;
            }
            i += 1;
        }
        tokens.push(Token { text: input[start..i].to_string(), offset: start });
    }
    tokens
}

/// Parse a full REM query string into a typed plan, or a `Validation`
/// error carrying the byte offset of the failure (§8 "REM parse is total").
pub fn parse(input: &str) -> Result<QueryPlan, P8fsError> {
    let tokens = tokenize(input);
    let Some(first) = tokens.first() else {
        return Err(validation_at(0, "empty query"));
    };

    match first.text.to_ascii_uppercase().as_str() {
        "LOOKUP" | "GET" => parse_lookup(&tokens),
        "SEARCH" => parse_search(&tokens),
        "SELECT" => parse_select(&tokens),
        "TRAVERSE" => parse_traverse(&tokens),
        other => Err(validation_at(first.offset, format!("unrecognized verb '{other}'"))),
    }
}

fn validation_at(offset: usize, message: impl Into<String>) -> P8fsError {
    P8fsError::validation(format!("{} (at offset {offset})", message.into()))
}

/// Split a raw key of the form `table:key` into an optional table override
/// and the bare key, stripping a surrounding quote pair if tokenize didn't
/// already (bare unquoted keys keep their colon as part of the token).
fn split_table_prefix(raw: &str) -> (Option<String>, String) {
    if let Some((table, key)) = raw.split_once(':') {
        if !table.is_empty() && !key.is_empty() {
            return (Some(table.to_string()), key.to_string());
        }
    }
    (None, raw.to_string())
}

fn parse_lookup(tokens: &[Token]) -> Result<QueryPlan, P8fsError> {
    let mut i = 1;
    let mut raw_keys = Vec::new();
    let mut table = None;
    let mut combinator = Combinator::And;

    while i < tokens.len() {
        let upper = tokens[i].text.to_ascii_uppercase();
        if upper == "IN" {
            i += 1;
            let Some(t) = tokens.get(i) else { return Err(validation_at(tokens[i - 1].offset, "expected table after IN")) };
            table = Some(t.text.clone());
            i += 1;
            continue;
        }
        if upper == "COMBINE" {
            i += 1;
            let Some(mode) = tokens.get(i) else {
                return Err(validation_at(tokens[i - 1].offset, "expected AND/OR after COMBINE"));
            };
            combinator = match mode.text.to_ascii_uppercase().as_str() {
                "OR" => Combinator::Or,
                "AND" => Combinator::And,
                other => return Err(validation_at(mode.offset, format!("unknown combinator '{other}'"))),
            };
            i += 1;
            continue;
        }
        if upper == "OR" && raw_keys.is_empty() {
            return Err(validation_at(tokens[i].offset, "OR is not a valid key position"));
        }
        if tokens[i].text == "," {
            i += 1;
            continue;
        }
        raw_keys.push(tokens[i].text.clone());
        i += 1;
    }

    let mut keys = Vec::new();
    for raw in &raw_keys {
        let (key_table, key) = split_table_prefix(raw);
        if key.is_empty() {
            continue;
        }
        if key_table.is_some() {
            table = key_table;
        }
        keys.push(key);
    }

    Ok(QueryPlan::Lookup { keys, table, combinator })
}

fn parse_search(tokens: &[Token]) -> Result<QueryPlan, P8fsError> {
    let text = tokens.get(1).ok_or_else(|| validation_at(tokens[0].offset, "expected quoted text after SEARCH"))?;
    let in_kw = tokens.get(2).ok_or_else(|| validation_at(text.offset, "expected IN after SEARCH text"))?;
    if in_kw.text.to_ascii_uppercase() != "IN" {
        return Err(validation_at(in_kw.offset, "expected IN after SEARCH text"));
    }
    let table = tokens.get(3).ok_or_else(|| validation_at(in_kw.offset, "expected table after IN"))?;
    Ok(QueryPlan::Search { text: text.text.clone(), table: table.text.clone() })
}

fn parse_select(tokens: &[Token]) -> Result<QueryPlan, P8fsError> {
    let mut i = 1;
    // Skip the projection list up to FROM; only `*` is meaningfully
    // supported since every row is returned as a full JSON object anyway.
    while i < tokens.len() && tokens[i].text.to_ascii_uppercase() != "FROM" {
        i += 1;
    }
    if i >= tokens.len() {
        return Err(validation_at(tokens[0].offset, "expected FROM"));
    }
    i += 1;
    let table = tokens.get(i).ok_or_else(|| validation_at(tokens[i - 1].offset, "expected table after FROM"))?.text.clone();
    i += 1;

    let mut where_clauses = Vec::new();
    let mut order_by = None;
    let mut limit = None;

    while i < tokens.len() {
        match tokens[i].text.to_ascii_uppercase().as_str() {
            "WHERE" => {
                i += 1;
                while i < tokens.len() {
                    let upper = tokens[i].text.to_ascii_uppercase();
                    if upper == "ORDER" || upper == "LIMIT" {
                        break;
                    }
                    if upper == "AND" {
                        i += 1;
                        continue;
                    }
                    let field = tokens[i].text.clone();
                    i += 1;
                    let eq = tokens.get(i).ok_or_else(|| validation_at(tokens[i - 1].offset, "expected = after field"))?;
                    if eq.text != "=" {
                        return Err(validation_at(eq.offset, "only '=' predicates are supported"));
                    }
                    i += 1;
                    let value_token =
                        tokens.get(i).ok_or_else(|| validation_at(tokens[i - 1].offset, "expected value after ="))?;
                    where_clauses.push(WhereClause { field, value: Value::String(value_token.text.clone()) });
                    i += 1;
                }
            }
            "ORDER" => {
                i += 1;
                if tokens.get(i).map(|t| t.text.to_ascii_uppercase()) != Some("BY".to_string()) {
                    return Err(validation_at(tokens[i - 1].offset, "expected BY after ORDER"));
                }
                i += 1;
                let field =
                    tokens.get(i).ok_or_else(|| validation_at(tokens[i - 1].offset, "expected field after ORDER BY"))?.text.clone();
                i += 1;
                let direction = match tokens.get(i).map(|t| t.text.to_ascii_uppercase()) {
                    Some(d) if d == "DESC" => {
                        i += 1;
                        SortDirection::Desc
                    }
                    Some(d) if d == "ASC" => {
                        i += 1;
                        SortDirection::Asc
                    }
                    _ => SortDirection::Asc,
                };
                order_by = Some(OrderBy { field, direction });
            }
            "LIMIT" => {
                i += 1;
                let n = tokens.get(i).ok_or_else(|| validation_at(tokens[i - 1].offset, "expected number after LIMIT"))?;
                limit = Some(n.text.parse::<usize>().map_err(|_| validation_at(n.offset, "LIMIT must be a non-negative integer"))?);
                i += 1;
            }
            other => return Err(validation_at(tokens[i].offset, format!("unexpected token '{other}'"))),
        }
    }

    Ok(QueryPlan::Select { table, where_clauses, order_by, limit })
}

fn parse_traverse(tokens: &[Token]) -> Result<QueryPlan, P8fsError> {
    let seed = tokens.get(1).ok_or_else(|| validation_at(tokens[0].offset, "expected seed key after TRAVERSE"))?.text.clone();
    let mut depth = 2;
    if let Some(kw) = tokens.get(2) {
        if kw.text.to_ascii_uppercase() == "DEPTH" {
            let n = tokens.get(3).ok_or_else(|| validation_at(kw.offset, "expected number after DEPTH"))?;
            depth = n.text.parse::<usize>().map_err(|_| validation_at(n.offset, "DEPTH must be a non-negative integer"))?;
        }
    }
    Ok(QueryPlan::Traverse { seed, depth: depth.min(5) })
}
