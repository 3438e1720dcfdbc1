//! ABOUTME: Tagged query plan the parser produces and the executor consumes
//! ABOUTME: One variant per REM surface form (§4.E): LOOKUP, SEARCH, SELECT, TRAVERSE

use serde::Serialize;
use std::fmt;

/// How a multi-key `LOOKUP` combines its per-key result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

/// A single `WHERE` equality constraint. The planner only accepts
/// conjunctions of `field = value`; anything richer is a Validation error.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereClause {
    pub field: String,
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// Query-hint modes the source interface names but leaves unimplemented;
/// resolved here rather than dropped (§9 Open Question 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryHint {
    Hybrid,
    Graph,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryPlan {
    Lookup {
        keys: Vec<String>,
        table: Option<String>,
        combinator: Combinator,
    },
    Search {
        text: String,
        table: String,
    },
    Select {
        table: String,
        where_clauses: Vec<WhereClause>,
        order_by: Option<OrderBy>,
        limit: Option<usize>,
    },
    Traverse {
        seed: String,
        depth: usize,
    },
}

/// Renders a plan back into REM surface syntax the parser accepts, so
/// `parse(format(plan)) == plan` for any plan the planner produced
/// (§8 "Property-based" test).
impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lookup { keys, table, combinator } => {
                write!(f, "LOOKUP {}", keys.join(", "))?;
                if let Some(table) = table {
                    write!(f, " IN {table}")?;
                }
                if *combinator == Combinator::Or {
                    write!(f, " COMBINE OR")?;
                }
                Ok(())
            }
            Self::Search { text, table } => write!(f, "SEARCH \"{text}\" IN {table}"),
            Self::Select { table, where_clauses, order_by, limit } => {
                write!(f, "SELECT * FROM {table}")?;
                if !where_clauses.is_empty() {
                    write!(f, " WHERE ")?;
                    let rendered: Vec<String> = where_clauses
                        .iter()
                        .map(|w| format!("{} = {}", w.field, w.value.as_str().unwrap_or_default()))
                        .collect();
                    write!(f, "{}", rendered.join(" AND "))?;
                }
                if let Some(order) = order_by {
                    let dir = if order.direction == SortDirection::Desc { "DESC" } else { "ASC" };
                    write!(f, " ORDER BY {} {dir}", order.field)?;
                }
                if let Some(limit) = limit {
                    write!(f, " LIMIT {limit}")?;
                }
                Ok(())
            }
            Self::Traverse { seed, depth } => write!(f, "TRAVERSE {seed} DEPTH {depth}"),
        }
    }
}

/// Uniform result envelope (§4.F "Result shape").
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub success: bool,
    pub results: Vec<serde_json::Value>,
    pub count: usize,
    pub query: String,
    pub error: Option<String>,
}

impl QueryResult {
    #[must_use]
    pub fn ok(query: impl Into<String>, results: Vec<serde_json::Value>) -> Self {
        let count = results.len();
        Self { success: true, results, count, query: query.into(), error: None }
    }

    #[must_use]
    pub fn err(query: impl Into<String>, message: impl Into<String>) -> Self {
        Self { success: false, results: Vec::new(), count: 0, query: query.into(), error: Some(message.into()) }
    }
}
