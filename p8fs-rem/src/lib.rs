//! ABOUTME: REM query language — hand-rolled parser, tagged plan, and polymorphic executor
//! ABOUTME: Unifies KV lookup, semantic search, constrained SQL, and graph traversal behind one surface

pub mod executor;
pub mod parser;
pub mod plan;

pub use executor::RemExecutor;
pub use parser::parse;
pub use plan::{Combinator, OrderBy, QueryHint, QueryPlan, QueryResult, SortDirection, WhereClause};
