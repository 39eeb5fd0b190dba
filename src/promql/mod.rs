//! Metric-name extraction from PromQL query expressions.
//!
//! Three passes over one expression:
//!   - `lexer`: identifiers tagged as metric candidates, function names or other syntax
//!   - `rules`: namespaced recording-rule names (`level:metric:ops`)
//!   - `grouping`: candidates that only appear as grouping keys
//!
//! `extract` combines them into the set of names a query references.

pub mod extract;
pub mod grouping;
pub mod lexer;
pub mod rules;

pub use extract::{DENYLIST, QueryMetrics, extract_query_metrics};
pub use lexer::{LexError, Token, TokenKind, metric_candidates, tokenize};
pub use rules::find_rules;
