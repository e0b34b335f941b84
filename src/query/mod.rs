pub mod eval;
pub mod metrics;
pub mod parser;
pub mod spec;

pub use eval::{EvalError, EvaluationResult, Evaluator, Strategy, today_local};
pub use parser::{ParserContext, parse_query};
pub use spec::{Directives, FilterClause, FilterOp, ParseError, QuerySpec, SortDir, SortKey, ViewKind};
