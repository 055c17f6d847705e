//! Query layer errors.

use thiserror::Error;

/// Errors raised by the query builder, compiler and executor.
///
/// Validation errors surface synchronously at the offending mutator call or
/// at compile time. Statement failures against the engine are deliberately
/// NOT represented here: they are absorbed into an empty result with a zero
/// row count, leaving the caller to inspect the outcome.
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("BETWEEN expects exactly two bound values")]
    BetweenBounds,

    #[error("{0} expects a sequence of values")]
    ExpectedSequence(&'static str),

    #[error("No columns selected")]
    MissingSelect,

    #[error("No source index given")]
    MissingFrom,

    #[error("Query has not been executed")]
    NotExecuted,

    #[error("No entity hydration attached")]
    NoHydration,

    #[error("Entity load failed: {0}")]
    EntityLoad(String),
}
