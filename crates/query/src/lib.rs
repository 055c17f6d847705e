//! Query construction and execution for SphinxQL-speaking engines.
//!
//! A [`SphinxQuery`] accumulates clause state through chainable mutators,
//! compiles it into a single dialect statement, and executes it against a
//! `SearchConnection` together with the fixed `SHOW META` statistics
//! statement. Compiled text, rows and statistics are cached until the next
//! mutation; statement failures are absorbed into an empty result instead
//! of erroring, so callers inspect the row count.
//!
//! ```ignore
//! let mut query = SphinxQuery::new()
//!     .select(["id", "title"])
//!     .from(["articles", "articles_delta"])
//!     .filter("status", "published")
//!     .matching("title", "rust async")
//!     .set_max_results(50);
//!
//! let matched = query.execute(&connection).await?;
//! for row in query.rows()? {
//!     println!("{:?}", row.get("title"));
//! }
//! ```

mod clause;
mod error;
mod escape;
mod hydrate;
mod query;

pub use clause::{
    Condition, FieldList, MatchCombinator, MatchTerm, Operator, OptionEntry, OrderTerm,
    RawMatchTerm, SortOrder,
};
pub use error::QueryError;
pub use escape::{escape_match_field, escape_match_text, quote_str};
pub use hydrate::{EntityLoader, HydrationSpec, Identified};
pub use query::{AliasSequence, MetaState, QueryState, SphinxQuery, Throttle, META_STATEMENT};
