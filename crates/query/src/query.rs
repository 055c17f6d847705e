//! The query object: clause state, compiler and executor.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use searchql_backend_sphinx::SearchConnection;
use searchql_model::{Row, Value};

use crate::clause::{
    Condition, FieldList, MatchCombinator, MatchTerm, Operator, OptionEntry, OrderTerm,
    RawMatchTerm, SortOrder,
};
use crate::error::QueryError;
use crate::escape::{escape_match_field, escape_match_text, quote_str};
use crate::hydrate::HydrationSpec;

/// Fixed statement retrieving engine statistics for the preceding query.
pub const META_STATEMENT: &str = "SHOW META";

const DEFAULT_LIMIT: u64 = 20;

/// Cache validity of a query's compiled text and results.
///
/// DIRTY means the clause state changed since the last execution; cached
/// text and results are stale and must be regenerated before being trusted.
/// The flag is the sole authority, not a derived value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Clean,
    Dirty,
}

/// Engine statistics retrieved via [`META_STATEMENT`].
///
/// Distinguishes a query that never ran from one whose statistics fetch
/// failed after a run.
#[derive(Debug, Clone, PartialEq)]
pub enum MetaState {
    /// The query has not been executed.
    NotRun,
    /// The query ran but the statistics fetch failed; reads as empty.
    Unavailable,
    /// Parsed key/value statistics.
    Loaded(BTreeMap<String, String>),
}

/// Sequence producing the select aliases behind [`SphinxQuery::or_filter`].
///
/// Queries sharing a sequence receive distinct aliases, including across
/// concurrent callers; the increment is the only shared mutation point.
/// The process-wide [`AliasSequence::global`] is used unless a query is
/// given its own.
#[derive(Debug, Clone)]
pub struct AliasSequence {
    next: Arc<AtomicU64>,
}

impl AliasSequence {
    pub fn new() -> Self {
        Self {
            next: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The shared process-wide sequence.
    pub fn global() -> Self {
        static GLOBAL: OnceLock<AliasSequence> = OnceLock::new();
        GLOBAL.get_or_init(AliasSequence::new).clone()
    }

    pub fn next_alias(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed) + 1;
        format!("orX{n}")
    }
}

impl Default for AliasSequence {
    fn default() -> Self {
        Self::new()
    }
}

/// Rate limiting consulted before statements are issued.
///
/// Implementations receive the source indexes a statement targets and may
/// delay or shape traffic however they see fit before returning.
pub trait Throttle: Send + Sync {
    /// Called once per engine round-trip. `write` is true for statements
    /// that modify an index.
    fn before_statement(&self, indexes: &[String], write: bool);
}

/// A full-text search query over the SQL-like wire dialect.
///
/// Clause state is accumulated through chainable mutators, compiled into a
/// single statement, and executed together with the fixed statistics
/// statement. Results are cached until the next mutation.
///
/// # Example
///
/// ```ignore
/// let mut query = SphinxQuery::new()
///     .select(["id", "title"])
///     .from(["articles"])
///     .matching("title", "full text search")
///     .order_by("published_at", "desc")
///     .set_max_results(50);
///
/// let matched = query.execute(&connection).await?;
/// println!("{matched} of {} total", query.total_found()?);
/// ```
pub struct SphinxQuery {
    select: Vec<String>,
    from: Vec<String>,
    conditions: Vec<Condition>,
    match_terms: Vec<MatchTerm>,
    raw_match_terms: Vec<RawMatchTerm>,
    group_by: Vec<String>,
    within_group_order: Vec<OrderTerm>,
    having: Vec<Condition>,
    order_by: Vec<OrderTerm>,
    offset: u64,
    limit: Option<u64>,
    options: Vec<OptionEntry>,
    raw_sql: Option<String>,
    aliases: AliasSequence,
    hydration: Option<HydrationSpec>,
    throttle: Option<Arc<dyn Throttle>>,
    state: QueryState,
    compiled: Option<String>,
    rows: Option<Vec<Row>>,
    num_rows: Option<u64>,
    meta: MetaState,
}

impl SphinxQuery {
    pub fn new() -> Self {
        Self {
            select: Vec::new(),
            from: Vec::new(),
            conditions: Vec::new(),
            match_terms: Vec::new(),
            raw_match_terms: Vec::new(),
            group_by: Vec::new(),
            within_group_order: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            offset: 0,
            limit: Some(DEFAULT_LIMIT),
            options: Vec::new(),
            raw_sql: None,
            aliases: AliasSequence::global(),
            hydration: None,
            throttle: None,
            state: QueryState::Dirty,
            compiled: None,
            rows: None,
            num_rows: None,
            meta: MetaState::NotRun,
        }
    }

    /// Wrap a literal statement, bypassing the builder and compiler.
    pub fn from_raw_sql(sql: impl Into<String>) -> Self {
        let mut query = Self::new();
        query.raw_sql = Some(sql.into());
        query
    }

    /// Use a dedicated alias sequence instead of the process-wide one.
    pub fn with_alias_sequence(mut self, aliases: AliasSequence) -> Self {
        self.aliases = aliases;
        self
    }

    fn touch(&mut self) {
        self.state = QueryState::Dirty;
    }

    // ----- select / from -----

    /// Append select columns. Appending none selects `*`.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let before = self.select.len();
        self.select.extend(columns.into_iter().map(Into::into));
        if self.select.len() == before {
            self.select.push("*".to_string());
        }
        self.touch();
        self
    }

    /// Append a select column unless an identical one is already present.
    pub fn add_select_if_absent(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        if !self.select.iter().any(|c| *c == column) {
            self.select.push(column);
        }
        self.touch();
        self
    }

    /// Append source indexes. At least one is required before compilation.
    pub fn from<I, S>(mut self, indexes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.from.extend(indexes.into_iter().map(Into::into));
        self.touch();
        self
    }

    // ----- filter conditions -----

    /// Replace all filter conditions with one, inferring the operator from
    /// the value shape: sequences filter with `IN`, scalars with `=`.
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.clear();
        self.conditions.push(Condition::inferred(column, value.into()));
        self.touch();
        self
    }

    /// Replace all filter conditions with one using an explicit operator.
    pub fn filter_op(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self, QueryError> {
        let condition = Condition::structured(column, Operator::parse(operator)?, value.into())?;
        let mut query = self;
        query.conditions.clear();
        query.conditions.push(condition);
        query.touch();
        Ok(query)
    }

    /// Append a filter condition with an inferred operator.
    pub fn and_filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push(Condition::inferred(column, value.into()));
        self.touch();
        self
    }

    /// Append a filter condition with an explicit operator.
    pub fn and_filter_op(
        mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self, QueryError> {
        let condition = Condition::structured(column, Operator::parse(operator)?, value.into())?;
        self.conditions.push(condition);
        self.touch();
        Ok(self)
    }

    /// Append an already-rendered filter expression, bypassing validation.
    pub fn and_raw_filter(mut self, expression: impl Into<String>) -> Self {
        self.conditions.push(Condition::raw(expression));
        self.touch();
        self
    }

    /// Emulate boolean OR over already-rendered sub-expressions.
    ///
    /// The WHERE clause of the dialect only ANDs predicates together, so
    /// the combined expression is computed as a select alias and a filter
    /// requires that alias to be true. Aliases stay unique across every
    /// query sharing the same [`AliasSequence`].
    pub fn or_filter<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let parts: Vec<String> = parts.into_iter().map(Into::into).collect();
        self.touch();
        if parts.is_empty() {
            return self;
        }

        let expression = if parts.len() == 1 {
            parts.into_iter().next().unwrap_or_default()
        } else {
            let wrapped: Vec<String> = parts.iter().map(|part| format!("({part})")).collect();
            format!("({})", wrapped.join(" OR "))
        };

        let alias = self.aliases.next_alias();
        self.select.push(format!("{expression} AS {alias}"));
        self.conditions.push(Condition::Structured {
            column: alias,
            operator: Operator::Eq,
            value: Value::Int(1),
        });
        self
    }

    // ----- full-text terms -----

    /// Replace the processed full-text terms with one; `text` is escaped.
    pub fn matching(mut self, fields: impl Into<FieldList>, text: impl Into<String>) -> Self {
        self.match_terms.clear();
        self.push_match(fields, text, false);
        self
    }

    /// Append a processed full-text term; `text` is escaped.
    pub fn and_matching(mut self, fields: impl Into<FieldList>, text: impl Into<String>) -> Self {
        self.push_match(fields, text, false);
        self
    }

    /// Replace the processed full-text terms with one whose `text` is
    /// already valid full-text syntax and is inserted verbatim.
    pub fn matching_safe(mut self, fields: impl Into<FieldList>, text: impl Into<String>) -> Self {
        self.match_terms.clear();
        self.push_match(fields, text, true);
        self
    }

    /// Append a pre-escaped full-text term.
    pub fn and_matching_safe(
        mut self,
        fields: impl Into<FieldList>,
        text: impl Into<String>,
    ) -> Self {
        self.push_match(fields, text, true);
        self
    }

    fn push_match(&mut self, fields: impl Into<FieldList>, text: impl Into<String>, safe: bool) {
        self.match_terms.push(MatchTerm {
            fields: fields.into(),
            text: text.into(),
            safe,
        });
        self.touch();
    }

    /// Replace every full-text term with one raw expression.
    pub fn raw_match(mut self, text: impl Into<String>) -> Self {
        self.match_terms.clear();
        self.raw_match_terms.clear();
        self.push_raw_match(text, MatchCombinator::And);
        self
    }

    /// Append a raw full-text expression joined with `AND`.
    pub fn and_raw_match(mut self, text: impl Into<String>) -> Self {
        self.push_raw_match(text, MatchCombinator::And);
        self
    }

    /// Append a raw full-text expression joined with `OR`.
    pub fn or_raw_match(mut self, text: impl Into<String>) -> Self {
        self.push_raw_match(text, MatchCombinator::Or);
        self
    }

    fn push_raw_match(&mut self, text: impl Into<String>, combinator: MatchCombinator) {
        self.raw_match_terms.push(RawMatchTerm {
            text: text.into(),
            combinator,
        });
        self.touch();
    }

    // ----- grouping / ordering -----

    /// Replace the group-by columns with one.
    pub fn group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.clear();
        self.group_by.push(column.into());
        self.touch();
        self
    }

    /// Append a group-by column.
    pub fn and_group_by(mut self, column: impl Into<String>) -> Self {
        self.group_by.push(column.into());
        self.touch();
        self
    }

    /// Replace the intra-group order with one term.
    pub fn within_group_order_by(
        mut self,
        column: impl Into<String>,
        order: impl Into<SortOrder>,
    ) -> Self {
        self.within_group_order.clear();
        self.and_within_group_order_by(column, order)
    }

    /// Append an intra-group order term.
    pub fn and_within_group_order_by(
        mut self,
        column: impl Into<String>,
        order: impl Into<SortOrder>,
    ) -> Self {
        self.within_group_order.push(OrderTerm {
            column: column.into(),
            order: order.into(),
        });
        self.touch();
        self
    }

    /// Replace the having conditions with one, inferring the operator.
    pub fn having(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.having.clear();
        self.having.push(Condition::inferred(column, value.into()));
        self.touch();
        self
    }

    /// Replace the having conditions with one using an explicit operator.
    pub fn having_op(
        self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self, QueryError> {
        let condition = Condition::structured(column, Operator::parse(operator)?, value.into())?;
        let mut query = self;
        query.having.clear();
        query.having.push(condition);
        query.touch();
        Ok(query)
    }

    /// Append a having condition with an inferred operator.
    pub fn and_having(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.having.push(Condition::inferred(column, value.into()));
        self.touch();
        self
    }

    /// Append a having condition with an explicit operator.
    pub fn and_having_op(
        mut self,
        column: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Result<Self, QueryError> {
        let condition = Condition::structured(column, Operator::parse(operator)?, value.into())?;
        self.having.push(condition);
        self.touch();
        Ok(self)
    }

    /// Replace the result order with one term.
    pub fn order_by(mut self, column: impl Into<String>, order: impl Into<SortOrder>) -> Self {
        self.order_by.clear();
        self.and_order_by(column, order)
    }

    /// Append a result order term.
    pub fn and_order_by(mut self, column: impl Into<String>, order: impl Into<SortOrder>) -> Self {
        self.order_by.push(OrderTerm {
            column: column.into(),
            order: order.into(),
        });
        self.touch();
        self
    }

    // ----- pagination / options -----

    /// Set the result offset.
    pub fn set_first_result(mut self, offset: u64) -> Self {
        self.offset = offset;
        self.touch();
        self
    }

    /// Set the result limit. `None` removes the bound; the compiled
    /// statement still carries the fixed two-argument LIMIT form with an
    /// empty count slot, which the engine rejects and the soft-failure
    /// contract absorbs.
    pub fn set_max_results(mut self, limit: impl Into<Option<u64>>) -> Self {
        self.limit = limit.into();
        self.touch();
        self
    }

    /// Replace the engine options with one entry.
    pub fn set_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.clear();
        self.add_option(name, value)
    }

    /// Append an engine option.
    pub fn add_option(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push(OptionEntry {
            name: name.into(),
            value: value.into(),
        });
        self.touch();
        self
    }

    /// Replace the statement text with a literal, bypassing the compiler.
    pub fn set_raw_sql(mut self, sql: impl Into<String>) -> Self {
        self.raw_sql = Some(sql.into());
        self.touch();
        self
    }

    // ----- collaborators -----

    /// Attach entity hydration: after execution, rows are traded for fully
    /// materialized entities identified by `id_column`.
    ///
    /// Attaching ensures `id_column` is part of a non-wildcard select list.
    pub fn with_entity_hydration(
        mut self,
        alias: impl Into<String>,
        id_column: impl Into<String>,
    ) -> Self {
        let id_column = id_column.into();
        if !self.select.is_empty()
            && !self.select.iter().any(|c| *c == id_column || c == "*")
        {
            self.select.push(id_column.clone());
        }
        self.hydration = Some(HydrationSpec {
            alias: alias.into(),
            id_column,
        });
        self.touch();
        self
    }

    /// Attach a throttle consulted before each engine round-trip.
    pub fn with_throttle(mut self, throttle: Arc<dyn Throttle>) -> Self {
        self.throttle = Some(throttle);
        self.touch();
        self
    }

    // ----- state -----

    /// Drop cached text, results and statistics and force recompilation.
    /// Clause state is untouched.
    pub fn reset(&mut self) {
        self.compiled = None;
        self.rows = None;
        self.num_rows = None;
        self.meta = MetaState::NotRun;
        self.state = QueryState::Dirty;
    }

    pub fn is_dirty(&self) -> bool {
        self.state == QueryState::Dirty
    }

    pub fn select_columns(&self) -> &[String] {
        &self.select
    }

    pub fn source_indexes(&self) -> &[String] {
        &self.from
    }

    pub fn hydration_spec(&self) -> Option<&HydrationSpec> {
        self.hydration.as_ref()
    }

    // ----- compilation -----

    /// Current statement text, recompiled whenever the state is dirty.
    pub fn to_sql(&mut self) -> Result<String, QueryError> {
        if let Some(raw) = &self.raw_sql {
            return Ok(raw.clone());
        }
        if self.state == QueryState::Dirty || self.compiled.is_none() {
            self.compiled = Some(self.compile()?);
        }
        Ok(self.compiled.clone().unwrap_or_default())
    }

    /// Render the clause state into one statement. Pure; caches untouched.
    pub fn compile(&self) -> Result<String, QueryError> {
        if self.select.is_empty() {
            return Err(QueryError::MissingSelect);
        }
        if self.from.is_empty() {
            return Err(QueryError::MissingFrom);
        }

        let mut parts: Vec<String> = Vec::new();
        parts.push(format!("SELECT {}", self.select.join(", ")));
        parts.push(format!("FROM {}", self.from.join(", ")));

        if !self.conditions.is_empty() {
            parts.push(format!("WHERE {}", render_conditions(&self.conditions)));
        }

        if !self.match_terms.is_empty() || !self.raw_match_terms.is_empty() {
            let introducer = if self.conditions.is_empty() {
                "WHERE"
            } else {
                "AND"
            };
            parts.push(format!(
                "{introducer} MATCH({})",
                quote_str(&self.match_expression())
            ));
        }

        if !self.group_by.is_empty() {
            parts.push(format!("GROUP BY {}", self.group_by.join(", ")));
        }
        if !self.within_group_order.is_empty() {
            parts.push(format!(
                "WITHIN GROUP ORDER BY {}",
                render_order(&self.within_group_order)
            ));
        }
        if !self.having.is_empty() {
            parts.push(format!("HAVING {}", render_conditions(&self.having)));
        }
        if !self.order_by.is_empty() {
            parts.push(format!("ORDER BY {}", render_order(&self.order_by)));
        }

        let limit = self.limit.map(|n| n.to_string()).unwrap_or_default();
        parts.push(format!("LIMIT {}, {}", self.offset, limit));

        if !self.options.is_empty() {
            let rendered: Vec<String> = self
                .options
                .iter()
                .map(|option| format!("{} = {}", option.name, option.value))
                .collect();
            parts.push(format!("OPTION {}", rendered.join(", ")));
        }

        Ok(parts.join(" ").trim().to_string())
    }

    /// Assemble the inner match expression, before outer quoting.
    fn match_expression(&self) -> String {
        let mut expression = String::new();

        for term in &self.match_terms {
            if !expression.is_empty() {
                expression.push(' ');
            }
            expression.push_str(&render_match_fields(&term.fields));
            expression.push(' ');
            if term.safe {
                expression.push_str(&term.text);
            } else {
                expression.push_str(&escape_match_text(&term.text));
            }
        }

        for raw in &self.raw_match_terms {
            if expression.is_empty() {
                expression.push_str(&raw.text);
            } else {
                expression.push(' ');
                expression.push_str(raw.combinator.as_str());
                expression.push(' ');
                expression.push_str(&raw.text);
            }
        }

        expression
    }

    // ----- execution -----

    /// Execute the query, returning the affected/matched row count.
    ///
    /// A clean query returns the cached count without contacting the
    /// engine. A statement failure does not error: it leaves an empty
    /// result with a zero count for the caller to inspect, and the state
    /// stays dirty so a retry re-contacts the engine. The statistics
    /// statement is issued either way.
    pub async fn execute<C: SearchConnection>(&mut self, conn: &C) -> Result<u64, QueryError> {
        if self.state == QueryState::Clean {
            return Ok(self.num_rows.unwrap_or_default());
        }

        let sql = self.to_sql()?;

        if let Some(throttle) = &self.throttle {
            throttle.before_statement(&self.from, false);
        }

        let started = Instant::now();
        let outcome = conn.execute(&sql).await;
        let elapsed = started.elapsed().as_secs_f64();

        let num_rows = match outcome {
            Ok(result) => {
                let affected = result.affected;
                self.rows = Some(result.rows);
                self.num_rows = Some(affected);
                self.state = QueryState::Clean;
                affected
            }
            Err(error) => {
                tracing::warn!(sql = %sql, error = %error, "statement failed");
                self.rows = Some(Vec::new());
                self.num_rows = Some(0);
                0
            }
        };
        tracing::debug!(
            sql = %sql,
            rows = num_rows,
            elapsed_secs = elapsed,
            "executed search query"
        );

        let meta_started = Instant::now();
        match conn.execute(META_STATEMENT).await {
            Ok(result) => {
                let meta = parse_meta(&result.rows);
                tracing::debug!(
                    sql = META_STATEMENT,
                    rows = meta.len() as u64,
                    elapsed_secs = meta_started.elapsed().as_secs_f64(),
                    "fetched query statistics"
                );
                self.meta = MetaState::Loaded(meta);
            }
            Err(error) => {
                tracing::warn!(sql = META_STATEMENT, error = %error, "statistics fetch failed");
                self.meta = MetaState::Unavailable;
            }
        }

        Ok(num_rows)
    }

    // ----- result accessors -----

    /// Rows from the last execution.
    pub fn rows(&self) -> Result<&[Row], QueryError> {
        self.rows.as_deref().ok_or(QueryError::NotExecuted)
    }

    /// Affected/matched row count from the last execution. Zero signals a
    /// failed statement.
    pub fn num_rows(&self) -> Result<u64, QueryError> {
        self.num_rows.ok_or(QueryError::NotExecuted)
    }

    /// Engine statistics from the last execution. Empty when the
    /// statistics fetch failed.
    pub fn meta(&self) -> Result<&BTreeMap<String, String>, QueryError> {
        static EMPTY: BTreeMap<String, String> = BTreeMap::new();
        match &self.meta {
            MetaState::NotRun => Err(QueryError::NotExecuted),
            MetaState::Unavailable => Ok(&EMPTY),
            MetaState::Loaded(map) => Ok(map),
        }
    }

    pub fn meta_state(&self) -> &MetaState {
        &self.meta
    }

    /// Total matched count reported by the engine; 0 when absent.
    pub fn total_found(&self) -> Result<u64, QueryError> {
        Ok(self
            .meta()?
            .get("total_found")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    /// Engine-side execution time in seconds; 0 when absent.
    pub fn query_time(&self) -> Result<f64, QueryError> {
        Ok(self
            .meta()?
            .get("time")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0.0))
    }
}

impl Default for SphinxQuery {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones share the alias sequence and throttle but no cached state: the
/// clone starts dirty, so its next execution recompiles and re-runs.
impl Clone for SphinxQuery {
    fn clone(&self) -> Self {
        Self {
            select: self.select.clone(),
            from: self.from.clone(),
            conditions: self.conditions.clone(),
            match_terms: self.match_terms.clone(),
            raw_match_terms: self.raw_match_terms.clone(),
            group_by: self.group_by.clone(),
            within_group_order: self.within_group_order.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            offset: self.offset,
            limit: self.limit,
            options: self.options.clone(),
            raw_sql: self.raw_sql.clone(),
            aliases: self.aliases.clone(),
            hydration: self.hydration.clone(),
            throttle: self.throttle.clone(),
            state: QueryState::Dirty,
            compiled: None,
            rows: None,
            num_rows: None,
            meta: MetaState::NotRun,
        }
    }
}

fn render_conditions(conditions: &[Condition]) -> String {
    let rendered: Vec<String> = conditions.iter().map(render_condition).collect();
    rendered.join(" AND ")
}

fn render_condition(condition: &Condition) -> String {
    match condition {
        Condition::Raw(expression) => expression.clone(),
        Condition::Structured {
            column,
            operator,
            value,
        } => match (operator, value) {
            (Operator::Between, Value::List(bounds)) if bounds.len() == 2 => format!(
                "{column} BETWEEN {} AND {}",
                quote_value(&bounds[0]),
                quote_value(&bounds[1])
            ),
            (_, Value::List(items)) => {
                let quoted: Vec<String> = items.iter().map(quote_value).collect();
                format!("{column} {} ({})", operator.as_str(), quoted.join(", "))
            }
            (_, scalar) => format!("{column} {} {}", operator.as_str(), quote_value(scalar)),
        },
    }
}

/// Integers and booleans render bare; every other scalar is quoted.
fn quote_value(value: &Value) -> String {
    match value {
        Value::Int(n) => n.to_string(),
        Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
        Value::Float(x) => quote_str(&x.to_string()),
        Value::Str(s) => quote_str(s),
        Value::Null => quote_str(""),
        Value::List(items) => {
            let quoted: Vec<String> = items.iter().map(quote_value).collect();
            quoted.join(", ")
        }
    }
}

fn render_order(terms: &[OrderTerm]) -> String {
    let rendered: Vec<String> = terms
        .iter()
        .map(|term| format!("{} {}", term.column, term.order.as_str()))
        .collect();
    rendered.join(", ")
}

fn render_match_fields(fields: &FieldList) -> String {
    let names = fields.names();
    if names.len() == 1 {
        format!("@{}", escape_match_field(&names[0]))
    } else {
        let escaped: Vec<String> = names.iter().map(|name| escape_match_field(name)).collect();
        format!("@({})", escaped.join(","))
    }
}

fn parse_meta(rows: &[Row]) -> BTreeMap<String, String> {
    rows.iter()
        .filter_map(|row| {
            let name = row.get("Variable_name")?;
            let value = row.get("Value")?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn base() -> SphinxQuery {
        SphinxQuery::new()
            .with_alias_sequence(AliasSequence::new())
            .select(["id"])
            .from(["articles"])
    }

    #[test]
    fn test_defaults_compile() {
        let mut query = SphinxQuery::new().select(["title"]).from(["articles"]);
        assert_eq!(query.to_sql().unwrap(), "SELECT title FROM articles LIMIT 0, 20");
    }

    #[test]
    fn test_empty_select_defaults_to_star() {
        let mut query = SphinxQuery::new()
            .select(Vec::<String>::new())
            .from(["articles"]);
        assert_eq!(query.to_sql().unwrap(), "SELECT * FROM articles LIMIT 0, 20");
    }

    #[test]
    fn test_missing_clauses_fail() {
        let query = SphinxQuery::new().from(["articles"]);
        assert_eq!(query.compile(), Err(QueryError::MissingSelect));

        let query = SphinxQuery::new().select(["id"]);
        assert_eq!(query.compile(), Err(QueryError::MissingFrom));
    }

    #[test]
    fn test_filter_inference() {
        let mut query = base().filter("id", [1, 2, 3]);
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE id IN (1, 2, 3) LIMIT 0, 20"
        );

        let mut query = base().filter("status", "live");
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE status = 'live' LIMIT 0, 20"
        );
    }

    #[test]
    fn test_filter_replaces_and_filter_appends() {
        let mut query = base().filter("a", 1).filter("b", 2).and_filter("c", 3);
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE b = 2 AND c = 3 LIMIT 0, 20"
        );
    }

    #[test]
    fn test_between_rendering_and_validation() {
        let mut query = base().filter_op("id", "between", [1, 5]).unwrap();
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE id BETWEEN 1 AND 5 LIMIT 0, 20"
        );

        assert_eq!(
            base().filter_op("id", "BETWEEN", [1]).err(),
            Some(QueryError::BetweenBounds)
        );
        assert_eq!(
            base().filter_op("id", "in", 1).err(),
            Some(QueryError::ExpectedSequence("IN"))
        );
        assert_eq!(
            base().filter_op("id", "~", 1).err(),
            Some(QueryError::UnknownOperator("~".to_string()))
        );
    }

    #[test]
    fn test_value_quoting() {
        let mut query = base()
            .filter("title", "o'brien")
            .and_filter("active", true)
            .and_filter_op("weight", ">=", 1.5)
            .unwrap();
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE title = 'o\\'brien' AND active = 1 AND weight >= '1.5' LIMIT 0, 20"
        );
    }

    #[test]
    fn test_raw_filter_is_verbatim() {
        let mut query = base().filter("a", 1).and_raw_filter("b > c");
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE a = 1 AND b > c LIMIT 0, 20"
        );
    }

    #[test]
    fn test_match_escapes_text() {
        let mut query = base().matching("title", "foo bar");
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE MATCH('@title foo\\\\ bar') LIMIT 0, 20"
        );
    }

    #[test]
    fn test_match_safe_is_verbatim() {
        let mut query = base().matching_safe("title", "a|b");
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE MATCH('@title a|b') LIMIT 0, 20"
        );
    }

    #[test]
    fn test_match_field_lists() {
        let mut query = base().matching(["title", "content"], "rust");
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE MATCH('@(title,content) rust') LIMIT 0, 20"
        );
    }

    #[test]
    fn test_match_joins_where_with_and() {
        let mut query = base().filter("status", 1).matching("title", "rust");
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE status = 1 AND MATCH('@title rust') LIMIT 0, 20"
        );
    }

    #[test]
    fn test_matching_replaces_and_matching_appends() {
        let mut query = base()
            .matching("title", "old")
            .matching("title", "new")
            .and_matching("content", "more");
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE MATCH('@title new @content more') LIMIT 0, 20"
        );
    }

    #[test]
    fn test_raw_match_combinators() {
        let mut query = base()
            .raw_match("hello")
            .and_raw_match("world")
            .or_raw_match("there");
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE MATCH('hello AND world OR there') LIMIT 0, 20"
        );
    }

    #[test]
    fn test_raw_match_appends_to_processed_terms() {
        let mut query = base().matching("title", "rust").and_raw_match("\"exact phrase\"");
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE MATCH('@title rust AND \\\"exact phrase\\\"') LIMIT 0, 20"
        );
    }

    #[test]
    fn test_raw_match_clears_processed_terms() {
        let mut query = base().matching("title", "rust").raw_match("fresh");
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles WHERE MATCH('fresh') LIMIT 0, 20"
        );
    }

    #[test]
    fn test_or_filter_aliases() {
        let mut query = base().or_filter(["a = 1", "b = 2 AND c = 3"]);
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id, ((a = 1) OR (b = 2 AND c = 3)) AS orX1 FROM articles \
             WHERE orX1 = 1 LIMIT 0, 20"
        );
    }

    #[test]
    fn test_or_filter_single_part_unwrapped() {
        let mut query = base().or_filter(["a = 1"]);
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id, a = 1 AS orX1 FROM articles WHERE orX1 = 1 LIMIT 0, 20"
        );
    }

    #[test]
    fn test_or_filter_aliases_unique_across_queries() {
        let aliases = AliasSequence::new();
        let first = SphinxQuery::new()
            .with_alias_sequence(aliases.clone())
            .select(["id"])
            .from(["a"])
            .or_filter(["x = 1"]);
        let second = SphinxQuery::new()
            .with_alias_sequence(aliases)
            .select(["id"])
            .from(["b"])
            .or_filter(["y = 1"]);

        assert!(first.select_columns().iter().any(|c| c.ends_with("AS orX1")));
        assert!(second.select_columns().iter().any(|c| c.ends_with("AS orX2")));
    }

    #[test]
    fn test_grouping_and_ordering() {
        let mut query = base()
            .group_by("user_id")
            .and_group_by("day")
            .within_group_order_by("rating", "desc")
            .having("cnt", 3)
            .order_by("ts", "desc")
            .and_order_by("id", "sideways");
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles GROUP BY user_id, day \
             WITHIN GROUP ORDER BY rating DESC HAVING cnt = 3 \
             ORDER BY ts DESC, id ASC LIMIT 0, 20"
        );
    }

    #[test]
    fn test_pagination_and_options() {
        let mut query = base()
            .set_first_result(40)
            .set_max_results(10)
            .set_option("ranker", "none")
            .set_option("ranker", "bm25")
            .add_option("max_matches", "3000");
        assert_eq!(
            query.to_sql().unwrap(),
            "SELECT id FROM articles LIMIT 40, 10 OPTION ranker = bm25, max_matches = 3000"
        );
    }

    #[test]
    fn test_unbounded_limit_keeps_two_argument_form() {
        let mut query = base().set_max_results(None);
        assert_eq!(query.to_sql().unwrap(), "SELECT id FROM articles LIMIT 0,");
    }

    #[test]
    fn test_raw_sql_bypasses_compiler() {
        let mut query = SphinxQuery::from_raw_sql("SHOW TABLES");
        assert_eq!(query.to_sql().unwrap(), "SHOW TABLES");
    }

    #[test]
    fn test_mutators_mark_dirty_and_to_sql_recompiles() {
        let mut query = base();
        let first = query.to_sql().unwrap();
        query = query.and_filter("status", 1);
        assert!(query.is_dirty());
        let second = query.to_sql().unwrap();
        assert_ne!(first, second);
        assert!(second.contains("status = 1"));
    }

    #[test]
    fn test_accessors_error_before_execution() {
        let query = base();
        assert_eq!(query.num_rows(), Err(QueryError::NotExecuted));
        assert!(query.rows().is_err());
        assert!(query.meta().is_err());
        assert_eq!(*query.meta_state(), MetaState::NotRun);
    }

    #[test]
    fn test_hydration_injects_id_column() {
        let query = SphinxQuery::new()
            .select(["title"])
            .from(["articles"])
            .with_entity_hydration("articles", "id");
        assert_eq!(query.select_columns(), ["title", "id"]);

        let query = SphinxQuery::new()
            .select(["*"])
            .from(["articles"])
            .with_entity_hydration("articles", "id");
        assert_eq!(query.select_columns(), ["*"]);
    }

    #[test]
    fn test_parse_meta_keys_by_column_name() {
        let mut row_a = Row::new();
        row_a.insert("Variable_name".into(), Value::Str("total_found".into()));
        row_a.insert("Value".into(), Value::Str("35".into()));
        let mut row_b = Row::new();
        row_b.insert("Variable_name".into(), Value::Str("time".into()));
        row_b.insert("Value".into(), Value::Str("0.004".into()));

        let meta = parse_meta(&[row_a, row_b]);
        assert_eq!(meta.get("total_found"), Some(&"35".to_string()));
        assert_eq!(meta.get("time"), Some(&"0.004".to_string()));
    }
}
