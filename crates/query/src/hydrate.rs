//! Entity hydration: trading raw result rows for domain entities.
//!
//! The engine only hands back attribute rows. When a relational store owns
//! the full entities, the bridge extracts the matched identifiers, asks an
//! [`EntityLoader`] for the entities, and re-applies the engine's rank
//! order before handing them to the caller.

use std::future::Future;

use searchql_backend_sphinx::SearchConnection;

use crate::error::QueryError;
use crate::query::SphinxQuery;

/// Which loader alias and identifier column hydration runs against.
#[derive(Debug, Clone, PartialEq)]
pub struct HydrationSpec {
    /// Entity alias resolved by the loader (e.g. a mapped table name).
    pub alias: String,
    /// Result column carrying the entity identifier.
    pub id_column: String,
}

/// Entities that can report their identifier back by column name.
pub trait Identified {
    fn identifier(&self, column: &str) -> Option<i64>;
}

/// Relational loader for fully materialized entities.
///
/// Implementations must fetch exactly the entities whose identifier is in
/// `ids`, applying no pagination bounds and no ordering of their own; the
/// bridge re-applies the engine's rank order afterwards.
pub trait EntityLoader {
    type Entity: Identified;
    type Error: std::error::Error;

    fn load_by_ids(
        &self,
        alias: &str,
        id_column: &str,
        ids: &[i64],
    ) -> impl Future<Output = Result<Vec<Self::Entity>, Self::Error>> + Send;
}

impl SphinxQuery {
    /// Execute the query and trade the raw rows for hydrated entities,
    /// ordered by engine rank.
    ///
    /// Requires a hydration spec attached via
    /// [`SphinxQuery::with_entity_hydration`]. An empty result skips the
    /// loader entirely.
    pub async fn execute_entities<C, L>(
        &mut self,
        conn: &C,
        loader: &L,
    ) -> Result<Vec<L::Entity>, QueryError>
    where
        C: SearchConnection,
        L: EntityLoader,
    {
        let Some(spec) = self.hydration_spec().cloned() else {
            return Err(QueryError::NoHydration);
        };

        self.execute(conn).await?;

        let ids: Vec<i64> = self
            .rows()?
            .iter()
            .filter_map(|row| row.get(&spec.id_column))
            .filter_map(|value| value.as_i64())
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let entities = loader
            .load_by_ids(&spec.alias, &spec.id_column, &ids)
            .await
            .map_err(|e| QueryError::EntityLoad(e.to_string()))?;

        // The loader returns entities in store order; put them back into
        // the order the engine ranked their identifiers.
        let mut slots: Vec<Option<L::Entity>> = entities.into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(ids.len());
        for id in &ids {
            let position = slots.iter().position(|slot| {
                matches!(slot, Some(entity) if entity.identifier(&spec.id_column) == Some(*id))
            });
            if let Some(position) = position {
                if let Some(entity) = slots[position].take() {
                    ordered.push(entity);
                }
            }
        }

        Ok(ordered)
    }
}
