//! Canonical identity records and actor-reference resolution.
//!
//! Two lookup paths exist:
//!
//! - [`ActorResolver`]: batched id → [`Actor`] resolution for one
//!   reconciliation run (one `IN` query, no N+1).
//! - [`NameCache`]: per-request memoization of raw `actor_ref` strings to
//!   display names for timeline rendering. Keyed by the raw reference, not
//!   the resolved identity, so repeated refs never hit the store twice.
//!
//! Both are constructed by the caller and passed in explicitly; nothing
//! here is global.

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};

/// Sentinel display name for unresolvable or missing actor references.
pub const UNKNOWN_USER: &str = "[unknown user]";

/// A canonical identity record, owned externally and only read here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    /// Primary key.
    pub id: i64,
    /// Given name.
    pub given_name: String,
    /// Surname.
    pub surname: String,
    /// Contact email.
    pub email: String,
    /// ORCID identifier, when known.
    pub orcid: Option<String>,
}

impl Actor {
    /// "Given Surname", trimmed when either part is blank.
    #[must_use]
    pub fn display_name(&self) -> String {
        let joined = format!("{} {}", self.given_name, self.surname);
        joined.trim().to_string()
    }
}

const ACTOR_COLUMNS: &str = "actor_id, given_name, surname, email, orcid";

fn actor_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Actor> {
    Ok(Actor {
        id: row.get(0)?,
        given_name: row.get(1)?,
        surname: row.get(2)?,
        email: row.get(3)?,
        orcid: row.get(4)?,
    })
}

/// Batched id → actor map for one reconciliation run.
#[derive(Debug, Default)]
pub struct ActorResolver {
    actors: HashMap<i64, Actor>,
}

impl ActorResolver {
    /// Load all of `ids` in one round trip. Duplicate ids are collapsed;
    /// ids with no matching row are simply absent from the resolver.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn load(conn: &Connection, ids: &[i64]) -> Result<Self> {
        let unique: BTreeSet<i64> = ids.iter().copied().collect();
        if unique.is_empty() {
            return Ok(Self::default());
        }

        let placeholders = vec!["?"; unique.len()].join(",");
        let sql =
            format!("SELECT {ACTOR_COLUMNS} FROM actors WHERE actor_id IN ({placeholders})");
        let mut stmt = conn.prepare(&sql).context("prepare batched actor lookup")?;
        let rows = stmt
            .query_map(rusqlite::params_from_iter(unique.iter()), actor_from_row)
            .context("run batched actor lookup")?;

        let mut actors = HashMap::new();
        for row in rows {
            let actor = row.context("read actor row")?;
            actors.insert(actor.id, actor);
        }
        Ok(Self { actors })
    }

    /// Look up a previously loaded actor.
    #[must_use]
    pub fn get(&self, id: i64) -> Option<&Actor> {
        self.actors.get(&id)
    }

    /// Number of resolved actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Whether no actors were resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

/// List every actor, ordered by id. Diagnostic surface for the CLI.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn list_actors(conn: &Connection) -> Result<Vec<Actor>> {
    let sql = format!("SELECT {ACTOR_COLUMNS} FROM actors ORDER BY actor_id ASC");
    let mut stmt = conn.prepare(&sql).context("prepare actor listing")?;
    let rows = stmt.query_map([], actor_from_row).context("list actors")?;
    let mut actors = Vec::new();
    for row in rows {
        actors.push(row.context("read actor row")?);
    }
    Ok(actors)
}

/// Per-request memoizing cache from raw actor references to display names.
///
/// Reference grammar: `actor:<id>` resolves against the actors table;
/// `app:<name>` renders the application name; anything else (including a
/// missing reference) renders [`UNKNOWN_USER`]. Lookup failures never
/// propagate; the sentinel is the recovery.
#[derive(Debug, Default)]
pub struct NameCache {
    names: HashMap<String, String>,
}

impl NameCache {
    /// Empty cache, scoped to one presentation request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a raw actor reference to a display name, memoized.
    pub fn resolve(&mut self, conn: &Connection, actor_ref: Option<&str>) -> String {
        let Some(raw) = actor_ref else {
            return UNKNOWN_USER.to_string();
        };

        if let Some(cached) = self.names.get(raw) {
            return cached.clone();
        }

        let resolved = Self::resolve_uncached(conn, raw);
        self.names.insert(raw.to_string(), resolved.clone());
        resolved
    }

    fn resolve_uncached(conn: &Connection, raw: &str) -> String {
        if let Some(id_str) = raw.strip_prefix("actor:") {
            let Ok(id) = id_str.parse::<i64>() else {
                return UNKNOWN_USER.to_string();
            };
            let sql = format!("SELECT {ACTOR_COLUMNS} FROM actors WHERE actor_id = ?1");
            return match conn.query_row(&sql, [id], actor_from_row) {
                Ok(actor) => actor.display_name(),
                Err(rusqlite::Error::QueryReturnedNoRows) => UNKNOWN_USER.to_string(),
                Err(error) => {
                    tracing::warn!(actor_ref = %raw, error = %error, "actor lookup failed");
                    UNKNOWN_USER.to_string()
                }
            };
        }

        if let Some(app) = raw.strip_prefix("app:") {
            if !app.is_empty() {
                return app.to_string();
            }
        }

        UNKNOWN_USER.to_string()
    }

    /// Number of memoized references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store;

    fn test_conn() -> Connection {
        let mut conn = Connection::open_in_memory().expect("open in-memory db");
        store::migrations::migrate(&mut conn).expect("migrate");
        conn
    }

    fn insert_actor(conn: &Connection, id: i64, given: &str, sur: &str) {
        conn.execute(
            "INSERT INTO actors (actor_id, given_name, surname, email) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![id, given, sur, format!("{given}@example.edu")],
        )
        .expect("insert actor");
    }

    #[test]
    fn display_name_joins_and_trims() {
        let actor = Actor {
            id: 1,
            given_name: "Jane".to_string(),
            surname: String::new(),
            email: String::new(),
            orcid: None,
        };
        assert_eq!(actor.display_name(), "Jane");
    }

    #[test]
    fn resolver_loads_batch_in_one_query() {
        let conn = test_conn();
        insert_actor(&conn, 1, "Jane", "Doe");
        insert_actor(&conn, 2, "Ada", "Lovelace");

        let resolver = ActorResolver::load(&conn, &[1, 2, 2, 99]).expect("load");
        assert_eq!(resolver.len(), 2);
        assert_eq!(resolver.get(1).expect("actor 1").surname, "Doe");
        assert!(resolver.get(99).is_none());
    }

    #[test]
    fn resolver_empty_ids() {
        let conn = test_conn();
        let resolver = ActorResolver::load(&conn, &[]).expect("load");
        assert!(resolver.is_empty());
    }

    #[test]
    fn name_cache_resolves_and_memoizes() {
        let conn = test_conn();
        insert_actor(&conn, 7, "Grace", "Hopper");

        let mut cache = NameCache::new();
        assert_eq!(cache.resolve(&conn, Some("actor:7")), "Grace Hopper");
        assert_eq!(cache.len(), 1);

        // Second resolve hits the memo even if the row disappears.
        conn.execute("DELETE FROM actors WHERE actor_id = 7", [])
            .expect("delete");
        assert_eq!(cache.resolve(&conn, Some("actor:7")), "Grace Hopper");
    }

    #[test]
    fn name_cache_sentinel_for_unknowns() {
        let conn = test_conn();
        let mut cache = NameCache::new();
        assert_eq!(cache.resolve(&conn, None), UNKNOWN_USER);
        assert_eq!(cache.resolve(&conn, Some("actor:999")), UNKNOWN_USER);
        assert_eq!(cache.resolve(&conn, Some("actor:not-a-number")), UNKNOWN_USER);
        assert_eq!(cache.resolve(&conn, Some("gid://legacy/User/1")), UNKNOWN_USER);
    }

    #[test]
    fn name_cache_renders_app_refs() {
        let conn = test_conn();
        let mut cache = NameCache::new();
        assert_eq!(cache.resolve(&conn, Some("app:deposit-api")), "deposit-api");
        assert_eq!(cache.resolve(&conn, Some("app:")), UNKNOWN_USER);
    }

    #[test]
    fn list_actors_ordered() {
        let conn = test_conn();
        insert_actor(&conn, 2, "Ada", "Lovelace");
        insert_actor(&conn, 1, "Jane", "Doe");
        let actors = list_actors(&conn).expect("list");
        assert_eq!(actors.len(), 2);
        assert_eq!(actors[0].id, 1);
        assert_eq!(actors[1].id, 2);
    }
}
