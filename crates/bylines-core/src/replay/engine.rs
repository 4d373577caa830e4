//! The per-owner reconciliation engine.
//!
//! For one owning aggregate (a work version or a collection), the engine
//! replays the ordered creator-link event stream into authorship rows.
//! Events are grouped by the legacy link they describe; each group commits
//! or rolls back independently inside a `SAVEPOINT`, so one malformed group
//! never poisons its siblings.
//!
//! Data problems (a missing creation event on a first version, an actor
//! deleted upstream) are collected as strings on the [`ReconcileOutcome`],
//! not returned as `Err`. `Err` is reserved for code-shaped failures such
//! as a broken store.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};

use crate::actor::ActorResolver;
use crate::error::ErrorCode;
use crate::event::{ChangeEvent, EventKind, OwnerRef};
use crate::model::Authorship;
use crate::store::query::{self, WriteOrigin};

/// Per-owner tallies and collected data errors from one reconciliation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Authorship rows created in this run (replayed or synthesized).
    pub migrated: usize,
    /// Groups skipped because a prior run already migrated them.
    pub skipped: usize,
    /// Human-readable data errors, one per abandoned group.
    pub errors: Vec<String>,
}

impl ReconcileOutcome {
    /// Whether the run completed without data errors.
    #[must_use]
    pub fn clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Replays creator-link history for one owner at a time.
pub struct Reconciler<'a> {
    conn: &'a mut Connection,
}

impl<'a> Reconciler<'a> {
    /// Wrap an open store connection.
    pub fn new(conn: &'a mut Connection) -> Self {
        Self { conn }
    }

    /// Reconcile one owning aggregate.
    ///
    /// `version_number` is the 1-based ordinal of the owner within its work
    /// (collections pass 1): only owners past the first version are allowed
    /// to synthesize authorships from live links when the creation event
    /// never reached the change log.
    ///
    /// # Errors
    ///
    /// Returns an error only for store-level failures. Data problems land
    /// in [`ReconcileOutcome::errors`].
    pub fn reconcile(&mut self, owner: OwnerRef, version_number: u32) -> Result<ReconcileOutcome> {
        let events = query::creator_events_for_parent(self.conn, owner)?;
        let groups = group_by_subject(events);

        let resolver = self.load_actors(owner, &groups)?;
        let mut outcome = ReconcileOutcome::default();
        let mut seen_actors: HashSet<i64> = HashSet::new();

        for group in &groups {
            self.reconcile_group(owner, version_number, group, &resolver, &mut seen_actors, &mut outcome)?;
        }

        if version_number > 1 {
            self.carry_forward(owner, &resolver, &seen_actors, &mut outcome)?;
        }

        tracing::debug!(
            owner = %owner,
            migrated = outcome.migrated,
            skipped = outcome.skipped,
            errors = outcome.errors.len(),
            "owner reconciled"
        );
        Ok(outcome)
    }

    /// One round trip for every actor the run can touch: ids pinned by
    /// events plus ids on the owner's live links.
    fn load_actors(&self, owner: OwnerRef, groups: &[EventGroup]) -> Result<ActorResolver> {
        let mut ids: Vec<i64> = groups
            .iter()
            .flat_map(|group| group.events.iter().filter_map(ChangeEvent::actor_id))
            .collect();
        for link in query::live_links_for_parent(self.conn, owner)? {
            ids.push(link.actor_id);
        }
        ActorResolver::load(self.conn, &ids)
    }

    fn reconcile_group(
        &mut self,
        owner: OwnerRef,
        version_number: u32,
        group: &EventGroup,
        resolver: &ActorResolver,
        seen_actors: &mut HashSet<i64>,
        outcome: &mut ReconcileOutcome,
    ) -> Result<()> {
        let sp = self.conn.savepoint().context("open group savepoint")?;

        let result = replay_group(&sp, owner, version_number, group, resolver);
        match result {
            Ok(GroupResult::Migrated { actor_id }) => {
                sp.commit().context("commit group savepoint")?;
                if let Some(id) = actor_id {
                    seen_actors.insert(id);
                }
                outcome.migrated += 1;
            }
            Ok(GroupResult::Skipped { actor_id }) => {
                // Nothing written; dropping the savepoint is a no-op rollback.
                if let Some(id) = actor_id {
                    seen_actors.insert(id);
                }
                outcome.skipped += 1;
            }
            Err(error) => match error {
                GroupError::Data(message) => {
                    tracing::warn!(owner = %owner, link = group.subject_id, %message, "group abandoned");
                    outcome.errors.push(message);
                }
                GroupError::Store(error) => return Err(error),
            },
        }
        Ok(())
    }

    /// Synthesize authorships for live links whose actors never appeared in
    /// the event stream. Later versions copy their author lists forward on
    /// creation without logging it; the live table is the only witness.
    fn carry_forward(
        &mut self,
        owner: OwnerRef,
        resolver: &ActorResolver,
        seen_actors: &HashSet<i64>,
        outcome: &mut ReconcileOutcome,
    ) -> Result<()> {
        let links = query::live_links_for_parent(self.conn, owner)?;
        for link in links {
            if seen_actors.contains(&link.actor_id)
                || query::authorship_exists(self.conn, owner, link.actor_id)?
            {
                continue;
            }

            let sp = self.conn.savepoint().context("open carry-forward savepoint")?;
            let mut authorship =
                Authorship::from_live_link(&link, resolver.get(link.actor_id), owner);
            match query::insert_authorship(&sp, &mut authorship, &WriteOrigin::System) {
                Ok(_) => {
                    sp.commit().context("commit carry-forward savepoint")?;
                    tracing::info!(owner = %owner, link = link.link_id, actor = link.actor_id, "carried forward from live link");
                    outcome.migrated += 1;
                }
                Err(error) => {
                    // Rolls back with the savepoint; the remaining links
                    // still get their chance.
                    drop(sp);
                    let message = format!(
                        "[{}] {owner}: link #{}: {error:#}",
                        ErrorCode::PersistenceFailed,
                        link.link_id,
                    );
                    tracing::warn!(owner = %owner, link = link.link_id, %message, "carry-forward abandoned");
                    outcome.errors.push(message);
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Group replay
// ---------------------------------------------------------------------------

struct EventGroup {
    subject_id: i64,
    events: Vec<ChangeEvent>,
}

/// Partition events by the link they describe, preserving the order in
/// which each link first appears in the stream.
fn group_by_subject(events: Vec<ChangeEvent>) -> Vec<EventGroup> {
    let mut order: Vec<i64> = Vec::new();
    let mut buckets: HashMap<i64, Vec<ChangeEvent>> = HashMap::new();

    for event in events {
        if !buckets.contains_key(&event.subject_id) {
            order.push(event.subject_id);
        }
        buckets.entry(event.subject_id).or_default().push(event);
    }

    order
        .into_iter()
        .map(|subject_id| EventGroup {
            subject_id,
            events: buckets.remove(&subject_id).unwrap_or_default(),
        })
        .collect()
}

enum GroupResult {
    Migrated { actor_id: Option<i64> },
    Skipped { actor_id: Option<i64> },
}

enum GroupError {
    /// A problem with the data itself; the group rolls back and is reported.
    Data(String),
    /// A store failure; aborts the whole run.
    Store(anyhow::Error),
}

impl From<anyhow::Error> for GroupError {
    fn from(error: anyhow::Error) -> Self {
        Self::Store(error)
    }
}

/// Classify a failed authorship write as a data error for this group.
///
/// Constraint violations (a replayed `actor_id` colliding with an
/// already-migrated author, say) must roll back the group and be reported,
/// not abort the owner's whole run.
fn persisted<T>(owner: OwnerRef, subject_id: i64, result: Result<T>) -> Result<T, GroupError> {
    result.map_err(|error| {
        GroupError::Data(format!(
            "[{}] {owner}: link #{subject_id}: {error:#}",
            ErrorCode::PersistenceFailed,
        ))
    })
}

fn replay_group(
    conn: &Connection,
    owner: OwnerRef,
    version_number: u32,
    group: &EventGroup,
    resolver: &ActorResolver,
) -> Result<GroupResult, GroupError> {
    let first = group
        .events
        .first()
        .ok_or_else(|| GroupError::Data(format!("{owner}: link #{}: empty event group", group.subject_id)))?;

    let mut authorship;
    let replay_from;

    if first.kind == EventKind::Created {
        let Some(actor_id) = first.actor_id() else {
            return Err(GroupError::Data(format!(
                "[{}] {owner}: link #{}: creation event names no actor",
                ErrorCode::ActorNotFound,
                group.subject_id,
            )));
        };

        if query::authorship_exists(conn, owner, actor_id)?
            || query::authorship_event_exists(conn, owner, actor_id)?
        {
            return Ok(GroupResult::Skipped {
                actor_id: Some(actor_id),
            });
        }

        let Some(actor) = resolver.get(actor_id) else {
            return Err(GroupError::Data(format!(
                "[{}] {owner}: link #{}: actor {actor_id} not found",
                ErrorCode::ActorNotFound,
                group.subject_id,
            )));
        };

        authorship = Authorship::seeded_from_actor(actor, owner);
        if let Some(snapshot) = &first.snapshot {
            authorship.apply_snapshot(snapshot);
        }
        persisted(
            owner,
            group.subject_id,
            query::insert_authorship(conn, &mut authorship, &replayed(first)),
        )?;
        replay_from = 1;
    } else {
        // The creation event never reached the change log. First versions
        // treat that as unrecoverable; later versions reconstruct from the
        // link's present-day state and replay everything over it.
        if version_number <= 1 {
            return Err(GroupError::Data(format!(
                "[{}] {owner}: link #{}: first event is '{}', creation missing from log",
                ErrorCode::MissingCreationEvent,
                group.subject_id,
                first.kind,
            )));
        }

        let Some(link) = query::live_link(conn, group.subject_id)? else {
            return Err(GroupError::Data(format!(
                "[{}] {owner}: link #{}: no creation event and no live link to synthesize from",
                ErrorCode::MissingCreationEvent,
                group.subject_id,
            )));
        };

        if query::authorship_exists(conn, owner, link.actor_id)?
            || query::authorship_event_exists(conn, owner, link.actor_id)?
        {
            return Ok(GroupResult::Skipped {
                actor_id: Some(link.actor_id),
            });
        }

        authorship = Authorship::from_live_link(&link, resolver.get(link.actor_id), owner);
        persisted(
            owner,
            group.subject_id,
            query::insert_authorship(conn, &mut authorship, &WriteOrigin::System),
        )?;
        replay_from = 0;
    }

    for event in &group.events[replay_from..] {
        match event.kind {
            EventKind::Created => {
                if let Some(snapshot) = &event.snapshot {
                    authorship.apply_snapshot(snapshot);
                    persisted(
                        owner,
                        group.subject_id,
                        query::update_authorship(conn, &authorship, None, &replayed(event)),
                    )?;
                }
            }
            EventKind::Updated => {
                if let Some(delta) = &event.delta {
                    authorship.apply_delta(delta);
                    persisted(
                        owner,
                        group.subject_id,
                        query::update_authorship(conn, &authorship, Some(delta), &replayed(event)),
                    )?;
                }
            }
            EventKind::Deleted => {
                persisted(
                    owner,
                    group.subject_id,
                    query::soft_delete_authorship(conn, &mut authorship, &replayed(event)),
                )?;
            }
        }
    }

    // The live table is authoritative for ordering: reorders were often
    // persisted without a logged event, so the replayed position can lag.
    if !authorship.deleted {
        if let Some(link) = query::live_link(conn, group.subject_id)? {
            if link.position != authorship.position {
                authorship.position = link.position;
                persisted(
                    owner,
                    group.subject_id,
                    query::update_authorship(conn, &authorship, None, &WriteOrigin::System),
                )?;
            }
        }
    }

    Ok(GroupResult::Migrated {
        actor_id: authorship.actor_id,
    })
}

fn replayed(event: &ChangeEvent) -> WriteOrigin {
    WriteOrigin::Replayed {
        actor_ref: event.actor_ref.clone(),
        occurred_at_us: event.occurred_at_us,
    }
}
