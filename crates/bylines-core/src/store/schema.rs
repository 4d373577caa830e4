//! DDL for the bylines store.
//!
//! One database holds the read-only inputs (change log, actors, works,
//! versions, collections, live creator links) and the normalized output
//! (authorships). The change log is append-only; the only writer after
//! import is the audit-append path for replayed authorship writes.

/// Schema version 1: every table and index.
pub const MIGRATION_V1_SQL: &str = "
CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);
INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 0);

CREATE TABLE IF NOT EXISTS actors (
    actor_id INTEGER PRIMARY KEY,
    given_name TEXT NOT NULL DEFAULT '',
    surname TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    orcid TEXT
);

CREATE TABLE IF NOT EXISTS works (
    work_id INTEGER PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS work_versions (
    version_id INTEGER PRIMARY KEY,
    work_id INTEGER NOT NULL REFERENCES works(work_id),
    version_number INTEGER NOT NULL,
    title TEXT NOT NULL DEFAULT '',
    state TEXT NOT NULL DEFAULT 'draft',
    UNIQUE (work_id, version_number)
);

CREATE TABLE IF NOT EXISTS collections (
    collection_id INTEGER PRIMARY KEY,
    title TEXT NOT NULL DEFAULT ''
);

CREATE TABLE IF NOT EXISTS creator_links (
    link_id INTEGER PRIMARY KEY,
    subject_type TEXT NOT NULL,
    parent_id INTEGER NOT NULL,
    actor_id INTEGER NOT NULL,
    display_name TEXT NOT NULL DEFAULT '',
    position INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS idx_creator_links_parent
    ON creator_links(subject_type, parent_id);

CREATE TABLE IF NOT EXISTS change_events (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    subject_type TEXT NOT NULL,
    subject_id INTEGER NOT NULL,
    parent_id INTEGER NOT NULL,
    kind TEXT NOT NULL,
    actor_ref TEXT,
    snapshot TEXT,
    delta TEXT,
    occurred_at_us INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_change_events_parent
    ON change_events(subject_type, parent_id, occurred_at_us, seq);
CREATE INDEX IF NOT EXISTS idx_change_events_subject
    ON change_events(subject_type, subject_id, occurred_at_us, seq);

CREATE TABLE IF NOT EXISTS authorships (
    authorship_id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_type TEXT NOT NULL,
    owner_id INTEGER NOT NULL,
    actor_id INTEGER,
    display_name TEXT NOT NULL DEFAULT '',
    given_name TEXT NOT NULL DEFAULT '',
    surname TEXT NOT NULL DEFAULT '',
    email TEXT NOT NULL DEFAULT '',
    position INTEGER NOT NULL DEFAULT 0,
    system_authored INTEGER NOT NULL DEFAULT 0,
    deleted INTEGER NOT NULL DEFAULT 0
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_authorships_owner_actor
    ON authorships(owner_type, owner_id, actor_id);
";

/// Indexes whose presence the migration tests assert.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_creator_links_parent",
    "idx_change_events_parent",
    "idx_change_events_subject",
    "idx_authorships_owner_actor",
];
