//! SQL schema for the Halo SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE ... IF NOT EXISTS`.
///
/// Every tenant-scoped table carries `tenant_id` and every query filters on
/// it. Nothing is ever deleted; rows are deactivated via `active = 0`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS tenants (
    tenant_id   TEXT PRIMARY KEY,
    slug        TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    active      INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS subjects (
    subject_id  TEXT PRIMARY KEY,
    tenant_id   TEXT NOT NULL REFERENCES tenants(tenant_id),
    name        TEXT NOT NULL,
    email       TEXT NOT NULL,
    active      INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evaluators (
    evaluator_id TEXT PRIMARY KEY,
    tenant_id    TEXT NOT NULL REFERENCES tenants(tenant_id),
    name         TEXT NOT NULL,
    email        TEXT NOT NULL,
    active       INTEGER NOT NULL DEFAULT 1,
    created_at   TEXT NOT NULL
);

-- Emails are stored lowercased.
CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    tenant_id     TEXT NOT NULL REFERENCES tenants(tenant_id),
    email         TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role          TEXT NOT NULL,
    evaluator_id  TEXT REFERENCES evaluators(evaluator_id),
    active        INTEGER NOT NULL DEFAULT 1,
    created_at    TEXT NOT NULL,
    UNIQUE (tenant_id, email)
);

CREATE TABLE IF NOT EXISTS relationships (
    relationship_id   TEXT PRIMARY KEY,
    tenant_id         TEXT NOT NULL REFERENCES tenants(tenant_id),
    subject_id        TEXT NOT NULL REFERENCES subjects(subject_id),
    evaluator_id      TEXT NOT NULL REFERENCES evaluators(evaluator_id),
    relationship_type TEXT NOT NULL,
    active            INTEGER NOT NULL DEFAULT 1,
    created_at        TEXT NOT NULL,
    UNIQUE (subject_id, evaluator_id)
);

CREATE TABLE IF NOT EXISTS surveys (
    survey_id   TEXT PRIMARY KEY,
    tenant_id   TEXT NOT NULL REFERENCES tenants(tenant_id),
    title       TEXT NOT NULL,
    description TEXT,
    schema_json TEXT NOT NULL,
    active      INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

-- One row per (pair, survey). last_reminder_sent_at is written only by the
-- reminder sweep.
CREATE TABLE IF NOT EXISTS assignments (
    assignment_id         TEXT PRIMARY KEY,
    tenant_id             TEXT NOT NULL REFERENCES tenants(tenant_id),
    relationship_id       TEXT NOT NULL REFERENCES relationships(relationship_id),
    survey_id             TEXT NOT NULL REFERENCES surveys(survey_id),
    active                INTEGER NOT NULL DEFAULT 1,
    created_at            TEXT NOT NULL,
    last_reminder_sent_at TEXT,
    UNIQUE (relationship_id, survey_id)
);

CREATE TABLE IF NOT EXISTS submissions (
    submission_id TEXT PRIMARY KEY,
    tenant_id     TEXT NOT NULL REFERENCES tenants(tenant_id),
    assignment_id TEXT NOT NULL UNIQUE REFERENCES assignments(assignment_id),
    status        TEXT NOT NULL,   -- 'in_progress' | 'completed'
    answers_json  TEXT NOT NULL DEFAULT '{}',
    created_at    TEXT NOT NULL,
    updated_at    TEXT NOT NULL,
    completed_at  TEXT
);

CREATE TABLE IF NOT EXISTS report_templates (
    template_id TEXT PRIMARY KEY,
    tenant_id   TEXT NOT NULL REFERENCES tenants(tenant_id),
    name        TEXT NOT NULL,
    body        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (tenant_id, name)
);

CREATE INDEX IF NOT EXISTS subjects_tenant_idx      ON subjects(tenant_id);
CREATE INDEX IF NOT EXISTS evaluators_tenant_idx    ON evaluators(tenant_id);
CREATE INDEX IF NOT EXISTS relationships_tenant_idx ON relationships(tenant_id);
CREATE INDEX IF NOT EXISTS surveys_tenant_idx       ON surveys(tenant_id);
CREATE INDEX IF NOT EXISTS assignments_survey_idx   ON assignments(tenant_id, survey_id);
CREATE INDEX IF NOT EXISTS assignments_pending_idx  ON assignments(last_reminder_sent_at, created_at);

PRAGMA user_version = 1;
";
