//! SQL schemas for the two Prestasi SQLite databases.
//!
//! Each is executed once at connection startup. Future migrations will be
//! gated on `PRAGMA user_version`.

/// Relational reference store: identity, authorisation and workflow rows.
/// Idempotent thanks to `CREATE TABLE IF NOT EXISTS` and `INSERT OR IGNORE`.
pub const REFERENCE_SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS roles (
    name TEXT PRIMARY KEY
);

CREATE TABLE IF NOT EXISTS role_permissions (
    role       TEXT NOT NULL REFERENCES roles(name),
    permission TEXT NOT NULL,
    PRIMARY KEY (role, permission)
);

-- role is free text; names without grants simply have no permissions.
CREATE TABLE IF NOT EXISTS users (
    user_id    TEXT PRIMARY KEY,
    username   TEXT NOT NULL UNIQUE,
    full_name  TEXT NOT NULL,
    email      TEXT NOT NULL,
    role       TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS lecturers (
    lecturer_id     TEXT PRIMARY KEY,
    user_id         TEXT NOT NULL UNIQUE REFERENCES users(user_id),
    lecturer_number TEXT NOT NULL,
    department      TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS students (
    student_id     TEXT PRIMARY KEY,
    user_id        TEXT NOT NULL UNIQUE REFERENCES users(user_id),
    student_number TEXT NOT NULL,
    program_study  TEXT NOT NULL,
    academic_year  TEXT NOT NULL,
    advisor_id     TEXT REFERENCES lecturers(lecturer_id)
);

-- Only the SHA-256 digest of a bearer token is ever stored.
CREATE TABLE IF NOT EXISTS api_tokens (
    token_hash TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(user_id),
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

-- Rows are never removed; deletion sets status = 'deleted'.
CREATE TABLE IF NOT EXISTS achievement_references (
    id             TEXT PRIMARY KEY,
    student_id     TEXT NOT NULL REFERENCES students(student_id),
    document_id    TEXT NOT NULL,   -- 24-char hex id in the document store
    status         TEXT NOT NULL DEFAULT 'draft'
                   CHECK (status IN ('draft', 'submitted', 'verified', 'rejected', 'deleted')),
    rejection_note TEXT,
    submitted_at   TEXT,
    verified_at    TEXT,
    verified_by    TEXT REFERENCES users(user_id),
    created_at     TEXT NOT NULL,
    updated_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS refs_student_idx  ON achievement_references(student_id);
CREATE INDEX IF NOT EXISTS refs_status_idx   ON achievement_references(status);
CREATE INDEX IF NOT EXISTS refs_created_idx  ON achievement_references(created_at);
CREATE INDEX IF NOT EXISTS students_adv_idx  ON students(advisor_id);
CREATE INDEX IF NOT EXISTS tokens_user_idx   ON api_tokens(user_id);

INSERT OR IGNORE INTO roles (name) VALUES ('admin'), ('lecturer'), ('mahasiswa');

INSERT OR IGNORE INTO role_permissions (role, permission) VALUES
    ('admin', 'achievements:create'),
    ('admin', 'achievements:list'),
    ('admin', 'achievements:detail'),
    ('admin', 'achievements:update'),
    ('admin', 'achievements:delete'),
    ('admin', 'achievements:submit'),
    ('admin', 'achievements:verify'),
    ('admin', 'achievements:reject'),
    ('admin', 'achievements:history'),
    ('admin', 'achievements:upload'),
    ('lecturer', 'achievements:list'),
    ('lecturer', 'achievements:detail'),
    ('lecturer', 'achievements:verify'),
    ('lecturer', 'achievements:reject'),
    ('lecturer', 'achievements:history'),
    ('mahasiswa', 'achievements:create'),
    ('mahasiswa', 'achievements:list'),
    ('mahasiswa', 'achievements:detail'),
    ('mahasiswa', 'achievements:update'),
    ('mahasiswa', 'achievements:delete'),
    ('mahasiswa', 'achievements:submit'),
    ('mahasiswa', 'achievements:history'),
    ('mahasiswa', 'achievements:upload');

PRAGMA user_version = 1;
";

/// Document store: one JSON body per achievement content document.
pub const DOCUMENT_SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- id, student_id and both timestamps are authoritative in their columns;
-- body holds every other field of the document as JSON.
CREATE TABLE IF NOT EXISTS achievements (
    id         TEXT PRIMARY KEY,   -- 24-char lowercase hex
    student_id TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS achievements_student_idx ON achievements(student_id);

PRAGMA user_version = 1;
";
