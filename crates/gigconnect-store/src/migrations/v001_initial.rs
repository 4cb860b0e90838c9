//! v001 -- Initial schema creation.
//!
//! Creates the append-only `messages` table.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,  -- never reused
    conversation_id TEXT NOT NULL,
    from_id         INTEGER NOT NULL,
    from_name       TEXT NOT NULL,
    from_role       TEXT NOT NULL,                      -- 'freelancer' | 'establishment'
    to_id           INTEGER NOT NULL,
    to_name         TEXT NOT NULL,
    to_role         TEXT NOT NULL,
    subject         TEXT,
    body            TEXT NOT NULL,
    created_at      TEXT NOT NULL,                      -- RFC-3339, UTC
    is_read         INTEGER NOT NULL DEFAULT 0,         -- boolean 0/1

    CHECK (from_role IN ('freelancer', 'establishment')),
    CHECK (to_role IN ('freelancer', 'establishment')),
    CHECK (from_role <> to_role)
);

CREATE INDEX IF NOT EXISTS idx_messages_conversation
    ON messages(conversation_id, id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
