use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Unread scans by recipient inbox
CREATE INDEX IF NOT EXISTS idx_messages_inbox_unread
    ON messages(to_id, to_role, is_read);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
