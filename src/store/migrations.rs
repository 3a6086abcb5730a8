//! Version-tracked database migrations for the libSQL backends.
//!
//! Each migration has a version number and SQL. `run_migrations()` checks
//! the current version and applies only the new ones sequentially. The
//! record store and the audience mirror live in separate database files and
//! carry their own migration lists.

use libsql::Connection;

use crate::error::DatabaseError;

/// A single migration step.
struct Migration {
    version: i64,
    name: &'static str,
    sql: &'static str,
}

/// Record store migrations in order. Add new versions to the end.
static RECORD_MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "initial_schema",
        sql: r#"
            CREATE TABLE IF NOT EXISTS campaign_states (
                id TEXT PRIMARY KEY,
                campaign_id TEXT NOT NULL,
                status TEXT NOT NULL,
                audience_pointer INTEGER NOT NULL DEFAULT 0,
                sent_to INTEGER NOT NULL DEFAULT 0,
                total_recipients INTEGER NOT NULL DEFAULT 0,
                errors INTEGER NOT NULL DEFAULT 0,
                campaign TEXT NOT NULL,
                audience TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_campaign_states_campaign
                ON campaign_states(campaign_id);

            CREATE TABLE IF NOT EXISTS approval_requests (
                id TEXT PRIMARY KEY,
                campaign_ref INTEGER NOT NULL,
                version INTEGER NOT NULL,
                body TEXT NOT NULL,
                requested_at TEXT NOT NULL,
                approved_on TEXT,
                approvers TEXT NOT NULL DEFAULT '[]',
                UNIQUE (campaign_ref, version)
            );
            CREATE INDEX IF NOT EXISTS idx_approval_requests_ref
                ON approval_requests(campaign_ref);

            CREATE TABLE IF NOT EXISTS lost_and_found (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                message_sid TEXT NOT NULL,
                account_sid TEXT NOT NULL,
                from_number TEXT NOT NULL,
                to_number TEXT NOT NULL,
                body TEXT NOT NULL,
                received_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS message_templates (
                key TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1
            );
        "#,
    },
    Migration {
        version: 2,
        name: "default_templates",
        sql: r#"
            INSERT OR IGNORE INTO message_templates (key, body, active) VALUES
                ('intro-sms', 'Thanks for signing up for text alerts! Reply STOP at any time to opt out.', 1),
                ('approval-sms', 'Approval requested for this message:

%s

Reply %s to approve it.', 1);
        "#,
    },
];

/// Audience mirror migrations in order.
static AUDIENCE_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "audience_schema",
    sql: r#"
        CREATE TABLE IF NOT EXISTS subscribers (
            id INTEGER PRIMARY KEY,
            phone_number TEXT NOT NULL,
            email TEXT NOT NULL DEFAULT '',
            postal_code TEXT NOT NULL DEFAULT '',
            plus4 TEXT,
            district TEXT NOT NULL DEFAULT '',
            state_district TEXT,
            county TEXT,
            subscribed INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_subscribers_phone ON subscribers(phone_number);
        CREATE INDEX IF NOT EXISTS idx_subscribers_postal ON subscribers(postal_code);

        CREATE TABLE IF NOT EXISTS representatives (
            district TEXT PRIMARY KEY,
            title TEXT NOT NULL DEFAULT '',
            long_title TEXT NOT NULL DEFAULT '',
            official_name TEXT NOT NULL DEFAULT '',
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            phone_number TEXT NOT NULL DEFAULT '',
            hidden INTEGER NOT NULL DEFAULT 0
        );
    "#,
}];

/// Bring the record store schema up to date.
pub async fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    apply(conn, RECORD_MIGRATIONS).await
}

/// Bring the audience mirror schema up to date.
pub async fn run_audience_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    apply(conn, AUDIENCE_MIGRATIONS).await
}

async fn apply(conn: &Connection, migrations: &[Migration]) -> Result<(), DatabaseError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        (),
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to create _migrations table: {e}")))?;

    let current_version = get_current_version(conn).await?;

    for migration in migrations {
        if migration.version > current_version {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            conn.execute_batch(migration.sql).await.map_err(|e| {
                DatabaseError::Migration(format!(
                    "Migration V{} ({}) failed: {e}",
                    migration.version, migration.name
                ))
            })?;
            seed_version(conn, migration.version, migration.name).await?;
        }
    }

    let version = get_current_version(conn).await?;
    tracing::debug!(version, "Database migrations complete");
    Ok(())
}

/// Get the highest applied migration version, or 0 if none.
async fn get_current_version(conn: &Connection) -> Result<i64, DatabaseError> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM _migrations", ())
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to query migration version: {e}")))?;

    let row = rows
        .next()
        .await
        .map_err(|e| DatabaseError::Migration(format!("Failed to read migration version: {e}")))?;

    match row {
        Some(row) => row.get::<i64>(0).map_err(|e| {
            DatabaseError::Migration(format!("Failed to parse migration version: {e}"))
        }),
        None => Ok(0),
    }
}

/// Insert a version record into `_migrations`.
async fn seed_version(conn: &Connection, version: i64, name: &str) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO _migrations (version, name) VALUES (?1, ?2)",
        libsql::params![version, name],
    )
    .await
    .map_err(|e| DatabaseError::Migration(format!("Failed to record migration V{version}: {e}")))?;
    Ok(())
}
