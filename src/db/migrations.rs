use crate::db::Database;
use crate::error::Result;

const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    CREATE TABLE IF NOT EXISTS evaluation_runs (
        id TEXT PRIMARY KEY,
        organization_id TEXT NOT NULL,
        campaign_id TEXT,
        field_id TEXT,
        plot_id TEXT,
        ruleset_version TEXT NOT NULL,
        total_evaluation_ms REAL NOT NULL,
        errors TEXT NOT NULL DEFAULT '[]',
        alert_count INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL DEFAULT (datetime('now'))
    );

    CREATE TABLE IF NOT EXISTS run_alerts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        run_id TEXT NOT NULL REFERENCES evaluation_runs(id) ON DELETE CASCADE,
        alert_id TEXT NOT NULL,
        rule_id TEXT NOT NULL,
        title TEXT NOT NULL,
        severity TEXT NOT NULL,
        confidence REAL NOT NULL,
        recommendation TEXT NOT NULL,
        explanation TEXT NOT NULL,
        triggered_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS run_log_entries (
        run_id TEXT NOT NULL REFERENCES evaluation_runs(id) ON DELETE CASCADE,
        position INTEGER NOT NULL,
        rule_id TEXT NOT NULL,
        status TEXT NOT NULL,
        elapsed_ms REAL NOT NULL,
        conditions TEXT NOT NULL DEFAULT '[]',
        matched_conditions INTEGER NOT NULL,
        message TEXT,
        error_code TEXT,
        PRIMARY KEY (run_id, position)
    );
    "#,
    // Migration 2: Add indexes
    r#"
    CREATE INDEX IF NOT EXISTS idx_evaluation_runs_created_at
        ON evaluation_runs(created_at);
    CREATE INDEX IF NOT EXISTS idx_evaluation_runs_organization
        ON evaluation_runs(organization_id);
    CREATE INDEX IF NOT EXISTS idx_run_alerts_run_id
        ON run_alerts(run_id);
    "#,
];

pub fn run(db: &Database) -> Result<()> {
    db.with_conn_mut(|conn| {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            "#,
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            let version = (i + 1) as i32;
            if version > current_version {
                tracing::info!("Applying migration {}", version);
                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO schema_migrations (version) VALUES (?1)",
                    [version],
                )?;
            }
        }

        Ok(())
    })
}
