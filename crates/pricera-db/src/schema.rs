//! # Schema Synchronization
//!
//! Declarative table definitions and startup-time synchronization.
//!
//! ## Modes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Synchronization Modes                              │
//! │                                                                         │
//! │  Create  ── CREATE TABLE IF NOT EXISTS            (non-destructive)    │
//! │  Alter   ── Create + ALTER TABLE ADD COLUMN for   (non-destructive,    │
//! │             columns missing from existing tables   additive only)      │
//! │  Force   ── DROP TABLE + recreate                 (DESTRUCTIVE -       │
//! │                                                    separate opt-in)    │
//! │                                                                         │
//! │  All DDL of one synchronization runs inside a single transaction:      │
//! │  either the whole schema converges or nothing changed.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every managed table carries the `pca_` tenant prefix, `created`/`updated`
//! timestamp columns owned by the engine, and a unique index per
//! declared-unique column. Those indexes are what turn a guid race between
//! two concurrent creates into a clean insert failure.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info};

use crate::error::{DbError, DbResult};

// =============================================================================
// Table definitions
// =============================================================================

/// One managed table: column declarations plus its unique columns.
struct TableDef {
    name: &'static str,
    columns: &'static [(&'static str, &'static str)],
    unique: &'static [&'static str],
}

/// Managed tables in dependency order (referenced tables first).
const TABLES: &[TableDef] = &[
    TableDef {
        name: "pca_country",
        columns: &[
            ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
            ("guid", "INTEGER NOT NULL"),
            ("alpha2", "TEXT NOT NULL"),
            ("alpha3", "TEXT NOT NULL"),
            ("dialcode", "INTEGER NOT NULL"),
            ("fr", "TEXT NOT NULL"),
            ("en", "TEXT NOT NULL"),
            ("created", "TEXT NOT NULL"),
            ("updated", "TEXT NOT NULL"),
        ],
        unique: &["guid", "alpha2", "alpha3"],
    },
    TableDef {
        name: "pca_profil",
        columns: &[
            ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
            ("guid", "INTEGER NOT NULL"),
            ("name", "TEXT NOT NULL"),
            ("reference", "TEXT NOT NULL"),
            ("description", "TEXT"),
            ("created", "TEXT NOT NULL"),
            ("updated", "TEXT NOT NULL"),
        ],
        unique: &["guid", "name", "reference"],
    },
    TableDef {
        name: "pca_company",
        columns: &[
            ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
            ("guid", "INTEGER NOT NULL"),
            ("name", "TEXT NOT NULL"),
            ("point", "TEXT NOT NULL"),
            ("code", "TEXT"),
            ("country", "INTEGER NOT NULL REFERENCES pca_country (id)"),
            ("address", "TEXT NOT NULL"),
            ("metadata", "TEXT NOT NULL"),
            ("created", "TEXT NOT NULL"),
            ("updated", "TEXT NOT NULL"),
        ],
        // Unique on nullable code is fine: SQLite indexes ignore NULLs
        unique: &["guid", "code"],
    },
    TableDef {
        name: "pca_account",
        columns: &[
            ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
            ("guid", "INTEGER NOT NULL"),
            ("code", "TEXT NOT NULL"),
            ("company", "INTEGER NOT NULL REFERENCES pca_company (id)"),
            ("active", "INTEGER NOT NULL DEFAULT 0"),
            ("blocked", "INTEGER NOT NULL DEFAULT 0"),
            ("deleted", "INTEGER NOT NULL DEFAULT 0"),
            ("deleted_at", "TEXT"),
            ("last_login", "TEXT"),
            ("created", "TEXT NOT NULL"),
            ("updated", "TEXT NOT NULL"),
        ],
        unique: &["guid", "code"],
    },
    TableDef {
        name: "pca_user",
        columns: &[
            ("id", "INTEGER PRIMARY KEY AUTOINCREMENT"),
            ("guid", "INTEGER NOT NULL"),
            ("name", "TEXT NOT NULL"),
            ("profil", "INTEGER NOT NULL REFERENCES pca_profil (id)"),
            ("account", "INTEGER NOT NULL REFERENCES pca_account (id)"),
            ("mobile", "INTEGER NOT NULL"),
            ("email", "TEXT NOT NULL"),
            ("created", "TEXT NOT NULL"),
            ("updated", "TEXT NOT NULL"),
        ],
        unique: &["guid", "mobile", "email"],
    },
];

// =============================================================================
// SchemaMode
// =============================================================================

/// How [`synchronize`] converges the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchemaMode {
    /// `CREATE TABLE IF NOT EXISTS` only. Never touches existing tables.
    #[default]
    Create,
    /// `Create` plus additive `ALTER TABLE ADD COLUMN` for columns missing
    /// from existing tables. Never drops or retypes anything.
    Alter,
    /// Drops and recreates every managed table. DESTRUCTIVE - a separate,
    /// explicit opt-in, never the default.
    Force,
}

// =============================================================================
// Synchronization
// =============================================================================

/// Brings the managed tables in line with the definitions above, inside a
/// single transaction.
pub async fn synchronize(pool: &SqlitePool, mode: SchemaMode) -> DbResult<()> {
    let mut conn = pool.acquire().await.map_err(DbError::from)?;

    sqlx::query("BEGIN").execute(conn.as_mut()).await?;

    let result = apply(conn.as_mut(), mode).await;

    match result {
        Ok(()) => {
            sqlx::query("COMMIT").execute(conn.as_mut()).await?;
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "schema synchronization failed, rolling back");
            if let Err(rb) = sqlx::query("ROLLBACK").execute(conn.as_mut()).await {
                error!(error = %rb, "schema rollback failed");
            }
            Err(e)
        }
    }
}

async fn apply(conn: &mut SqliteConnection, mode: SchemaMode) -> DbResult<()> {
    if mode == SchemaMode::Force {
        // Reverse order so foreign keys never dangle mid-drop
        for def in TABLES.iter().rev() {
            debug!(table = def.name, "dropping table (force mode)");
            sqlx::query(&format!("DROP TABLE IF EXISTS {}", def.name))
                .execute(&mut *conn)
                .await?;
        }
    }

    for def in TABLES {
        sqlx::query(&def.create_sql()).execute(&mut *conn).await?;

        if mode == SchemaMode::Alter {
            add_missing_columns(&mut *conn, def).await?;
        }

        for column in def.unique {
            sqlx::query(&def.unique_index_sql(column))
                .execute(&mut *conn)
                .await?;
        }

        info!(table = def.name, "table synchronized");
    }

    Ok(())
}

async fn add_missing_columns(conn: &mut SqliteConnection, def: &TableDef) -> DbResult<()> {
    let existing: Vec<String> =
        sqlx::query_scalar(&format!("SELECT name FROM pragma_table_info('{}')", def.name))
            .fetch_all(&mut *conn)
            .await?;

    for (name, decl) in def.columns {
        if existing.iter().any(|c| c == name) {
            continue;
        }
        debug!(table = def.name, column = name, "adding missing column");
        sqlx::query(&format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            def.name,
            name,
            alter_decl(decl)
        ))
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// SQLite cannot add a NOT NULL column without a default to a populated
/// table, so alter-added columns get a type-appropriate default.
fn alter_decl(decl: &str) -> String {
    if !decl.contains("NOT NULL") || decl.contains("DEFAULT") {
        return decl.to_string();
    }
    let default = if decl.starts_with("INTEGER") { "0" } else { "''" };
    format!("{decl} DEFAULT {default}")
}

impl TableDef {
    fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|(name, decl)| format!("{name} {decl}"))
            .collect::<Vec<_>>()
            .join(",\n    ");
        format!("CREATE TABLE IF NOT EXISTS {} (\n    {}\n)", self.name, columns)
    }

    fn unique_index_sql(&self, column: &str) -> String {
        format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS ux_{}_{} ON {} ({})",
            self.name, column, self.name, column
        )
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn table_names(db: &Database) -> Vec<String> {
        let mut conn = db.pool().acquire().await.unwrap();
        sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name LIKE 'pca_%' ORDER BY name",
        )
        .fetch_all(conn.as_mut())
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_mode_creates_all_tables() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        assert_eq!(
            table_names(&db).await,
            vec!["pca_account", "pca_company", "pca_country", "pca_profil", "pca_user"]
        );
    }

    #[tokio::test]
    async fn test_create_mode_is_idempotent_and_non_destructive() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        sqlx::query(
            "INSERT INTO pca_country (guid, alpha2, alpha3, dialcode, fr, en, created, updated)
             VALUES (100001, 'CM', 'CMR', 237, 'Cameroun', 'Cameroon', '2025-01-01', '2025-01-01')",
        )
        .execute(conn.as_mut())
        .await
        .unwrap();
        drop(conn);

        db.synchronize_schema(SchemaMode::Create).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pca_country")
            .fetch_one(conn.as_mut())
            .await
            .unwrap();
        assert_eq!(n, 1, "create mode must not touch existing rows");
    }

    #[tokio::test]
    async fn test_force_mode_drops_existing_rows() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        sqlx::query(
            "INSERT INTO pca_country (guid, alpha2, alpha3, dialcode, fr, en, created, updated)
             VALUES (100001, 'CM', 'CMR', 237, 'Cameroun', 'Cameroon', '2025-01-01', '2025-01-01')",
        )
        .execute(conn.as_mut())
        .await
        .unwrap();
        drop(conn);

        db.synchronize_schema(SchemaMode::Force).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pca_country")
            .fetch_one(conn.as_mut())
            .await
            .unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_alter_mode_adds_missing_columns() {
        let db = Database::new(DbConfig::in_memory().synchronize_schema(false))
            .await
            .unwrap();

        // A stale table from an older deployment, missing the en column
        let mut conn = db.pool().acquire().await.unwrap();
        sqlx::query(
            "CREATE TABLE pca_country (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                guid INTEGER NOT NULL,
                alpha2 TEXT NOT NULL,
                alpha3 TEXT NOT NULL,
                dialcode INTEGER NOT NULL,
                fr TEXT NOT NULL,
                created TEXT NOT NULL,
                updated TEXT NOT NULL
            )",
        )
        .execute(conn.as_mut())
        .await
        .unwrap();
        drop(conn);

        db.synchronize_schema(SchemaMode::Alter).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        let columns: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('pca_country')")
                .fetch_all(conn.as_mut())
                .await
                .unwrap();
        assert!(columns.iter().any(|c| c == "en"), "alter must add en: {columns:?}");
    }

    #[test]
    fn test_alter_decl_defaults() {
        assert_eq!(alter_decl("TEXT NOT NULL"), "TEXT NOT NULL DEFAULT ''");
        assert_eq!(alter_decl("INTEGER NOT NULL"), "INTEGER NOT NULL DEFAULT 0");
        assert_eq!(alter_decl("TEXT"), "TEXT");
        assert_eq!(
            alter_decl("INTEGER NOT NULL DEFAULT 0"),
            "INTEGER NOT NULL DEFAULT 0"
        );
    }
}
