//! Copies a capped slice of rows from one database into another.
//!
//! Fixing the number of rows is not a good proxy for a connected slice of
//! data, so foreign keys are not enforced on the target while copying and
//! no conflict handling is attempted. Meant for small test copies only.

use std::io::{self, Write};
use std::path::PathBuf;

use sqlx::postgres::PgConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::Connection;

use crate::error::{CiError, Result};

/// Schemas that belong to postgres or the hosting platform, never cloned.
pub const SKIPPED_SCHEMAS: &[&str] = &[
    "information_schema",
    "auth",
    "graphql",
    "graphql_public",
    "realtime",
    "extensions",
    "storage",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("sqlite:") {
            Ok(Dialect::Sqlite)
        } else if url.starts_with("postgresql://") || url.starts_with("postgres://") {
            Ok(Dialect::Postgres)
        } else {
            Err(CiError::database(format!(
                "Unsupported database URL '{}': expected sqlite: or postgresql://",
                url
            )))
        }
    }
}

/// Rows copied for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct TableCopy {
    /// Postgres schema, `None` for SQLite.
    pub schema: Option<String>,
    pub table: String,
    pub copied: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloneReport {
    pub tables: Vec<TableCopy>,
}

impl CloneReport {
    pub fn rows_copied(&self) -> u64 {
        self.tables.iter().map(|t| t.copied).sum()
    }
}

/// File path of a `sqlite:` URL.
///
/// Accepts `sqlite:///relative.db`, `sqlite:////abs/path.db`,
/// `sqlite://path.db` and `sqlite:path.db`.
pub fn sqlite_path(url: &str) -> Result<PathBuf> {
    let path = url
        .strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .or_else(|| url.strip_prefix("sqlite:"))
        .ok_or_else(|| CiError::database(format!("Not a sqlite URL: {}", url)))?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path == ":memory:" {
        return Err(CiError::database(format!(
            "Cannot clone an in-memory or unnamed database: {}",
            url
        )));
    }
    Ok(PathBuf::from(path))
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Schemas worth cloning: everything except postgres internals (`pg_*`)
/// and [SKIPPED_SCHEMAS].
pub fn clone_schemas(all: Vec<String>) -> Vec<String> {
    all.into_iter()
        .filter(|schema| !schema.starts_with("pg_"))
        .filter(|schema| !SKIPPED_SCHEMAS.contains(&schema.as_str()))
        .collect()
}

/// Rows to skip so that only the last `n_rows` of `total` are copied.
pub fn row_offset(total: u64, n_rows: u64) -> u64 {
    total.saturating_sub(n_rows)
}

/// `CREATE TABLE IF NOT EXISTS` for a reflected postgres table.
pub fn create_table_sql(qualified: &str, columns: &[(String, String, bool)], primary_key: &[String]) -> String {
    let mut parts: Vec<String> = columns
        .iter()
        .map(|(name, data_type, not_null)| {
            let mut column = format!("{} {}", quote_ident(name), data_type);
            if *not_null {
                column.push_str(" NOT NULL");
            }
            column
        })
        .collect();
    if !primary_key.is_empty() {
        let keys: Vec<String> = primary_key.iter().map(|k| quote_ident(k)).collect();
        parts.push(format!("PRIMARY KEY ({})", keys.join(", ")));
    }
    format!("CREATE TABLE IF NOT EXISTS {} ({})", qualified, parts.join(", "))
}

fn progress(table: &str, copied: u64, total: u64) {
    print!("{} ({}/{}), ", table, copied, total);
    let _ = io::stdout().flush();
}

/// Clones schemas, tables and the last `n_rows` rows of every table from
/// `source` into `target`.
///
/// Both URLs must differ and use the same dialect.
pub async fn clone_db(source: &str, target: &str, n_rows: u64) -> Result<CloneReport> {
    if source == target {
        return Err(CiError::database("Source and target database must differ"));
    }
    let source_dialect = Dialect::from_url(source)?;
    let target_dialect = Dialect::from_url(target)?;
    if source_dialect != target_dialect {
        return Err(CiError::database(format!(
            "Cannot clone between dialects: {:?} -> {:?}",
            source_dialect, target_dialect
        )));
    }

    print!("Cloning: ");
    let report = match source_dialect {
        Dialect::Sqlite => clone_sqlite(source, target, n_rows).await?,
        Dialect::Postgres => clone_postgres(source, target, n_rows).await?,
    };
    println!();
    tracing::info!(
        tables = report.tables.len(),
        rows = report.rows_copied(),
        "database cloned"
    );
    Ok(report)
}

async fn clone_sqlite(source: &str, target: &str, n_rows: u64) -> Result<CloneReport> {
    let source_path = sqlite_path(source)?;
    if !source_path.is_file() {
        return Err(CiError::database(format!(
            "Source database {} does not exist",
            source_path.display()
        )));
    }
    let target_path = sqlite_path(target)?;

    let options = SqliteConnectOptions::new()
        .filename(&target_path)
        .create_if_missing(true)
        .foreign_keys(false);
    let mut conn = SqliteConnection::connect_with(&options).await?;

    sqlx::query("ATTACH DATABASE ? AS src")
        .bind(source_path.to_string_lossy().into_owned())
        .execute(&mut conn)
        .await?;

    let tables: Vec<(String, String)> = sqlx::query_as(
        "SELECT name, sql FROM src.sqlite_master \
         WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(&mut conn)
    .await?;

    for (name, sql) in &tables {
        let exists: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM main.sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(name)
        .fetch_one(&mut conn)
        .await?;
        if exists == 0 {
            sqlx::query(sql).execute(&mut conn).await?;
        }
    }

    let mut report = CloneReport::default();
    for (name, _) in &tables {
        let quoted = quote_ident(name);
        let total: i64 = sqlx::query_scalar(&format!("SELECT count(*) FROM src.{}", quoted))
            .fetch_one(&mut conn)
            .await?;
        let total = total.max(0) as u64;
        let offset = row_offset(total, n_rows);
        progress(name, total - offset, total);

        sqlx::query(&format!(
            "INSERT INTO main.{q} SELECT * FROM src.{q} LIMIT -1 OFFSET ?",
            q = quoted
        ))
        .bind(offset as i64)
        .execute(&mut conn)
        .await?;

        report.tables.push(TableCopy {
            schema: None,
            table: name.clone(),
            copied: total - offset,
            total,
        });
    }

    sqlx::query("DETACH DATABASE src").execute(&mut conn).await?;
    conn.close().await?;
    Ok(report)
}

async fn clone_postgres(source: &str, target: &str, n_rows: u64) -> Result<CloneReport> {
    let mut src = PgConnection::connect(source).await?;
    let mut tgt = PgConnection::connect(target).await?;

    // foreign keys are not enforced while copying
    sqlx::query("SET session_replication_role = replica")
        .execute(&mut tgt)
        .await?;

    let schemas: Vec<String> = sqlx::query_scalar(
        "SELECT schema_name::text FROM information_schema.schemata ORDER BY schema_name",
    )
    .fetch_all(&mut src)
    .await?;
    let schemas = clone_schemas(schemas);

    for schema in &schemas {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote_ident(schema)))
            .execute(&mut tgt)
            .await?;
    }

    let mut report = CloneReport::default();
    for schema in &schemas {
        print!("\nSchema: {}\n", schema);

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT table_name::text FROM information_schema.tables \
             WHERE table_schema = $1 AND table_type = 'BASE TABLE' ORDER BY table_name",
        )
        .bind(schema)
        .fetch_all(&mut src)
        .await?;

        for table in &tables {
            let qualified = format!("{}.{}", quote_ident(schema), quote_ident(table));

            let columns: Vec<(String, String, bool)> = sqlx::query_as(
                "SELECT a.attname::text, format_type(a.atttypid, a.atttypmod), a.attnotnull \
                 FROM pg_attribute a \
                 WHERE a.attrelid = $1::text::regclass AND a.attnum > 0 AND NOT a.attisdropped \
                 ORDER BY a.attnum",
            )
            .bind(&qualified)
            .fetch_all(&mut src)
            .await?;

            let primary_key: Vec<String> = sqlx::query_scalar(
                "SELECT a.attname::text FROM pg_index i \
                 JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey) \
                 WHERE i.indrelid = $1::text::regclass AND i.indisprimary \
                 ORDER BY a.attnum",
            )
            .bind(&qualified)
            .fetch_all(&mut src)
            .await?;

            sqlx::query(&create_table_sql(&qualified, &columns, &primary_key))
                .execute(&mut tgt)
                .await?;

            let total: i64 = sqlx::query_scalar(&format!("SELECT count(*) FROM {}", qualified))
                .fetch_one(&mut src)
                .await?;
            let total = total.max(0) as u64;
            let offset = row_offset(total, n_rows);
            progress(table, total - offset, total);

            let order_by = if primary_key.is_empty() {
                String::new()
            } else {
                let keys: Vec<String> = primary_key.iter().map(|k| quote_ident(k)).collect();
                format!(" ORDER BY {}", keys.join(", "))
            };
            let rows: Vec<String> = sqlx::query_scalar(&format!(
                "SELECT row_to_json(t)::text FROM {} t{} OFFSET $1",
                qualified, order_by
            ))
            .bind(offset as i64)
            .fetch_all(&mut src)
            .await?;

            let insert = format!(
                "INSERT INTO {q} SELECT * FROM json_populate_record(NULL::{q}, $1::json)",
                q = qualified
            );
            let mut tx = tgt.begin().await?;
            for row in &rows {
                sqlx::query(&insert).bind(row).execute(&mut *tx).await?;
            }
            tx.commit().await?;

            report.tables.push(TableCopy {
                schema: Some(schema.clone()),
                table: table.clone(),
                copied: rows.len() as u64,
                total,
            });
        }
    }

    src.close().await?;
    tgt.close().await?;
    Ok(report)
}
