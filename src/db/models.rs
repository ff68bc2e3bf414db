// src/db/models.rs

//! Data models for Formulary database entities
//!
//! Plain structs mirroring the `runs` and `installed_formulas` tables, with
//! the queries the runner needs.

use crate::error::{Error, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::Serialize;
use std::str::FromStr;

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn parse_column<T>(row: &Row, index: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let text: String = row.get(index)?;
    text.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}

/// What a run was doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAction {
    Install,
    Test,
    Fetch,
}

impl RunAction {
    pub fn as_str(&self) -> &str {
        match self {
            RunAction::Install => "install",
            RunAction::Test => "test",
            RunAction::Fetch => "fetch",
        }
    }
}

impl FromStr for RunAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "install" => Ok(RunAction::Install),
            "test" => Ok(RunAction::Test),
            "fetch" => Ok(RunAction::Fetch),
            _ => Err(format!("Invalid run action: {}", s)),
        }
    }
}

/// Run lifecycle: pending until it either succeeds or fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Succeeded,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Succeeded => "succeeded",
            RunStatus::Failed => "failed",
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RunStatus::Pending),
            "succeeded" => Ok(RunStatus::Succeeded),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(format!("Invalid run status: {}", s)),
        }
    }
}

/// One recorded install, test or fetch attempt
#[derive(Debug, Clone, Serialize)]
pub struct Run {
    pub id: Option<i64>,
    pub action: RunAction,
    pub formula: String,
    pub status: RunStatus,
    pub detail: Option<String>,
    pub started_at: Option<String>,
    pub finished_at: Option<String>,
}

impl Run {
    pub fn new(action: RunAction, formula: impl Into<String>) -> Self {
        Self {
            id: None,
            action,
            formula: formula.into(),
            status: RunStatus::Pending,
            detail: None,
            started_at: None,
            finished_at: None,
        }
    }

    /// Insert this run into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        let started_at = now();
        conn.execute(
            "INSERT INTO runs (action, formula, status, started_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                self.action.as_str(),
                &self.formula,
                self.status.as_str(),
                &started_at
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        self.started_at = Some(started_at);
        Ok(id)
    }

    /// Move the run to a terminal status
    pub fn finish(
        &mut self,
        conn: &Connection,
        status: RunStatus,
        detail: Option<String>,
    ) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::InitError("Cannot finish run without ID".to_string()))?;

        let finished_at = now();
        conn.execute(
            "UPDATE runs SET status = ?1, detail = ?2, finished_at = ?3 WHERE id = ?4",
            params![status.as_str(), &detail, &finished_at, id],
        )?;

        self.status = status;
        self.detail = detail;
        self.finished_at = Some(finished_at);
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, action, formula, status, detail, started_at, finished_at
             FROM runs WHERE id = ?1",
        )?;

        let run = stmt.query_row([id], Self::from_row).optional()?;

        Ok(run)
    }

    /// List all runs, most recent first
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, action, formula, status, detail, started_at, finished_at
             FROM runs ORDER BY id DESC",
        )?;

        let runs = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(runs)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            action: parse_column(row, 1)?,
            formula: row.get(2)?,
            status: parse_column(row, 3)?,
            detail: row.get(4)?,
            started_at: row.get(5)?,
            finished_at: row.get(6)?,
        })
    }
}

/// A formula recorded as installed
#[derive(Debug, Clone, Serialize)]
pub struct InstalledFormula {
    pub id: Option<i64>,
    pub name: String,
    pub version: String,
    pub checksum: String,
    pub prefix: String,
    pub installed_at: Option<String>,
    pub run_id: Option<i64>,
}

impl InstalledFormula {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        checksum: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            name: name.into(),
            version: version.into(),
            checksum: checksum.into(),
            prefix: prefix.into(),
            installed_at: None,
            run_id: None,
        }
    }

    /// Insert or replace the record for this formula name
    pub fn upsert(&mut self, conn: &Connection) -> Result<i64> {
        let installed_at = now();
        conn.execute(
            "INSERT INTO installed_formulas (name, version, checksum, prefix, installed_at, run_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(name) DO UPDATE SET
                version = excluded.version,
                checksum = excluded.checksum,
                prefix = excluded.prefix,
                installed_at = excluded.installed_at,
                run_id = excluded.run_id",
            params![
                &self.name,
                &self.version,
                &self.checksum,
                &self.prefix,
                &installed_at,
                &self.run_id,
            ],
        )?;

        let id: i64 = conn.query_row(
            "SELECT id FROM installed_formulas WHERE name = ?1",
            [&self.name],
            |row| row.get(0),
        )?;
        self.id = Some(id);
        self.installed_at = Some(installed_at);
        Ok(id)
    }

    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, version, checksum, prefix, installed_at, run_id
             FROM installed_formulas WHERE name = ?1",
        )?;

        let installed = stmt.query_row([name], Self::from_row).optional()?;

        Ok(installed)
    }

    pub fn is_installed(conn: &Connection, name: &str) -> Result<bool> {
        Ok(Self::find_by_name(conn, name)?.is_some())
    }

    /// List installed formulas by name
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, name, version, checksum, prefix, installed_at, run_id
             FROM installed_formulas ORDER BY name",
        )?;

        let installed = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(installed)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            version: row.get(2)?,
            checksum: row.get(3)?,
            prefix: row.get(4)?,
            installed_at: row.get(5)?,
            run_id: row.get(6)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::schema;
    use tempfile::NamedTempFile;

    fn create_test_db() -> (NamedTempFile, Connection) {
        let temp_file = NamedTempFile::new().unwrap();
        let conn = Connection::open(temp_file.path()).unwrap();
        schema::migrate(&conn).unwrap();
        (temp_file, conn)
    }

    #[test]
    fn test_run_lifecycle() {
        let (_temp, conn) = create_test_db();

        let mut run = Run::new(RunAction::Install, "grub");
        let id = run.insert(&conn).unwrap();

        let stored = Run::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(stored.status, RunStatus::Pending);
        assert!(stored.finished_at.is_none());

        run.finish(
            &conn,
            RunStatus::Failed,
            Some("Install step 1 failed with exit status 2".to_string()),
        )
        .unwrap();

        let stored = Run::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(stored.action, RunAction::Install);
        assert_eq!(stored.status, RunStatus::Failed);
        assert!(stored.detail.unwrap().contains("exit status 2"));
        assert!(stored.finished_at.is_some());
    }

    #[test]
    fn test_finish_without_id_fails() {
        let (_temp, conn) = create_test_db();
        let mut run = Run::new(RunAction::Test, "grub");
        assert!(run.finish(&conn, RunStatus::Succeeded, None).is_err());
    }

    #[test]
    fn test_runs_listed_most_recent_first() {
        let (_temp, conn) = create_test_db();

        Run::new(RunAction::Fetch, "objconv").insert(&conn).unwrap();
        Run::new(RunAction::Install, "grub").insert(&conn).unwrap();

        let runs = Run::list_all(&conn).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].formula, "grub");
        assert_eq!(runs[1].action, RunAction::Fetch);
    }

    #[test]
    fn test_installed_upsert_replaces() {
        let (_temp, conn) = create_test_db();

        let mut first = InstalledFormula::new("grub", "2.02", "aa", "/usr/local");
        let id = first.upsert(&conn).unwrap();

        let mut second = InstalledFormula::new("grub", "2.04", "bb", "/opt/cross");
        assert_eq!(second.upsert(&conn).unwrap(), id);

        let all = InstalledFormula::list_all(&conn).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].version, "2.04");
        assert_eq!(all[0].prefix, "/opt/cross");
    }

    #[test]
    fn test_is_installed() {
        let (_temp, conn) = create_test_db();
        assert!(!InstalledFormula::is_installed(&conn, "objconv").unwrap());

        InstalledFormula::new("objconv", "2.44", "cc", "/usr/local")
            .upsert(&conn)
            .unwrap();
        assert!(InstalledFormula::is_installed(&conn, "objconv").unwrap());
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("succeeded".parse::<RunStatus>(), Ok(RunStatus::Succeeded));
        assert!("applied".parse::<RunStatus>().is_err());
        assert_eq!("fetch".parse::<RunAction>(), Ok(RunAction::Fetch));
    }
}
