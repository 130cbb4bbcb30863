use anyhow::{Context, Result, anyhow};
use rusqlite::{Connection, params};
use std::path::{Path, PathBuf};

use crate::dashboard::RunSummary;
use crate::models::{
    CompanyStats, JobRecord, JobStatus, Platform, PlatformTally, RunRecord, Statistics,
};

pub struct Database {
    conn: Connection,
    path: PathBuf,
}

impl Database {
    pub fn open() -> Result<Self> {
        Self::open_at(&crate::config::data_dir()?.join("history.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open history database: {}", path.display()))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            path: PathBuf::from(":memory:"),
        };
        db.init()?;
        Ok(db)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn init(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL UNIQUE,
                outcome TEXT NOT NULL CHECK (outcome IN ('completed', 'stopped', 'failed')),
                total_jobs INTEGER NOT NULL DEFAULT 0,
                total_applications INTEGER NOT NULL DEFAULT 0,
                search_json TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS run_platforms (
                run_id INTEGER NOT NULL REFERENCES runs(id),
                platform TEXT NOT NULL,
                jobs INTEGER NOT NULL,
                applications INTEGER NOT NULL,
                PRIMARY KEY (run_id, platform)
            );

            CREATE TABLE IF NOT EXISTS run_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id INTEGER NOT NULL REFERENCES runs(id),
                job_ref INTEGER NOT NULL,
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                platform TEXT NOT NULL,
                status TEXT NOT NULL CHECK (status IN ('found', 'applied'))
            );

            CREATE INDEX IF NOT EXISTS idx_run_jobs_run ON run_jobs(run_id);
            CREATE INDEX IF NOT EXISTS idx_run_jobs_company ON run_jobs(company);
            "#,
        )?;
        Ok(())
    }

    // --- Writes ---

    pub fn record_run(&self, summary: &RunSummary) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let results = &summary.results;

        tx.execute(
            "INSERT INTO runs (session_id, outcome, total_jobs, total_applications,
                               search_json, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                summary.session_id,
                summary.outcome.as_str(),
                results.total_jobs,
                results.total_applications,
                serde_json::to_string(&summary.search)?,
                summary.started_at.to_rfc3339(),
                summary.finished_at.to_rfc3339(),
            ],
        )?;
        let run_id = tx.last_insert_rowid();

        for (platform, tally) in &results.platform_results {
            tx.execute(
                "INSERT INTO run_platforms (run_id, platform, jobs, applications)
                 VALUES (?1, ?2, ?3, ?4)",
                params![run_id, platform.key(), tally.jobs, tally.applications],
            )?;
        }

        for job in &results.jobs {
            tx.execute(
                "INSERT INTO run_jobs (run_id, job_ref, title, company, platform, status)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    run_id,
                    job.id,
                    job.title,
                    job.company,
                    job.platform.key(),
                    job.status.as_str()
                ],
            )?;
        }

        tx.commit()?;
        Ok(run_id)
    }

    // --- Reads ---

    pub fn list_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, outcome, total_jobs, total_applications,
                    search_json, started_at, finished_at
             FROM runs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], Self::row_to_run)?;
        rows.collect::<Result<Vec<_>, _>>()
            .context("Failed to list runs")
    }

    pub fn get_run(&self, id: i64) -> Result<Option<RunRecord>> {
        let result = self.conn.query_row(
            "SELECT id, session_id, outcome, total_jobs, total_applications,
                    search_json, started_at, finished_at
             FROM runs WHERE id = ?1",
            [id],
            Self::row_to_run,
        );
        match result {
            Ok(run) => Ok(Some(run)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn run_jobs(&self, run_id: i64) -> Result<Vec<JobRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT job_ref, title, company, platform, status
             FROM run_jobs WHERE run_id = ?1 ORDER BY job_ref",
        )?;
        let rows = stmt.query_map([run_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut jobs = Vec::new();
        for row in rows {
            let (id, title, company, platform, status) = row?;
            jobs.push(JobRecord {
                id,
                title,
                company,
                platform: Platform::from_key(&platform)
                    .ok_or_else(|| anyhow!("Unknown platform '{}' in run #{}", platform, run_id))?,
                status: JobStatus::parse(&status)
                    .ok_or_else(|| anyhow!("Unknown job status '{}' in run #{}", status, run_id))?,
            });
        }
        Ok(jobs)
    }

    pub fn statistics(&self) -> Result<Statistics> {
        let (runs, completed_runs, total_jobs, total_applications): (i64, i64, i64, i64) =
            self.conn.query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(outcome = 'completed'), 0),
                        COALESCE(SUM(total_jobs), 0),
                        COALESCE(SUM(total_applications), 0)
                 FROM runs",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        let mut stats = Statistics {
            runs: runs as u32,
            completed_runs: completed_runs as u32,
            total_jobs: total_jobs as u64,
            total_applications: total_applications as u64,
            ..Statistics::default()
        };

        let mut stmt = self.conn.prepare(
            "SELECT platform, SUM(jobs), SUM(applications)
             FROM run_platforms GROUP BY platform",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?))
        })?;
        for row in rows {
            let (key, jobs, applications) = row?;
            if let Some(platform) = Platform::from_key(&key) {
                stats.platforms.insert(
                    platform,
                    PlatformTally {
                        jobs: jobs as u32,
                        applications: applications as u32,
                    },
                );
            }
        }

        // Top 10 companies by how often they showed up
        let mut stmt = self.conn.prepare(
            "SELECT company, COUNT(*) AS total, SUM(status = 'applied')
             FROM run_jobs GROUP BY LOWER(company)
             ORDER BY total DESC, company ASC LIMIT 10",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CompanyStats {
                company: row.get(0)?,
                total: row.get::<_, i64>(1)? as u32,
                applied: row.get::<_, i64>(2)? as u32,
            })
        })?;
        stats.companies = rows.collect::<Result<Vec<_>, _>>()?;

        Ok(stats)
    }

    fn row_to_run(row: &rusqlite::Row) -> rusqlite::Result<RunRecord> {
        Ok(RunRecord {
            id: row.get(0)?,
            session_id: row.get(1)?,
            outcome: row.get(2)?,
            total_jobs: row.get(3)?,
            total_applications: row.get(4)?,
            search_json: row.get(5)?,
            started_at: row.get(6)?,
            finished_at: row.get(7)?,
        })
    }
}
