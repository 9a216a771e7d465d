//! SQLite-backed repository via libsql. Implements the account, schedule and report repos.
//!
//! One database file (`reports.db`) in the data directory with three tables:
//! `ad_accounts`, `scheduled_reports` and `reports`. Timestamps are unix seconds,
//! report dates are ISO `YYYY-MM-DD`, metrics and string lists are JSON text.
//!
//! A scheduled run's report insert and the schedule's `last_run_at`/`next_run_at`
//! update share one transaction. Reports of scheduled runs are unique on
//! (scheduled_report_id, date_start, date_end), so a replayed run returns the
//! existing row instead of creating a duplicate.

use crate::domain::{
    AdAccount, CanonicalMetrics, DateRange, DomainError, Frequency, NewAdAccount, NewReport,
    NewSchedule, RefreshedToken, Report, ReportStatus, ScheduledReport,
};
use crate::ports::{AccountRepo, ReportRepo, ScheduleRepo};
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{params, Connection, Database, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const ACCOUNTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS ad_accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    platform TEXT NOT NULL,
    external_account_id TEXT NOT NULL,
    account_name TEXT NOT NULL DEFAULT '',
    access_token TEXT,
    refresh_token TEXT,
    expires_at INTEGER,
    is_active INTEGER NOT NULL DEFAULT 1,
    last_synced_at INTEGER,
    metadata TEXT NOT NULL DEFAULT '{}',
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (user_id, platform, external_account_id)
)"#;

const SCHEDULES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS scheduled_reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    account_id INTEGER NOT NULL,
    platform TEXT NOT NULL,
    frequency TEXT NOT NULL,
    day_of_week INTEGER,
    day_of_month INTEGER,
    chat_room_id TEXT,
    chat_api_token TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    last_run_at INTEGER,
    next_run_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (user_id, account_id)
)"#;
const SCHEDULES_DUE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_schedules_due ON scheduled_reports (is_active, next_run_at)";

const REPORTS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS reports (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    account_id INTEGER NOT NULL,
    scheduled_report_id INTEGER,
    platform TEXT NOT NULL,
    report_type TEXT NOT NULL,
    date_start TEXT NOT NULL,
    date_end TEXT NOT NULL,
    metrics TEXT NOT NULL,
    insights TEXT NOT NULL DEFAULT '[]',
    recommendations TEXT NOT NULL DEFAULT '[]',
    summary TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    sent_to_chat INTEGER NOT NULL DEFAULT 0,
    chat_room_id TEXT,
    created_at INTEGER NOT NULL
)"#;
const REPORTS_PERIOD_INDEX: &str = "CREATE UNIQUE INDEX IF NOT EXISTS idx_reports_schedule_period \
     ON reports (scheduled_report_id, date_start, date_end)";

const ACCOUNT_COLUMNS: &str = "id, user_id, platform, external_account_id, account_name, \
     access_token, refresh_token, expires_at, is_active, last_synced_at, metadata";

const SCHEDULE_COLUMNS: &str = "id, user_id, account_id, platform, frequency, day_of_week, \
     day_of_month, chat_room_id, chat_api_token, is_active, last_run_at, next_run_at";

const REPORT_COLUMNS: &str = "id, user_id, account_id, scheduled_report_id, platform, report_type, \
     date_start, date_end, metrics, insights, recommendations, summary, status, sent_to_chat, \
     chat_room_id, created_at";

fn repo_err(e: impl std::fmt::Display) -> DomainError {
    DomainError::Repo(e.to_string())
}

fn from_ts(secs: i64) -> Result<DateTime<Utc>, DomainError> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| repo_err(format!("bad timestamp {}", secs)))
}

fn opt_ts(row: &Row, idx: i32) -> Result<Option<DateTime<Utc>>, DomainError> {
    row.get::<i64>(idx).ok().map(from_ts).transpose()
}

fn opt_day(row: &Row, idx: i32) -> Option<u8> {
    row.get::<i64>(idx).ok().and_then(|d| u8::try_from(d).ok())
}

fn parse_date(text: &str) -> Result<NaiveDate, DomainError> {
    text.parse::<NaiveDate>()
        .map_err(|e| repo_err(format!("bad date '{}': {}", text, e)))
}

fn account_from_row(row: &Row) -> Result<AdAccount, DomainError> {
    let platform: String = row.get(2).map_err(repo_err)?;
    let metadata: String = row.get::<String>(10).unwrap_or_else(|_| "{}".to_string());
    Ok(AdAccount {
        id: row.get(0).map_err(repo_err)?,
        user_id: row.get(1).map_err(repo_err)?,
        platform: platform.parse().map_err(repo_err)?,
        external_account_id: row.get(3).map_err(repo_err)?,
        account_name: row.get::<String>(4).unwrap_or_default(),
        access_token: row.get::<String>(5).ok(),
        refresh_token: row.get::<String>(6).ok(),
        expires_at: opt_ts(row, 7)?,
        is_active: row.get::<i64>(8).map_err(repo_err)? != 0,
        last_synced_at: opt_ts(row, 9)?,
        metadata: serde_json::from_str(&metadata)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default())),
    })
}

fn schedule_from_row(row: &Row) -> Result<ScheduledReport, DomainError> {
    let platform: String = row.get(3).map_err(repo_err)?;
    let frequency: String = row.get(4).map_err(repo_err)?;
    Ok(ScheduledReport {
        id: row.get(0).map_err(repo_err)?,
        user_id: row.get(1).map_err(repo_err)?,
        account_id: row.get(2).map_err(repo_err)?,
        platform: platform.parse().map_err(repo_err)?,
        frequency: frequency.parse::<Frequency>().map_err(repo_err)?,
        day_of_week: opt_day(row, 5),
        day_of_month: opt_day(row, 6),
        chat_room_id: row.get::<String>(7).ok(),
        chat_api_token: row.get::<String>(8).ok(),
        is_active: row.get::<i64>(9).map_err(repo_err)? != 0,
        last_run_at: opt_ts(row, 10)?,
        next_run_at: from_ts(row.get(11).map_err(repo_err)?)?,
    })
}

fn report_from_row(row: &Row) -> Result<Report, DomainError> {
    let platform: String = row.get(4).map_err(repo_err)?;
    let report_type: String = row.get(5).map_err(repo_err)?;
    let date_start: String = row.get(6).map_err(repo_err)?;
    let date_end: String = row.get(7).map_err(repo_err)?;
    let metrics: String = row.get(8).map_err(repo_err)?;
    let insights: String = row.get(9).map_err(repo_err)?;
    let recommendations: String = row.get(10).map_err(repo_err)?;
    Ok(Report {
        id: row.get(0).map_err(repo_err)?,
        user_id: row.get(1).map_err(repo_err)?,
        account_id: row.get(2).map_err(repo_err)?,
        scheduled_report_id: row.get::<i64>(3).ok(),
        platform: platform.parse().map_err(repo_err)?,
        report_type: report_type.parse::<Frequency>().map_err(repo_err)?,
        date_range: DateRange {
            start: parse_date(&date_start)?,
            end: parse_date(&date_end)?,
        },
        metrics: serde_json::from_str::<CanonicalMetrics>(&metrics).map_err(repo_err)?,
        insights: serde_json::from_str(&insights).map_err(repo_err)?,
        recommendations: serde_json::from_str(&recommendations).map_err(repo_err)?,
        summary: row.get::<String>(11).unwrap_or_default(),
        status: ReportStatus::Completed,
        sent_to_chat: row.get::<i64>(13).map_err(repo_err)? != 0,
        chat_room_id: row.get::<String>(14).ok(),
        created_at: from_ts(row.get(15).map_err(repo_err)?)?,
    })
}

/// First column of the first row as i64, if any.
async fn query_id(
    conn: &Connection,
    sql: &str,
    params: impl libsql::params::IntoParams,
) -> Result<Option<i64>, DomainError> {
    let mut rows = conn.query(sql, params).await.map_err(repo_err)?;
    match rows.next().await.map_err(repo_err)? {
        Some(row) => Ok(Some(row.get::<i64>(0).map_err(repo_err)?)),
        None => Ok(None),
    }
}

/// Insert a report; `None` when the (schedule, period) row already exists.
async fn insert_report(conn: &Connection, report: &NewReport) -> Result<Option<i64>, DomainError> {
    let metrics = serde_json::to_string(&report.metrics).map_err(repo_err)?;
    let insights = serde_json::to_string(&report.analysis.insights).map_err(repo_err)?;
    let recommendations =
        serde_json::to_string(&report.analysis.recommendations).map_err(repo_err)?;
    query_id(
        conn,
        r#"
        INSERT INTO reports (user_id, account_id, scheduled_report_id, platform, report_type,
                             date_start, date_end, metrics, insights, recommendations, summary,
                             status, sent_to_chat, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, 0, ?13)
        ON CONFLICT (scheduled_report_id, date_start, date_end) DO NOTHING
        RETURNING id
        "#,
        params![
            report.user_id.as_str(),
            report.account_id,
            report.scheduled_report_id,
            report.platform.as_str(),
            report.report_type.as_str(),
            report.date_range.start.to_string(),
            report.date_range.end.to_string(),
            metrics,
            insights,
            recommendations,
            report.analysis.summary.as_str(),
            ReportStatus::Completed.as_str(),
            report.created_at.timestamp(),
        ],
    )
    .await
}

async fn load_report(conn: &Connection, id: i64) -> Result<Report, DomainError> {
    let mut rows = conn
        .query(
            &format!("SELECT {} FROM reports WHERE id = ?1", REPORT_COLUMNS),
            params![id],
        )
        .await
        .map_err(repo_err)?;
    match rows.next().await.map_err(repo_err)? {
        Some(row) => report_from_row(&row),
        None => Err(DomainError::not_found(format!("Report {}", id))),
    }
}

/// SQLite repository. One database file (reports.db) in the given base directory.
pub struct SqliteRepo {
    db: Database,
    db_path: PathBuf,
}

impl SqliteRepo {
    /// Connect to (or create) the SQLite database and ensure the schema exists.
    /// Call this once at startup; the returned repo is safe to share via Arc.
    pub async fn connect(base_dir: impl AsRef<Path>) -> Result<Self, DomainError> {
        let base = base_dir.as_ref();
        std::fs::create_dir_all(base).map_err(repo_err)?;
        let db_path = base.join("reports.db");
        let path_str = db_path.to_string_lossy();
        let db = libsql::Builder::new_local(path_str.as_ref())
            .build()
            .await
            .map_err(repo_err)?;
        let conn = db.connect().map_err(repo_err)?;

        // PRAGMA returns a row; query and drain it (execute fails when rows are returned).
        for pragma in ["PRAGMA journal_mode=WAL", "PRAGMA synchronous=NORMAL"] {
            let mut rows = conn
                .query(pragma, ())
                .await
                .map_err(|e| DomainError::Repo(format!("{} failed: {}", pragma, e)))?;
            while rows.next().await.map_err(repo_err)?.is_some() {}
        }

        for ddl in [
            ACCOUNTS_TABLE,
            SCHEDULES_TABLE,
            SCHEDULES_DUE_INDEX,
            REPORTS_TABLE,
            REPORTS_PERIOD_INDEX,
        ] {
            conn.execute(ddl, ()).await.map_err(repo_err)?;
        }

        info!(path = %db_path.display(), "SQLite connected with WAL mode");

        Ok(Self { db, db_path })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<Connection, DomainError> {
        self.db.connect().map_err(repo_err)
    }

    async fn query_accounts(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<AdAccount>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn.query(sql, params).await.map_err(repo_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            out.push(account_from_row(&row)?);
        }
        Ok(out)
    }

    async fn query_schedules(
        &self,
        sql: &str,
        params: impl libsql::params::IntoParams,
    ) -> Result<Vec<ScheduledReport>, DomainError> {
        let conn = self.conn()?;
        let mut rows = conn.query(sql, params).await.map_err(repo_err)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.map_err(repo_err)? {
            out.push(schedule_from_row(&row)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl AccountRepo for SqliteRepo {
    async fn get_account(&self, id: i64) -> Result<Option<AdAccount>, DomainError> {
        let sql = format!("SELECT {} FROM ad_accounts WHERE id = ?1", ACCOUNT_COLUMNS);
        Ok(self.query_accounts(&sql, params![id]).await?.into_iter().next())
    }

    async fn find_owned_active(
        &self,
        user_id: &str,
        id: i64,
    ) -> Result<Option<AdAccount>, DomainError> {
        let sql = format!(
            "SELECT {} FROM ad_accounts WHERE id = ?1 AND user_id = ?2 AND is_active = 1",
            ACCOUNT_COLUMNS
        );
        Ok(self
            .query_accounts(&sql, params![id, user_id])
            .await?
            .into_iter()
            .next())
    }

    async fn upsert_account(&self, account: NewAdAccount) -> Result<AdAccount, DomainError> {
        let conn = self.conn()?;
        let now = Utc::now().timestamp();
        let metadata = serde_json::to_string(&account.metadata).map_err(repo_err)?;
        let id = query_id(
            &conn,
            r#"
            INSERT INTO ad_accounts (user_id, platform, external_account_id, account_name,
                                     access_token, refresh_token, expires_at, is_active,
                                     metadata, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1, ?8, ?9, ?9)
            ON CONFLICT (user_id, platform, external_account_id) DO UPDATE SET
                account_name = excluded.account_name,
                access_token = excluded.access_token,
                refresh_token = COALESCE(excluded.refresh_token, ad_accounts.refresh_token),
                expires_at = excluded.expires_at,
                is_active = 1,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
            params![
                account.user_id.as_str(),
                account.platform.as_str(),
                account.external_account_id.as_str(),
                account.account_name.as_str(),
                account.access_token,
                account.refresh_token,
                account.expires_at.map(|t| t.timestamp()),
                metadata,
                now,
            ],
        )
        .await?
        .ok_or_else(|| repo_err("account upsert returned no id"))?;

        self.get_account(id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Account {}", id)))
    }

    async fn update_credentials(
        &self,
        id: i64,
        token: &RefreshedToken,
    ) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            r#"
            UPDATE ad_accounts SET
                access_token = ?1,
                refresh_token = COALESCE(?2, refresh_token),
                expires_at = ?3,
                updated_at = ?4
            WHERE id = ?5
            "#,
            params![
                token.access_token.as_str(),
                token.refresh_token.as_deref(),
                token.expires_at.map(|t| t.timestamp()),
                Utc::now().timestamp(),
                id,
            ],
        )
        .await
        .map_err(repo_err)?;
        debug!(account_id = id, "stored refreshed credential");
        Ok(())
    }

    async fn set_active(&self, id: i64, active: bool) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE ad_accounts SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
            params![i64::from(active), Utc::now().timestamp(), id],
        )
        .await
        .map_err(repo_err)?;
        Ok(())
    }

    async fn mark_synced(&self, id: i64, at: DateTime<Utc>) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE ad_accounts SET last_synced_at = ?1 WHERE id = ?2",
            params![at.timestamp(), id],
        )
        .await
        .map_err(repo_err)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl ScheduleRepo for SqliteRepo {
    async fn list_due(&self, cutoff: DateTime<Utc>) -> Result<Vec<ScheduledReport>, DomainError> {
        let sql = format!(
            "SELECT {} FROM scheduled_reports \
             WHERE is_active = 1 AND next_run_at <= ?1 \
             ORDER BY next_run_at ASC, id ASC",
            SCHEDULE_COLUMNS
        );
        self.query_schedules(&sql, params![cutoff.timestamp()]).await
    }

    async fn upsert_schedule(
        &self,
        schedule: NewSchedule,
    ) -> Result<ScheduledReport, DomainError> {
        let conn = self.conn()?;
        let now = Utc::now().timestamp();
        let id = query_id(
            &conn,
            r#"
            INSERT INTO scheduled_reports (user_id, account_id, platform, frequency, day_of_week,
                                           day_of_month, chat_room_id, chat_api_token, is_active,
                                           next_run_at, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?10, ?10)
            ON CONFLICT (user_id, account_id) DO UPDATE SET
                platform = excluded.platform,
                frequency = excluded.frequency,
                day_of_week = excluded.day_of_week,
                day_of_month = excluded.day_of_month,
                chat_room_id = excluded.chat_room_id,
                chat_api_token = excluded.chat_api_token,
                is_active = 1,
                next_run_at = excluded.next_run_at,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
            params![
                schedule.user_id.as_str(),
                schedule.account_id,
                schedule.platform.as_str(),
                schedule.frequency.as_str(),
                schedule.day_of_week.map(i64::from),
                schedule.day_of_month.map(i64::from),
                schedule.chat_room_id,
                schedule.chat_api_token,
                schedule.next_run_at.timestamp(),
                now,
            ],
        )
        .await?
        .ok_or_else(|| repo_err("schedule upsert returned no id"))?;

        self.find_owned(&schedule.user_id, id)
            .await?
            .ok_or_else(|| DomainError::not_found(format!("Schedule {}", id)))
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        account_id: Option<i64>,
    ) -> Result<Vec<ScheduledReport>, DomainError> {
        let sql = format!(
            "SELECT {} FROM scheduled_reports \
             WHERE user_id = ?1 AND is_active = 1 AND (?2 IS NULL OR account_id = ?2) \
             ORDER BY next_run_at ASC, id ASC",
            SCHEDULE_COLUMNS
        );
        self.query_schedules(&sql, params![user_id, account_id]).await
    }

    async fn find_owned(
        &self,
        user_id: &str,
        id: i64,
    ) -> Result<Option<ScheduledReport>, DomainError> {
        let sql = format!(
            "SELECT {} FROM scheduled_reports WHERE id = ?1 AND user_id = ?2",
            SCHEDULE_COLUMNS
        );
        Ok(self
            .query_schedules(&sql, params![id, user_id])
            .await?
            .into_iter()
            .next())
    }

    async fn delete_schedule(&self, id: i64) -> Result<(), DomainError> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM scheduled_reports WHERE id = ?1", params![id])
            .await
            .map_err(repo_err)?;
        if changed == 0 {
            return Err(DomainError::not_found(format!("Schedule {}", id)));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReportRepo for SqliteRepo {
    async fn create_report(&self, report: NewReport) -> Result<Report, DomainError> {
        let conn = self.conn()?;
        let id = insert_report(&conn, &report)
            .await?
            .ok_or_else(|| repo_err("report insert returned no id"))?;
        load_report(&conn, id).await
    }

    async fn complete_scheduled_run(
        &self,
        report: NewReport,
        schedule_id: i64,
        ran_at: DateTime<Utc>,
        next_run_at: DateTime<Utc>,
    ) -> Result<Report, DomainError> {
        let conn = self.conn()?;
        let tx = conn.transaction().await.map_err(repo_err)?;

        let id = match insert_report(&tx, &report).await? {
            Some(id) => id,
            None => {
                debug!(schedule_id, "report for this period already exists");
                query_id(
                    &tx,
                    "SELECT id FROM reports \
                     WHERE scheduled_report_id = ?1 AND date_start = ?2 AND date_end = ?3",
                    params![
                        schedule_id,
                        report.date_range.start.to_string(),
                        report.date_range.end.to_string(),
                    ],
                )
                .await?
                .ok_or_else(|| repo_err("conflicting report row not found"))?
            }
        };

        tx.execute(
            "UPDATE scheduled_reports SET last_run_at = ?1, next_run_at = ?2, updated_at = ?1 \
             WHERE id = ?3",
            params![ran_at.timestamp(), next_run_at.timestamp(), schedule_id],
        )
        .await
        .map_err(repo_err)?;

        tx.commit().await.map_err(repo_err)?;
        load_report(&conn, id).await
    }

    async fn mark_delivered(&self, report_id: i64, room_id: &str) -> Result<(), DomainError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE reports SET sent_to_chat = 1, chat_room_id = ?1 WHERE id = ?2",
            params![room_id, report_id],
        )
        .await
        .map_err(repo_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::metrics::empty;
    use crate::domain::{AnalysisResult, Platform};
    use chrono::{TimeDelta, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    static COUNTER: AtomicUsize = AtomicUsize::new(0);

    async fn temp_repo() -> SqliteRepo {
        let dir = std::env::temp_dir().join(format!(
            "adreport-sqlite-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::SeqCst)
        ));
        let _ = std::fs::remove_dir_all(&dir);
        SqliteRepo::connect(&dir).await.unwrap()
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 11, h, 0, 0).unwrap()
    }

    fn new_account(user: &str, external: &str) -> NewAdAccount {
        NewAdAccount {
            user_id: user.into(),
            platform: Platform::Meta,
            external_account_id: external.into(),
            account_name: "Shop".into(),
            access_token: Some("token".into()),
            refresh_token: Some("refresh".into()),
            expires_at: None,
            metadata: serde_json::json!({"currency": "JPY"}),
        }
    }

    fn new_schedule(user: &str, account_id: i64, next: DateTime<Utc>) -> NewSchedule {
        NewSchedule {
            user_id: user.into(),
            account_id,
            platform: Platform::Meta,
            frequency: Frequency::Weekly,
            day_of_week: Some(1),
            day_of_month: None,
            chat_room_id: Some("room".into()),
            chat_api_token: Some("secret".into()),
            next_run_at: next,
        }
    }

    fn new_report(user: &str, account_id: i64, schedule_id: Option<i64>) -> NewReport {
        NewReport {
            user_id: user.into(),
            account_id,
            scheduled_report_id: schedule_id,
            platform: Platform::Meta,
            report_type: Frequency::Weekly,
            date_range: DateRange::trailing(Frequency::Weekly, at(0).date_naive()),
            metrics: empty(Platform::Meta),
            analysis: AnalysisResult {
                summary: "s".into(),
                insights: vec!["i".into()],
                recommendations: vec!["r1".into(), "r2".into()],
            },
            created_at: at(0),
        }
    }

    #[tokio::test]
    async fn account_upsert_is_unique_per_owner_platform_external_id() {
        let repo = temp_repo().await;
        let first = repo.upsert_account(new_account("u1", "act_1")).await.unwrap();
        let mut relink = new_account("u1", "act_1");
        relink.access_token = Some("rotated".into());
        relink.refresh_token = None;
        let second = repo.upsert_account(relink).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.access_token.as_deref(), Some("rotated"));
        assert_eq!(second.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(second.currency().as_deref(), Some("JPY"));

        let other = repo.upsert_account(new_account("u2", "act_1")).await.unwrap();
        assert_ne!(other.id, first.id);
    }

    #[tokio::test]
    async fn owned_active_lookup_respects_owner_and_flag() {
        let repo = temp_repo().await;
        let account = repo.upsert_account(new_account("u1", "act_1")).await.unwrap();
        assert!(repo.find_owned_active("u1", account.id).await.unwrap().is_some());
        assert!(repo.find_owned_active("u2", account.id).await.unwrap().is_none());
        repo.set_active(account.id, false).await.unwrap();
        assert!(repo.find_owned_active("u1", account.id).await.unwrap().is_none());
        assert!(!repo.get_account(account.id).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn refreshed_credentials_are_persisted() {
        let repo = temp_repo().await;
        let account = repo.upsert_account(new_account("u1", "act_1")).await.unwrap();
        let token = RefreshedToken {
            access_token: "new".into(),
            refresh_token: None,
            expires_at: Some(at(10)),
        };
        repo.update_credentials(account.id, &token).await.unwrap();
        repo.mark_synced(account.id, at(9)).await.unwrap();
        let stored = repo.get_account(account.id).await.unwrap().unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("new"));
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh"));
        assert_eq!(stored.expires_at, Some(at(10)));
        assert_eq!(stored.last_synced_at, Some(at(9)));
    }

    #[tokio::test]
    async fn schedule_upsert_updates_existing_pair() {
        let repo = temp_repo().await;
        let account = repo.upsert_account(new_account("u1", "act_1")).await.unwrap();
        let first = repo
            .upsert_schedule(new_schedule("u1", account.id, at(9)))
            .await
            .unwrap();
        let mut monthly = new_schedule("u1", account.id, at(12));
        monthly.frequency = Frequency::Monthly;
        monthly.day_of_week = None;
        monthly.day_of_month = Some(15);
        let second = repo.upsert_schedule(monthly).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.frequency, Frequency::Monthly);
        assert_eq!(second.day_of_month, Some(15));
        assert_eq!(second.day_of_week, None);
        assert_eq!(repo.list_for_user("u1", None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn due_selection_uses_cutoff_and_order() {
        let repo = temp_repo().await;
        let a = repo.upsert_account(new_account("u1", "a")).await.unwrap();
        let b = repo.upsert_account(new_account("u1", "b")).await.unwrap();
        let c = repo.upsert_account(new_account("u1", "c")).await.unwrap();
        let late = repo.upsert_schedule(new_schedule("u1", a.id, at(10))).await.unwrap();
        let early = repo.upsert_schedule(new_schedule("u1", b.id, at(8))).await.unwrap();
        repo.upsert_schedule(new_schedule("u1", c.id, at(12))).await.unwrap();

        let due = repo.list_due(at(10)).await.unwrap();
        let ids: Vec<i64> = due.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![early.id, late.id]);
        assert_eq!(due[0].chat_target(), Some(("room", "secret")));

        let for_b = repo.list_for_user("u1", Some(b.id)).await.unwrap();
        assert_eq!(for_b.len(), 1);
        assert_eq!(for_b[0].id, early.id);
    }

    #[tokio::test]
    async fn delete_is_physical_and_reports_missing() {
        let repo = temp_repo().await;
        let account = repo.upsert_account(new_account("u1", "a")).await.unwrap();
        let s = repo.upsert_schedule(new_schedule("u1", account.id, at(9))).await.unwrap();
        assert!(repo.find_owned("u2", s.id).await.unwrap().is_none());
        repo.delete_schedule(s.id).await.unwrap();
        assert!(repo.find_owned("u1", s.id).await.unwrap().is_none());
        assert!(matches!(
            repo.delete_schedule(s.id).await,
            Err(DomainError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn scheduled_run_is_atomic_and_idempotent() {
        let repo = temp_repo().await;
        let account = repo.upsert_account(new_account("u1", "a")).await.unwrap();
        let s = repo.upsert_schedule(new_schedule("u1", account.id, at(9))).await.unwrap();
        let next = at(9) + TimeDelta::days(7);

        let first = repo
            .complete_scheduled_run(new_report("u1", account.id, Some(s.id)), s.id, at(9), next)
            .await
            .unwrap();
        assert_eq!(first.scheduled_report_id, Some(s.id));
        assert_eq!(first.recommendations, vec!["r1".to_string(), "r2".to_string()]);
        assert_eq!(first.metrics, empty(Platform::Meta));
        assert!(!first.sent_to_chat);

        let stored = repo.find_owned("u1", s.id).await.unwrap().unwrap();
        assert_eq!(stored.last_run_at, Some(at(9)));
        assert_eq!(stored.next_run_at, next);

        let replay = repo
            .complete_scheduled_run(new_report("u1", account.id, Some(s.id)), s.id, at(9), next)
            .await
            .unwrap();
        assert_eq!(replay.id, first.id);
    }

    #[tokio::test]
    async fn on_demand_reports_never_conflict() {
        let repo = temp_repo().await;
        let a = repo.create_report(new_report("u1", 1, None)).await.unwrap();
        let b = repo.create_report(new_report("u1", 1, None)).await.unwrap();
        assert_ne!(a.id, b.id);

        repo.mark_delivered(a.id, "1009").await.unwrap();
        let conn = repo.conn().unwrap();
        let delivered = load_report(&conn, a.id).await.unwrap();
        assert!(delivered.sent_to_chat);
        assert_eq!(delivered.chat_room_id.as_deref(), Some("1009"));
    }
}
