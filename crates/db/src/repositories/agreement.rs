use sqlx::Row;

use docflow_core::domain::agreement::{AgreementId, AgreementOverview, AgreementStatus};

use super::document::{parse_optional_timestamp, parse_timestamp};
use super::{AgreementRepository, RepositoryError};
use crate::DbPool;

pub struct SqlAgreementRepository {
    pool: DbPool,
}

impl SqlAgreementRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub fn agreement_status_as_str(status: AgreementStatus) -> &'static str {
    match status {
        AgreementStatus::Draft => "draft",
        AgreementStatus::PendingHead => "pending_head",
        AgreementStatus::PendingGm => "pending_gm",
        AgreementStatus::PendingFinance => "pending_finance",
        AgreementStatus::PendingLegal => "pending_legal",
        AgreementStatus::PendingDirector1 => "pending_director1",
        AgreementStatus::PendingDirector2 => "pending_director2",
        AgreementStatus::Approved => "approved",
        AgreementStatus::Rejected => "rejected",
    }
}

pub fn parse_agreement_status(s: &str) -> Result<AgreementStatus, RepositoryError> {
    match s {
        "draft" => Ok(AgreementStatus::Draft),
        "pending_head" => Ok(AgreementStatus::PendingHead),
        "pending_gm" => Ok(AgreementStatus::PendingGm),
        "pending_finance" => Ok(AgreementStatus::PendingFinance),
        "pending_legal" => Ok(AgreementStatus::PendingLegal),
        "pending_director1" => Ok(AgreementStatus::PendingDirector1),
        "pending_director2" => Ok(AgreementStatus::PendingDirector2),
        "approved" => Ok(AgreementStatus::Approved),
        "rejected" => Ok(AgreementStatus::Rejected),
        other => Err(RepositoryError::Decode(format!("unknown agreement status `{other}`"))),
    }
}

fn row_to_agreement(row: &sqlx::sqlite::SqliteRow) -> Result<AgreementOverview, RepositoryError> {
    let decode = |e: sqlx::Error| RepositoryError::Decode(e.to_string());

    let status_str: String = row.try_get("status").map_err(decode)?;
    let is_draft: i64 = row.try_get("is_draft").map_err(decode)?;
    let submitted_at: Option<String> = row.try_get("submitted_at").map_err(decode)?;
    let completed_at: Option<String> = row.try_get("completed_at").map_err(decode)?;
    let created_at: String = row.try_get("created_at").map_err(decode)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode)?;

    Ok(AgreementOverview {
        id: AgreementId(row.try_get("id").map_err(decode)?),
        title: row.try_get("title").map_err(decode)?,
        requester_nik: row.try_get("requester_nik").map_err(decode)?,
        counterparty: row.try_get("counterparty").map_err(decode)?,
        division: row.try_get("division").map_err(decode)?,
        directorate: row.try_get("directorate").map_err(decode)?,
        is_draft: is_draft != 0,
        director1_nik: row.try_get("director1_nik").map_err(decode)?,
        director2_nik: row.try_get("director2_nik").map_err(decode)?,
        status: parse_agreement_status(&status_str)?,
        submitted_at: parse_optional_timestamp(submitted_at)?,
        completed_at: parse_optional_timestamp(completed_at)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

const SELECT_COLUMNS: &str = "id, title, requester_nik, counterparty, division, directorate,
                              is_draft, director1_nik, director2_nik, status, submitted_at,
                              completed_at, created_at, updated_at";

#[async_trait::async_trait]
impl AgreementRepository for SqlAgreementRepository {
    async fn find_by_id(
        &self,
        id: &AgreementId,
    ) -> Result<Option<AgreementOverview>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM agreement_overview WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_agreement(r)?)),
            None => Ok(None),
        }
    }

    async fn list_by_status(
        &self,
        status: AgreementStatus,
    ) -> Result<Vec<AgreementOverview>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM agreement_overview
             WHERE status = ? ORDER BY created_at ASC"
        ))
        .bind(agreement_status_as_str(status))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_agreement).collect()
    }

    async fn save(&self, agreement: AgreementOverview) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO agreement_overview (id, title, requester_nik, counterparty, division,
                                             directorate, is_draft, director1_nik, director2_nik,
                                             status, submitted_at, completed_at, created_at,
                                             updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 title = excluded.title,
                 requester_nik = excluded.requester_nik,
                 counterparty = excluded.counterparty,
                 division = excluded.division,
                 directorate = excluded.directorate,
                 is_draft = excluded.is_draft,
                 director1_nik = excluded.director1_nik,
                 director2_nik = excluded.director2_nik,
                 status = excluded.status,
                 submitted_at = excluded.submitted_at,
                 completed_at = excluded.completed_at,
                 updated_at = excluded.updated_at",
        )
        .bind(&agreement.id.0)
        .bind(&agreement.title)
        .bind(&agreement.requester_nik)
        .bind(&agreement.counterparty)
        .bind(&agreement.division)
        .bind(&agreement.directorate)
        .bind(agreement.is_draft as i64)
        .bind(&agreement.director1_nik)
        .bind(&agreement.director2_nik)
        .bind(agreement_status_as_str(agreement.status))
        .bind(agreement.submitted_at.map(|dt| dt.to_rfc3339()))
        .bind(agreement.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(agreement.created_at.to_rfc3339())
        .bind(agreement.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn save_transition(
        &self,
        agreement: AgreementOverview,
        expected: AgreementStatus,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE agreement_overview SET
                 title = ?, counterparty = ?, is_draft = ?, director1_nik = ?, director2_nik = ?,
                 status = ?, submitted_at = ?, completed_at = ?, updated_at = ?
             WHERE id = ? AND status = ?",
        )
        .bind(&agreement.title)
        .bind(&agreement.counterparty)
        .bind(agreement.is_draft as i64)
        .bind(&agreement.director1_nik)
        .bind(&agreement.director2_nik)
        .bind(agreement_status_as_str(agreement.status))
        .bind(agreement.submitted_at.map(|dt| dt.to_rfc3339()))
        .bind(agreement.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(agreement.updated_at.to_rfc3339())
        .bind(&agreement.id.0)
        .bind(agreement_status_as_str(expected))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict {
                entity: "agreement_overview",
                id: agreement.id.0,
            });
        }
        Ok(())
    }
}
