//! PostgreSQL store backend.

use crate::consensus::{check_finalizable, plan_confirmation, plan_verdict};
use crate::error::FiscalError;
use crate::models::{
    Direction, NewReport, Report, ReportStatus, Review, Signature, SignatureInput, SignerRole,
    Transaction, VerdictInput, VerdictStatus,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::store::{FiscalStore, VerdictOutcome};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const REPORT_COLUMNS: &str = "report_id, title, competence_period, account_type, status, total_entries, pdf_url, created_utc, updated_utc";
const TRANSACTION_COLUMNS: &str =
    "transaction_id, report_id, entry_index, transaction_date, description, amount, direction";
const REVIEW_COLUMNS: &str = "report_id, transaction_id, user_id, status, observation, diligence_ack, diligence_opened_by, diligence_opened_utc, diligence_opener_name, created_utc, updated_utc";
const SIGNATURE_COLUMNS: &str =
    "signature_id, report_id, user_id, signer_role, display_name, signature_image, created_utc";

/// Statement lines per multi-row INSERT.
const INSERT_CHUNK: usize = 1000;

fn query_failed(action: &str, e: sqlx::Error) -> FiscalError {
    FiscalError::Database(anyhow::anyhow!("Failed to {}: {}", action, e))
}

fn corrupt(column: &str, value: &str) -> FiscalError {
    FiscalError::Database(anyhow::anyhow!("Unexpected {} value '{}'", column, value))
}

#[derive(FromRow)]
struct ReportRow {
    report_id: Uuid,
    title: String,
    competence_period: String,
    account_type: String,
    status: String,
    total_entries: i32,
    pdf_url: Option<String>,
    created_utc: DateTime<Utc>,
    updated_utc: DateTime<Utc>,
}

impl TryFrom<ReportRow> for Report {
    type Error = FiscalError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: ReportStatus::parse(&row.status).ok_or_else(|| corrupt("status", &row.status))?,
            report_id: row.report_id,
            title: row.title,
            competence_period: row.competence_period,
            account_type: row.account_type,
            total_entries: row.total_entries,
            pdf_url: row.pdf_url,
            created_utc: row.created_utc,
            updated_utc: row.updated_utc,
        })
    }
}

#[derive(FromRow)]
struct TransactionRow {
    transaction_id: Uuid,
    report_id: Uuid,
    entry_index: i32,
    transaction_date: NaiveDate,
    description: String,
    amount: Decimal,
    direction: String,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = FiscalError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            direction: Direction::parse(&row.direction)
                .ok_or_else(|| corrupt("direction", &row.direction))?,
            transaction_id: row.transaction_id,
            report_id: row.report_id,
            entry_index: row.entry_index,
            transaction_date: row.transaction_date,
            description: row.description,
            amount: row.amount,
        })
    }
}

#[derive(FromRow)]
struct ReviewRow {
    report_id: Uuid,
    transaction_id: Uuid,
    user_id: String,
    status: String,
    observation: Option<String>,
    diligence_ack: bool,
    diligence_opened_by: Option<String>,
    diligence_opened_utc: Option<DateTime<Utc>>,
    diligence_opener_name: Option<String>,
    created_utc: DateTime<Utc>,
    updated_utc: DateTime<Utc>,
}

impl TryFrom<ReviewRow> for Review {
    type Error = FiscalError;

    fn try_from(row: ReviewRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: VerdictStatus::parse(&row.status).ok_or_else(|| corrupt("status", &row.status))?,
            report_id: row.report_id,
            transaction_id: row.transaction_id,
            user_id: row.user_id,
            observation: row.observation,
            diligence_ack: row.diligence_ack,
            diligence_opened_by: row.diligence_opened_by,
            diligence_opened_utc: row.diligence_opened_utc,
            diligence_opener_name: row.diligence_opener_name,
            created_utc: row.created_utc,
            updated_utc: row.updated_utc,
        })
    }
}

#[derive(FromRow)]
struct SignatureRow {
    signature_id: Uuid,
    report_id: Uuid,
    user_id: String,
    signer_role: String,
    display_name: String,
    signature_image: Vec<u8>,
    created_utc: DateTime<Utc>,
}

impl TryFrom<SignatureRow> for Signature {
    type Error = FiscalError;

    fn try_from(row: SignatureRow) -> Result<Self, Self::Error> {
        Ok(Self {
            role: SignerRole::parse(&row.signer_role)
                .ok_or_else(|| corrupt("signer_role", &row.signer_role))?,
            signature_id: row.signature_id,
            report_id: row.report_id,
            user_id: row.user_id,
            display_name: row.display_name,
            signature_image: row.signature_image,
            created_utc: row.created_utc,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, FiscalError>
where
    T: TryFrom<R, Error = FiscalError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "fiscal-review-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

/// Lock the report row against finalization and status changes for the rest
/// of the transaction and reject writes against a finished or locked report.
async fn lock_writable_report(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    report_id: Uuid,
) -> Result<(), FiscalError> {
    let status = sqlx::query_scalar::<_, String>(
        "SELECT status FROM reports WHERE report_id = $1 FOR SHARE",
    )
    .bind(report_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| query_failed("lock report", e))?;

    match status.as_deref() {
        None => Err(FiscalError::ReportNotFound(report_id)),
        Some("finished") => Err(FiscalError::ReportImmutable(report_id)),
        Some("locked") => Err(FiscalError::ReportLocked(report_id)),
        Some(_) => Ok(()),
    }
}

/// Serialize review writes on one transaction by locking its ledger line.
async fn lock_transaction(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    report_id: Uuid,
    transaction_id: Uuid,
) -> Result<(), FiscalError> {
    let found = sqlx::query_scalar::<_, Uuid>(
        "SELECT transaction_id FROM report_transactions WHERE transaction_id = $1 AND report_id = $2 FOR UPDATE",
    )
    .bind(transaction_id)
    .bind(report_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| query_failed("lock transaction", e))?;

    found.map(|_| ()).ok_or(FiscalError::TransactionNotInReport {
        report_id,
        transaction_id,
    })
}

async fn fetch_review(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    report_id: Uuid,
    transaction_id: Uuid,
    user_id: &str,
) -> Result<Option<Review>, FiscalError> {
    sqlx::query_as::<_, ReviewRow>(&format!(
        "SELECT {} FROM transaction_reviews WHERE report_id = $1 AND transaction_id = $2 AND user_id = $3",
        REVIEW_COLUMNS
    ))
    .bind(report_id)
    .bind(transaction_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| query_failed("fetch review", e))?
    .map(Review::try_from)
    .transpose()
}

async fn upsert_review(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    review: &Review,
) -> Result<Review, FiscalError> {
    let row = sqlx::query_as::<_, ReviewRow>(&format!(
        r#"
        INSERT INTO transaction_reviews ({cols})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (report_id, transaction_id, user_id) DO UPDATE SET
            status = EXCLUDED.status,
            observation = EXCLUDED.observation,
            diligence_ack = EXCLUDED.diligence_ack,
            diligence_opened_by = EXCLUDED.diligence_opened_by,
            diligence_opened_utc = EXCLUDED.diligence_opened_utc,
            diligence_opener_name = EXCLUDED.diligence_opener_name,
            updated_utc = EXCLUDED.updated_utc
        RETURNING {cols}
        "#,
        cols = REVIEW_COLUMNS
    ))
    .bind(review.report_id)
    .bind(review.transaction_id)
    .bind(&review.user_id)
    .bind(review.status.as_str())
    .bind(&review.observation)
    .bind(review.diligence_ack)
    .bind(&review.diligence_opened_by)
    .bind(review.diligence_opened_utc)
    .bind(&review.diligence_opener_name)
    .bind(review.created_utc)
    .bind(review.updated_utc)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| query_failed("upsert review", e))?;

    Review::try_from(row)
}

#[async_trait]
impl FiscalStore for Database {
    #[instrument(skip(self))]
    async fn health_check(&self) -> Result<(), FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("run health check", e))?;

        timer.observe_duration();
        Ok(())
    }

    #[instrument(skip(self, input), fields(lines = input.transactions.len()))]
    async fn create_report(&self, input: &NewReport) -> Result<(Report, Vec<Transaction>), FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_report"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("begin transaction", e))?;

        let report_id = Uuid::new_v4();
        let row = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            INSERT INTO reports (report_id, title, competence_period, account_type, status, total_entries)
            VALUES ($1, $2, $3, $4, 'open', $5)
            RETURNING {}
            "#,
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .bind(&input.title)
        .bind(&input.competence_period)
        .bind(&input.account_type)
        .bind(input.transactions.len() as i32)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| query_failed("create report", e))?;
        let report = Report::try_from(row)?;

        let mut transactions = Vec::with_capacity(input.transactions.len());
        for (chunk_index, chunk) in input.transactions.chunks(INSERT_CHUNK).enumerate() {
            let offset = chunk_index * INSERT_CHUNK;
            let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO report_transactions (transaction_id, report_id, entry_index, transaction_date, description, amount, direction) ",
            );
            builder.push_values(chunk.iter().enumerate(), |mut b, (i, line)| {
                b.push_bind(Uuid::new_v4())
                    .push_bind(report_id)
                    .push_bind((offset + i) as i32)
                    .push_bind(line.transaction_date)
                    .push_bind(&line.description)
                    .push_bind(line.amount)
                    .push_bind(line.direction.as_str());
            });
            builder.push(format!(" RETURNING {}", TRANSACTION_COLUMNS));

            let rows = builder
                .build_query_as::<TransactionRow>()
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| query_failed("insert transactions", e))?;
            transactions.extend(convert_all::<_, Transaction>(rows)?);
        }
        transactions.sort_by_key(|t| t.entry_index);

        tx.commit()
            .await
            .map_err(|e| query_failed("commit transaction", e))?;

        timer.observe_duration();
        info!(report_id = %report.report_id, lines = transactions.len(), "Report created");

        Ok((report, transactions))
    }

    #[instrument(skip(self), fields(report_id = %report_id))]
    async fn get_report(&self, report_id: Uuid) -> Result<Option<Report>, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_report"])
            .start_timer();

        let row = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {} FROM reports WHERE report_id = $1",
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("get report", e))?;

        timer.observe_duration();
        row.map(Report::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list_reports(&self, status: Option<ReportStatus>) -> Result<Vec<Report>, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_reports"])
            .start_timer();

        let rows = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            SELECT {} FROM reports
            WHERE ($1::varchar IS NULL OR status = $1)
            ORDER BY created_utc DESC, report_id
            "#,
            REPORT_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list reports", e))?;

        timer.observe_duration();
        convert_all(rows)
    }

    #[instrument(skip(self), fields(report_id = %report_id, status = %status))]
    async fn update_report_status(
        &self,
        report_id: Uuid,
        status: ReportStatus,
    ) -> Result<Option<Report>, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_report_status"])
            .start_timer();

        let row = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            UPDATE reports SET status = $2, updated_utc = NOW()
            WHERE report_id = $1 AND status <> 'finished'
            RETURNING {}
            "#,
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_failed("update report status", e))?;

        if row.is_none() {
            let exists = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM reports WHERE report_id = $1)",
            )
            .bind(report_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| query_failed("check report", e))?;

            if exists {
                return Err(FiscalError::ReportImmutable(report_id));
            }
        }

        timer.observe_duration();
        row.map(Report::try_from).transpose()
    }

    #[instrument(skip(self), fields(report_id = %report_id))]
    async fn delete_report(&self, report_id: Uuid) -> Result<bool, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_report"])
            .start_timer();

        let result = sqlx::query("DELETE FROM reports WHERE report_id = $1")
            .bind(report_id)
            .execute(&self.pool)
            .await
            .map_err(|e| query_failed("delete report", e))?;

        timer.observe_duration();
        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), fields(report_id = %report_id))]
    async fn list_transactions(&self, report_id: Uuid) -> Result<Vec<Transaction>, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_transactions"])
            .start_timer();

        let rows = sqlx::query_as::<_, TransactionRow>(&format!(
            "SELECT {} FROM report_transactions WHERE report_id = $1 ORDER BY entry_index",
            TRANSACTION_COLUMNS
        ))
        .bind(report_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list transactions", e))?;

        timer.observe_duration();
        convert_all(rows)
    }

    #[instrument(skip(self), fields(report_id = %report_id))]
    async fn list_reviews(
        &self,
        report_id: Uuid,
        transaction_id: Option<Uuid>,
    ) -> Result<Vec<Review>, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_reviews"])
            .start_timer();

        let rows = sqlx::query_as::<_, ReviewRow>(&format!(
            r#"
            SELECT {} FROM transaction_reviews
            WHERE report_id = $1 AND ($2::uuid IS NULL OR transaction_id = $2)
            ORDER BY transaction_id, user_id
            "#,
            REVIEW_COLUMNS
        ))
        .bind(report_id)
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list reviews", e))?;

        timer.observe_duration();
        convert_all(rows)
    }

    #[instrument(
        skip(self, input),
        fields(report_id = %input.report_id, transaction_id = %input.transaction_id, status = input.status.as_str())
    )]
    async fn record_verdict(&self, input: &VerdictInput) -> Result<VerdictOutcome, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_verdict"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("begin transaction", e))?;

        lock_writable_report(&mut tx, input.report_id).await?;
        lock_transaction(&mut tx, input.report_id, input.transaction_id).await?;

        let existing =
            fetch_review(&mut tx, input.report_id, input.transaction_id, &input.user_id).await?;
        let plan = plan_verdict(existing.as_ref(), input, Utc::now());
        let review = upsert_review(&mut tx, &plan.review).await?;

        let mut acks_reset = 0;
        if plan.resets_other_acks() {
            acks_reset = sqlx::query(
                r#"
                UPDATE transaction_reviews SET diligence_ack = FALSE, updated_utc = NOW()
                WHERE report_id = $1 AND transaction_id = $2 AND user_id <> $3 AND diligence_ack
                "#,
            )
            .bind(input.report_id)
            .bind(input.transaction_id)
            .bind(&input.user_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| query_failed("reset acknowledgements", e))?
            .rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| query_failed("commit transaction", e))?;

        timer.observe_duration();

        Ok(VerdictOutcome {
            review,
            opened_diligence: plan.opens_diligence,
            acks_reset,
        })
    }

    #[instrument(skip(self), fields(report_id = %report_id, transaction_id = %transaction_id))]
    async fn confirm_diligence(
        &self,
        report_id: Uuid,
        transaction_id: Uuid,
        user_id: &str,
    ) -> Result<Review, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["confirm_diligence"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("begin transaction", e))?;

        lock_writable_report(&mut tx, report_id).await?;
        lock_transaction(&mut tx, report_id, transaction_id).await?;

        let existing = fetch_review(&mut tx, report_id, transaction_id, user_id).await?;
        let planned = plan_confirmation(existing.as_ref(), report_id, transaction_id, user_id, Utc::now());
        let review = upsert_review(&mut tx, &planned).await?;

        tx.commit()
            .await
            .map_err(|e| query_failed("commit transaction", e))?;

        timer.observe_duration();
        Ok(review)
    }

    #[instrument(skip(self, input), fields(report_id = %input.report_id, role = input.role.as_str()))]
    async fn insert_signature(&self, input: &SignatureInput) -> Result<Signature, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["insert_signature"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("begin transaction", e))?;

        lock_writable_report(&mut tx, input.report_id).await?;

        let row = sqlx::query_as::<_, SignatureRow>(&format!(
            r#"
            INSERT INTO report_signatures (signature_id, report_id, user_id, signer_role, display_name, signature_image)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            SIGNATURE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(input.report_id)
        .bind(&input.user_id)
        .bind(input.role.as_str())
        .bind(&input.display_name)
        .bind(&input.signature_image)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                FiscalError::DuplicateSignature {
                    report_id: input.report_id,
                    user_id: input.user_id.clone(),
                }
            }
            _ => query_failed("insert signature", e),
        })?;

        tx.commit()
            .await
            .map_err(|e| query_failed("commit transaction", e))?;

        timer.observe_duration();
        Signature::try_from(row)
    }

    #[instrument(skip(self), fields(report_id = %report_id))]
    async fn list_signatures(
        &self,
        report_id: Uuid,
        role: Option<SignerRole>,
    ) -> Result<Vec<Signature>, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_signatures"])
            .start_timer();

        let rows = sqlx::query_as::<_, SignatureRow>(&format!(
            r#"
            SELECT {} FROM report_signatures
            WHERE report_id = $1 AND ($2::varchar IS NULL OR signer_role = $2)
            ORDER BY created_utc, signature_id
            "#,
            SIGNATURE_COLUMNS
        ))
        .bind(report_id)
        .bind(role.map(|r| r.as_str()))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_failed("list signatures", e))?;

        timer.observe_duration();
        convert_all(rows)
    }

    #[instrument(skip(self, pdf_url), fields(report_id = %report_id))]
    async fn mark_finalized(&self, report_id: Uuid, pdf_url: &str) -> Result<Report, FiscalError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_finalized"])
            .start_timer();

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| query_failed("begin transaction", e))?;

        // Blocks verdict, confirmation, signature and status writes until commit.
        let report = sqlx::query_as::<_, ReportRow>(&format!(
            "SELECT {} FROM reports WHERE report_id = $1 FOR UPDATE",
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| query_failed("lock report", e))?
        .map(Report::try_from)
        .transpose()?
        .ok_or(FiscalError::ReportNotFound(report_id))?;

        let reviews = sqlx::query_as::<_, ReviewRow>(&format!(
            "SELECT {} FROM transaction_reviews WHERE report_id = $1",
            REVIEW_COLUMNS
        ))
        .bind(report_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| query_failed("load reviews", e))?;
        let signatures = sqlx::query_as::<_, SignatureRow>(&format!(
            "SELECT {} FROM report_signatures WHERE report_id = $1",
            SIGNATURE_COLUMNS
        ))
        .bind(report_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| query_failed("load signatures", e))?;

        check_finalizable(&report, &convert_all(reviews)?, &convert_all(signatures)?)?;

        let row = sqlx::query_as::<_, ReportRow>(&format!(
            r#"
            UPDATE reports SET status = 'finished', pdf_url = $2, updated_utc = NOW()
            WHERE report_id = $1
            RETURNING {}
            "#,
            REPORT_COLUMNS
        ))
        .bind(report_id)
        .bind(pdf_url)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| query_failed("finalize report", e))?;

        tx.commit()
            .await
            .map_err(|e| query_failed("commit transaction", e))?;

        timer.observe_duration();
        Report::try_from(row)
    }
}
