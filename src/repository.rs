use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};

use crate::{
    error::RepoError,
    lifecycle::WriteGuard,
    models::{
        Alumni, AlumniEmployment, CohortCount, CreateAlumniRequest, CreateEmploymentRequest,
        EmploymentRecord, NewUser, UpdateAlumniRequest, UpdateEmploymentRequest, User,
        UserCredentials,
    },
    pagination::{ListQuery, contains_pattern},
};

/// Repository Trait
///
/// The storage capability. Handlers and the lifecycle guard only ever talk to
/// this trait, so tests swap in an in-memory implementation.
///
/// Every method resolves to its value or a `RepoError`; a missing row is
/// `Ok(None)` / `Ok(false)`, never an error.
///
/// **Send + Sync + async_trait** keep `Arc<dyn Repository>` shareable across
/// axum's task boundaries.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i32) -> Result<Option<User>, RepoError>;
    /// Looks the identifier up as username first, then as email.
    async fn find_credentials(&self, identifier: &str) -> Result<Option<UserCredentials>, RepoError>;
    async fn user_exists(&self, username: &str, email: &str) -> Result<bool, RepoError>;
    async fn create_user(&self, user: NewUser) -> Result<User, RepoError>;
    async fn list_users_page(&self, query: &ListQuery) -> Result<Vec<User>, RepoError>;
    async fn count_users(&self, search: &str) -> Result<i64, RepoError>;

    // --- Alumni ---
    async fn list_alumni(&self) -> Result<Vec<Alumni>, RepoError>;
    async fn get_alumni(&self, id: i32) -> Result<Option<Alumni>, RepoError>;
    async fn count_alumni_by_cohort(&self, cohort_year: i32) -> Result<CohortCount, RepoError>;
    /// Alumni joined with their *active* employment records.
    async fn get_alumni_with_employment(&self, id: i32) -> Result<Vec<AlumniEmployment>, RepoError>;
    async fn create_alumni(&self, req: CreateAlumniRequest) -> Result<Alumni, RepoError>;
    async fn update_alumni(&self, id: i32, req: UpdateAlumniRequest) -> Result<Option<Alumni>, RepoError>;
    async fn delete_alumni(&self, id: i32) -> Result<bool, RepoError>;
    async fn list_alumni_page(&self, query: &ListQuery) -> Result<Vec<Alumni>, RepoError>;
    async fn count_alumni(&self, search: &str) -> Result<i64, RepoError>;

    // --- Employment records ---
    /// Active records only.
    async fn list_employment(&self) -> Result<Vec<EmploymentRecord>, RepoError>;
    /// Any state; callers decide what a trashed record means to them.
    async fn get_employment(&self, id: i32) -> Result<Option<EmploymentRecord>, RepoError>;
    /// Active records of one alumni.
    async fn list_employment_by_alumni(&self, alumni_id: i32) -> Result<Vec<EmploymentRecord>, RepoError>;
    async fn create_employment(&self, req: CreateEmploymentRequest) -> Result<EmploymentRecord, RepoError>;

    // Guarded writes. Each is a single conditional statement whose filter
    // encodes the guard, so `None`/`false` means the guard did not hold at
    // write time (record gone, owner mismatch or wrong trash state).
    async fn update_employment(
        &self,
        guard: &WriteGuard,
        changes: UpdateEmploymentRequest,
    ) -> Result<Option<EmploymentRecord>, RepoError>;
    async fn soft_delete_employment(
        &self,
        guard: &WriteGuard,
        deleted_by: i32,
    ) -> Result<Option<EmploymentRecord>, RepoError>;
    async fn restore_employment(&self, guard: &WriteGuard) -> Result<Option<EmploymentRecord>, RepoError>;
    async fn hard_delete_employment(&self, guard: &WriteGuard) -> Result<bool, RepoError>;

    /// Trashed records, optionally restricted to one owner.
    async fn list_trash(&self, owner: Option<i32>) -> Result<Vec<EmploymentRecord>, RepoError>;
    async fn list_employment_page(&self, query: &ListQuery) -> Result<Vec<EmploymentRecord>, RepoError>;
    async fn count_employment(&self, search: &str) -> Result<i64, RepoError>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str = "id, alumni_id, username, email, role, created_at";

const ALUMNI_COLUMNS: &str = "id, student_number, name, department, cohort_year, graduation_year, \
     email, phone, address, created_at, updated_at";

const EMPLOYMENT_COLUMNS: &str = "id, alumni_id, company, position, industry, location, salary_range, \
     start_date, end_date, employment_status, description, created_at, updated_at, \
     is_deleted, deleted_at, deleted_by";

/// Filter shared by every guarded write: `$1` id, `$2` owner, `$3` trash state.
const GUARD_FILTER: &str = "id = $1 \
     AND ($2::int4 IS NULL OR alumni_id = $2) \
     AND ($3::bool IS NULL OR is_deleted = $3)";

/// PostgresRepository
///
/// `Repository` backed by PostgreSQL. Each round trip is bounded by
/// `timeout`; an expired call is abandoned and reported as
/// `RepoError::Timeout`, and since every write is one statement nothing is
/// left half-applied.
pub struct PostgresRepository {
    pool: PgPool,
    timeout: Duration,
}

impl PostgresRepository {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// bounded
    ///
    /// Runs one storage future under the configured timeout, logging and
    /// classifying any failure.
    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, RepoError>
    where
        F: Future<Output = Result<T, sqlx::Error>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!(op, error = ?e, "storage call failed");
                Err(RepoError::classify(e))
            }
            Err(_) => {
                tracing::error!(op, timeout_ms = self.timeout.as_millis() as u64, "storage call timed out");
                Err(RepoError::Timeout { op })
            }
        }
    }
}

/// Appends `<clause> (col ILIKE $n ESCAPE '\' OR ...)` for a non-empty search
/// term. `clause` is `WHERE` or `AND` depending on what the query already
/// carries. The term matches literally: `%`, `_` and `\` are escaped.
fn push_search(builder: &mut QueryBuilder<'_, Postgres>, clause: &str, columns: &[&str], search: &str) {
    if search.is_empty() {
        return;
    }
    let pattern = contains_pattern(search);
    builder.push(format!(" {clause} ("));
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            builder.push(" OR ");
        }
        builder.push(*column);
        builder.push(" ILIKE ");
        builder.push_bind(pattern.clone());
        builder.push(r" ESCAPE '\'");
    }
    builder.push(")");
}

/// `ORDER BY <whitelisted column> <ASC|DESC> LIMIT $n OFFSET $m`.
fn push_page(builder: &mut QueryBuilder<'_, Postgres>, query: &ListQuery) {
    builder.push(" ORDER BY ");
    builder.push(query.sort_by);
    builder.push(" ");
    builder.push(query.order.as_sql());
    builder.push(" LIMIT ");
    builder.push_bind(query.limit);
    builder.push(" OFFSET ");
    builder.push_bind(query.offset);
}

const USER_SEARCH: &[&str] = &["username", "email"];
const ALUMNI_SEARCH: &[&str] = &["name", "student_number", "department"];
const EMPLOYMENT_SEARCH: &[&str] = &["company", "position"];

#[async_trait]
impl Repository for PostgresRepository {
    // --- Users ---

    async fn get_user(&self, id: i32) -> Result<Option<User>, RepoError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        self.bounded(
            "get_user",
            sqlx::query_as::<_, User>(&sql).bind(id).fetch_optional(&self.pool),
        )
        .await
    }

    /// find_credentials
    ///
    /// Username match wins over an email match when both exist.
    async fn find_credentials(&self, identifier: &str) -> Result<Option<UserCredentials>, RepoError> {
        let sql = format!(
            "SELECT {USER_COLUMNS}, password_hash FROM users \
             WHERE username = $1 OR email = $1 \
             ORDER BY (username = $1) DESC LIMIT 1"
        );
        self.bounded(
            "find_credentials",
            sqlx::query_as::<_, UserCredentials>(&sql)
                .bind(identifier)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn user_exists(&self, username: &str, email: &str) -> Result<bool, RepoError> {
        self.bounded(
            "user_exists",
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)",
            )
            .bind(username)
            .bind(email)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        let sql = format!(
            "INSERT INTO users (username, email, password_hash, role, alumni_id) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        self.bounded(
            "create_user",
            sqlx::query_as::<_, User>(&sql)
                .bind(user.username)
                .bind(user.email)
                .bind(user.password_hash)
                .bind(user.role.as_str())
                .bind(user.alumni_id)
                .fetch_one(&self.pool),
        )
        .await
    }

    async fn list_users_page(&self, query: &ListQuery) -> Result<Vec<User>, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        push_search(&mut builder, "WHERE", USER_SEARCH, &query.search);
        push_page(&mut builder, query);
        self.bounded(
            "list_users_page",
            builder.build_query_as::<User>().fetch_all(&self.pool),
        )
        .await
    }

    async fn count_users(&self, search: &str) -> Result<i64, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM users");
        push_search(&mut builder, "WHERE", USER_SEARCH, search);
        self.bounded(
            "count_users",
            builder.build_query_scalar::<i64>().fetch_one(&self.pool),
        )
        .await
    }

    // --- Alumni ---

    async fn list_alumni(&self) -> Result<Vec<Alumni>, RepoError> {
        let sql = format!("SELECT {ALUMNI_COLUMNS} FROM alumni ORDER BY created_at DESC");
        self.bounded(
            "list_alumni",
            sqlx::query_as::<_, Alumni>(&sql).fetch_all(&self.pool),
        )
        .await
    }

    async fn get_alumni(&self, id: i32) -> Result<Option<Alumni>, RepoError> {
        let sql = format!("SELECT {ALUMNI_COLUMNS} FROM alumni WHERE id = $1");
        self.bounded(
            "get_alumni",
            sqlx::query_as::<_, Alumni>(&sql).bind(id).fetch_optional(&self.pool),
        )
        .await
    }

    async fn count_alumni_by_cohort(&self, cohort_year: i32) -> Result<CohortCount, RepoError> {
        self.bounded(
            "count_alumni_by_cohort",
            sqlx::query_as::<_, CohortCount>(
                "SELECT $1::int4 AS cohort_year, COUNT(*) AS total FROM alumni WHERE cohort_year = $1",
            )
            .bind(cohort_year)
            .fetch_one(&self.pool),
        )
        .await
    }

    async fn get_alumni_with_employment(&self, id: i32) -> Result<Vec<AlumniEmployment>, RepoError> {
        self.bounded(
            "get_alumni_with_employment",
            sqlx::query_as::<_, AlumniEmployment>(
                r#"
                SELECT a.id AS alumni_id, a.student_number, a.name, a.department,
                       a.cohort_year, a.graduation_year, a.email,
                       p.id AS employment_id, p.company, p.position, p.start_date, p.end_date
                FROM alumni a
                JOIN pekerjaan_alumni p ON p.alumni_id = a.id AND p.is_deleted = FALSE
                WHERE a.id = $1
                ORDER BY p.start_date DESC
                "#,
            )
            .bind(id)
            .fetch_all(&self.pool),
        )
        .await
    }

    async fn create_alumni(&self, req: CreateAlumniRequest) -> Result<Alumni, RepoError> {
        let sql = format!(
            "INSERT INTO alumni (student_number, name, department, cohort_year, graduation_year, \
             email, phone, address) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {ALUMNI_COLUMNS}"
        );
        self.bounded(
            "create_alumni",
            sqlx::query_as::<_, Alumni>(&sql)
                .bind(req.student_number.trim().to_string())
                .bind(req.name.trim().to_string())
                .bind(req.department.trim().to_string())
                .bind(req.cohort_year)
                .bind(req.graduation_year)
                .bind(req.email.trim().to_string())
                .bind(req.phone)
                .bind(req.address)
                .fetch_one(&self.pool),
        )
        .await
    }

    /// update_alumni
    ///
    /// `COALESCE` keeps the stored value for every field the request omits.
    async fn update_alumni(&self, id: i32, req: UpdateAlumniRequest) -> Result<Option<Alumni>, RepoError> {
        let sql = format!(
            r#"
            UPDATE alumni
            SET name = COALESCE($2, name),
                department = COALESCE($3, department),
                cohort_year = COALESCE($4, cohort_year),
                graduation_year = COALESCE($5, graduation_year),
                email = COALESCE($6, email),
                phone = COALESCE($7, phone),
                address = COALESCE($8, address),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {ALUMNI_COLUMNS}
            "#
        );
        self.bounded(
            "update_alumni",
            sqlx::query_as::<_, Alumni>(&sql)
                .bind(id)
                .bind(req.name)
                .bind(req.department)
                .bind(req.cohort_year)
                .bind(req.graduation_year)
                .bind(req.email)
                .bind(req.phone)
                .bind(req.address)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn delete_alumni(&self, id: i32) -> Result<bool, RepoError> {
        let result = self
            .bounded(
                "delete_alumni",
                sqlx::query("DELETE FROM alumni WHERE id = $1").bind(id).execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_alumni_page(&self, query: &ListQuery) -> Result<Vec<Alumni>, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ALUMNI_COLUMNS} FROM alumni"));
        push_search(&mut builder, "WHERE", ALUMNI_SEARCH, &query.search);
        push_page(&mut builder, query);
        self.bounded(
            "list_alumni_page",
            builder.build_query_as::<Alumni>().fetch_all(&self.pool),
        )
        .await
    }

    async fn count_alumni(&self, search: &str) -> Result<i64, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("SELECT COUNT(*) FROM alumni");
        push_search(&mut builder, "WHERE", ALUMNI_SEARCH, search);
        self.bounded(
            "count_alumni",
            builder.build_query_scalar::<i64>().fetch_one(&self.pool),
        )
        .await
    }

    // --- Employment records ---

    async fn list_employment(&self) -> Result<Vec<EmploymentRecord>, RepoError> {
        let sql = format!(
            "SELECT {EMPLOYMENT_COLUMNS} FROM pekerjaan_alumni \
             WHERE is_deleted = FALSE ORDER BY created_at DESC"
        );
        self.bounded(
            "list_employment",
            sqlx::query_as::<_, EmploymentRecord>(&sql).fetch_all(&self.pool),
        )
        .await
    }

    async fn get_employment(&self, id: i32) -> Result<Option<EmploymentRecord>, RepoError> {
        let sql = format!("SELECT {EMPLOYMENT_COLUMNS} FROM pekerjaan_alumni WHERE id = $1");
        self.bounded(
            "get_employment",
            sqlx::query_as::<_, EmploymentRecord>(&sql)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn list_employment_by_alumni(&self, alumni_id: i32) -> Result<Vec<EmploymentRecord>, RepoError> {
        let sql = format!(
            "SELECT {EMPLOYMENT_COLUMNS} FROM pekerjaan_alumni \
             WHERE alumni_id = $1 AND is_deleted = FALSE ORDER BY start_date DESC"
        );
        self.bounded(
            "list_employment_by_alumni",
            sqlx::query_as::<_, EmploymentRecord>(&sql)
                .bind(alumni_id)
                .fetch_all(&self.pool),
        )
        .await
    }

    /// create_employment
    ///
    /// New records start Active; `start_date` falls back to the current date.
    async fn create_employment(&self, req: CreateEmploymentRequest) -> Result<EmploymentRecord, RepoError> {
        let sql = format!(
            "INSERT INTO pekerjaan_alumni (alumni_id, company, position, industry, location, \
             salary_range, start_date, end_date, employment_status, description) \
             VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, CURRENT_DATE), $8, $9, $10) \
             RETURNING {EMPLOYMENT_COLUMNS}"
        );
        self.bounded(
            "create_employment",
            sqlx::query_as::<_, EmploymentRecord>(&sql)
                .bind(req.alumni_id)
                .bind(req.company.trim().to_string())
                .bind(req.position.trim().to_string())
                .bind(req.industry)
                .bind(req.location)
                .bind(req.salary_range)
                .bind(req.start_date)
                .bind(req.end_date)
                .bind(req.employment_status)
                .bind(req.description)
                .fetch_one(&self.pool),
        )
        .await
    }

    /// update_employment
    ///
    /// Partial update under the guard. `alumni_id` is never written: the owner
    /// is fixed at creation.
    async fn update_employment(
        &self,
        guard: &WriteGuard,
        changes: UpdateEmploymentRequest,
    ) -> Result<Option<EmploymentRecord>, RepoError> {
        let sql = format!(
            r#"
            UPDATE pekerjaan_alumni
            SET company = COALESCE($4, company),
                position = COALESCE($5, position),
                industry = COALESCE($6, industry),
                location = COALESCE($7, location),
                salary_range = COALESCE($8, salary_range),
                start_date = COALESCE($9, start_date),
                end_date = COALESCE($10, end_date),
                employment_status = COALESCE($11, employment_status),
                description = COALESCE($12, description),
                updated_at = NOW()
            WHERE {GUARD_FILTER}
            RETURNING {EMPLOYMENT_COLUMNS}
            "#
        );
        self.bounded(
            "update_employment",
            sqlx::query_as::<_, EmploymentRecord>(&sql)
                .bind(guard.id)
                .bind(guard.owner)
                .bind(guard.trashed)
                .bind(changes.company)
                .bind(changes.position)
                .bind(changes.industry)
                .bind(changes.location)
                .bind(changes.salary_range)
                .bind(changes.start_date)
                .bind(changes.end_date)
                .bind(changes.employment_status)
                .bind(changes.description)
                .fetch_optional(&self.pool),
        )
        .await
    }

    /// soft_delete_employment
    ///
    /// Trash transitions only touch the trash markers; `updated_at` tracks
    /// content edits.
    async fn soft_delete_employment(
        &self,
        guard: &WriteGuard,
        deleted_by: i32,
    ) -> Result<Option<EmploymentRecord>, RepoError> {
        let sql = format!(
            "UPDATE pekerjaan_alumni \
             SET is_deleted = TRUE, deleted_at = NOW(), deleted_by = $4 \
             WHERE {GUARD_FILTER} RETURNING {EMPLOYMENT_COLUMNS}"
        );
        self.bounded(
            "soft_delete_employment",
            sqlx::query_as::<_, EmploymentRecord>(&sql)
                .bind(guard.id)
                .bind(guard.owner)
                .bind(guard.trashed)
                .bind(deleted_by)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn restore_employment(&self, guard: &WriteGuard) -> Result<Option<EmploymentRecord>, RepoError> {
        let sql = format!(
            "UPDATE pekerjaan_alumni \
             SET is_deleted = FALSE, deleted_at = NULL, deleted_by = NULL \
             WHERE {GUARD_FILTER} RETURNING {EMPLOYMENT_COLUMNS}"
        );
        self.bounded(
            "restore_employment",
            sqlx::query_as::<_, EmploymentRecord>(&sql)
                .bind(guard.id)
                .bind(guard.owner)
                .bind(guard.trashed)
                .fetch_optional(&self.pool),
        )
        .await
    }

    async fn hard_delete_employment(&self, guard: &WriteGuard) -> Result<bool, RepoError> {
        let sql = format!("DELETE FROM pekerjaan_alumni WHERE {GUARD_FILTER}");
        let result = self
            .bounded(
                "hard_delete_employment",
                sqlx::query(&sql)
                    .bind(guard.id)
                    .bind(guard.owner)
                    .bind(guard.trashed)
                    .execute(&self.pool),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_trash(&self, owner: Option<i32>) -> Result<Vec<EmploymentRecord>, RepoError> {
        let sql = format!(
            "SELECT {EMPLOYMENT_COLUMNS} FROM pekerjaan_alumni \
             WHERE is_deleted = TRUE AND ($1::int4 IS NULL OR alumni_id = $1) \
             ORDER BY deleted_at DESC"
        );
        self.bounded(
            "list_trash",
            sqlx::query_as::<_, EmploymentRecord>(&sql)
                .bind(owner)
                .fetch_all(&self.pool),
        )
        .await
    }

    async fn list_employment_page(&self, query: &ListQuery) -> Result<Vec<EmploymentRecord>, RepoError> {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {EMPLOYMENT_COLUMNS} FROM pekerjaan_alumni WHERE is_deleted = FALSE"
        ));
        push_search(&mut builder, "AND", EMPLOYMENT_SEARCH, &query.search);
        push_page(&mut builder, query);
        self.bounded(
            "list_employment_page",
            builder.build_query_as::<EmploymentRecord>().fetch_all(&self.pool),
        )
        .await
    }

    async fn count_employment(&self, search: &str) -> Result<i64, RepoError> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM pekerjaan_alumni WHERE is_deleted = FALSE");
        push_search(&mut builder, "AND", EMPLOYMENT_SEARCH, search);
        self.bounded(
            "count_employment",
            builder.build_query_scalar::<i64>().fetch_one(&self.pool),
        )
        .await
    }
}
