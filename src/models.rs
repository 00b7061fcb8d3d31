use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

// --- Identity ---

/// Role
///
/// The closed set of roles a user can hold. Stored as lowercase text in
/// `users.role` and carried in the session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn is_admin(self) -> bool {
        self == Role::Admin
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownRole;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// User
///
/// A row of the `users` table without its credential. `alumni_id` links an
/// account to the alumni whose employment records it may manage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: i32,
    pub alumni_id: Option<i32>,
    pub username: String,
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// UserCredentials
///
/// Internal login row: the user plus the stored password hash. Never serialized.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    #[sqlx(flatten)]
    pub user: User,
    pub password_hash: String,
}

/// NewUser
///
/// A validated account ready for insertion (password already hashed).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    /// Alumni the account manages. Must reference an existing alumni.
    pub alumni_id: Option<i32>,
}

// --- Alumni ---

/// Alumni
///
/// Reference entity from the `alumni` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Alumni {
    pub id: i32,
    pub student_number: String,
    pub name: String,
    pub department: String,
    pub cohort_year: i32,
    pub graduation_year: i32,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// CohortCount
///
/// Number of alumni in one cohort (entry) year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct CohortCount {
    pub cohort_year: i32,
    pub total: i64,
}

/// AlumniEmployment
///
/// One alumni joined with one of their active employment records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct AlumniEmployment {
    pub alumni_id: i32,
    pub student_number: String,
    pub name: String,
    pub department: String,
    pub cohort_year: i32,
    pub graduation_year: i32,
    pub email: String,
    pub employment_id: i32,
    pub company: String,
    pub position: String,
    #[ts(type = "string")]
    pub start_date: NaiveDate,
    #[ts(type = "string | null")]
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct CreateAlumniRequest {
    pub student_number: String,
    pub name: String,
    pub department: String,
    pub cohort_year: i32,
    pub graduation_year: i32,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl CreateAlumniRequest {
    pub fn validate(&self) -> AppResult<()> {
        if [&self.student_number, &self.name, &self.department, &self.email]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(AppError::Validation(
                "student_number, name, department and email are required".to_string(),
            ));
        }
        if !is_valid_email(&self.email) {
            return Err(AppError::Validation("email format is invalid".to_string()));
        }
        Ok(())
    }
}

/// UpdateAlumniRequest
///
/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateAlumniRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cohort_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graduation_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

impl UpdateAlumniRequest {
    pub fn validate(&self) -> AppResult<()> {
        if let Some(email) = &self.email {
            if !is_valid_email(email) {
                return Err(AppError::Validation("email format is invalid".to_string()));
            }
        }
        if [&self.name, &self.department]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| v.trim().is_empty()))
        {
            return Err(AppError::Validation("name and department cannot be blank".to_string()));
        }
        Ok(())
    }
}

// --- Employment records ---

/// EmploymentRecord
///
/// A row of `pekerjaan_alumni`: one job-history entry of an alumni.
///
/// `is_deleted` carries the trash state. When it is `true`, `deleted_at` and
/// `deleted_by` hold when and by whom the record was trashed; when `false`
/// both are empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct EmploymentRecord {
    pub id: i32,
    /// Owning alumni. Fixed at creation.
    pub alumni_id: i32,
    pub company: String,
    pub position: String,
    pub industry: String,
    pub location: String,
    pub salary_range: Option<String>,
    #[ts(type = "string")]
    pub start_date: NaiveDate,
    #[ts(type = "string | null")]
    pub end_date: Option<NaiveDate>,
    pub employment_status: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
    #[ts(type = "string | null")]
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<i32>,
}

/// CreateEmploymentRequest
///
/// Admin-only creation payload. Missing numbers and strings deserialize to
/// zero/empty so the required-field check can report them uniformly.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct CreateEmploymentRequest {
    pub alumni_id: i32,
    pub company: String,
    pub position: String,
    pub industry: String,
    pub location: String,
    pub salary_range: Option<String>,
    /// Defaults to today (UTC) when omitted.
    #[ts(type = "string | null")]
    pub start_date: Option<NaiveDate>,
    #[ts(type = "string | null")]
    pub end_date: Option<NaiveDate>,
    pub employment_status: String,
    pub description: Option<String>,
}

impl CreateEmploymentRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.alumni_id <= 0 || self.company.trim().is_empty() || self.position.trim().is_empty() {
            return Err(AppError::Validation(
                "alumni_id, company and position are required".to_string(),
            ));
        }
        check_date_range(self.start_date, self.end_date)
    }
}

/// UpdateEmploymentRequest
///
/// Partial update. `alumni_id` is accepted for compatibility with older
/// clients and ignored: the owner of a record is fixed at creation and the
/// update statement never writes it.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateEmploymentRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alumni_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub salary_range: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[ts(type = "string | null")]
    pub end_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employment_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UpdateEmploymentRequest {
    pub fn validate(&self) -> AppResult<()> {
        if [&self.company, &self.position]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| v.trim().is_empty()))
        {
            return Err(AppError::Validation("company and position cannot be blank".to_string()));
        }
        check_date_range(self.start_date, self.end_date)
    }
}

fn check_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> AppResult<()> {
    match (start, end) {
        (Some(start), Some(end)) if end < start => Err(AppError::Validation(
            "end_date cannot be before start_date".to_string(),
        )),
        _ => Ok(()),
    }
}

// --- Authentication payloads ---

/// LoginRequest
///
/// `identifier` is matched against both username and email. `username` is
/// accepted as an alias for older clients.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct LoginRequest {
    #[serde(alias = "username")]
    pub identifier: String,
    pub password: String,
}

/// RegisterRequest
///
/// Public self-registration. There is deliberately no role field: public
/// accounts are always `user`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    /// Trims every field and checks presence and email syntax.
    pub fn normalized(self) -> AppResult<Self> {
        let normalized = Self {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.trim().to_string(),
        };
        if normalized.username.is_empty()
            || normalized.email.is_empty()
            || normalized.password.is_empty()
        {
            return Err(AppError::Validation(
                "username, email and password are required".to_string(),
            ));
        }
        if !is_valid_email(&normalized.email) {
            return Err(AppError::Validation("email format is invalid".to_string()));
        }
        Ok(normalized)
    }
}

/// AdminCreateUserRequest
///
/// Admin-only account creation with an explicit role. `alumni_id` links the
/// account to the alumni whose employment records it may manage.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[serde(default)]
#[ts(export)]
pub struct AdminCreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    pub alumni_id: Option<i32>,
}

impl AdminCreateUserRequest {
    /// Validates like `RegisterRequest` and additionally resolves the role.
    /// The alumni link stays on `self.alumni_id`; it is checked here but its
    /// existence is only known to storage.
    pub fn normalized(self) -> AppResult<(RegisterRequest, Role)> {
        if self.role.trim().is_empty() {
            return Err(AppError::Validation(
                "username, email, password and role are required".to_string(),
            ));
        }
        if self.alumni_id.is_some_and(|id| id <= 0) {
            return Err(AppError::Validation("alumni_id must be positive".to_string()));
        }
        let role = self
            .role
            .parse::<Role>()
            .map_err(|_| AppError::Validation("role must be 'admin' or 'user'".to_string()))?;
        let base = RegisterRequest {
            username: self.username,
            email: self.email,
            password: self.password,
        }
        .normalized()?;
        Ok((base, role))
    }
}

/// AuthPayload
///
/// Returned by login and public registration.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct AuthPayload {
    pub user: User,
    pub token: String,
}

/// ProfileResponse
///
/// The identity claims of the current session (GET /api/profile).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct ProfileResponse {
    pub user_id: i32,
    pub username: String,
    pub role: Role,
    pub alumni_id: Option<i32>,
}

/// is_valid_email
///
/// Light syntactic check: one `@`, a non-empty local part, and a dotted domain
/// without whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split('.')
            .filter(|label| !label.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}
