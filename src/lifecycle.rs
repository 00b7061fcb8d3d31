//! Employment record lifecycle.
//!
//! ```text
//! [Active]  --soft-delete--> [Trashed]
//! [Trashed] --restore------> [Active]
//! [Trashed] --hard-delete--> [Destroyed]
//! [Active]  --hard-delete--> [Destroyed]   (admin only)
//! ```
//!
//! Every mutation goes through the same two steps: `authorize` decides on the
//! loaded record, then the repository performs one conditional write whose
//! filter repeats that decision. A record that changed in between simply
//! fails the filter and the caller gets `NotFound`.

use chrono::Utc;

use crate::{
    auth::AuthUser,
    error::{AppError, AppResult, RepoError},
    models::{CreateEmploymentRequest, EmploymentRecord, UpdateEmploymentRequest},
    repository::Repository,
};

/// The guarded mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Update,
    SoftDelete,
    Restore,
    HardDelete,
}

impl Action {
    /// Trash state the record must be in for `identity` to perform this
    /// action; `None` means any state.
    pub fn required_trash_state(self, identity: &AuthUser) -> Option<bool> {
        match self {
            Action::Update | Action::SoftDelete => Some(false),
            Action::Restore => Some(true),
            Action::HardDelete if identity.is_admin() => None,
            Action::HardDelete => Some(true),
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            Action::Update => "update",
            Action::SoftDelete => "soft_delete",
            Action::Restore => "restore",
            Action::HardDelete => "hard_delete",
        }
    }
}

/// WriteGuard
///
/// The authorization decision in the form the storage layer applies it: the
/// write only touches row `id` if it still belongs to `owner` (when set) and
/// is still in trash state `trashed` (when set).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteGuard {
    pub id: i32,
    pub owner: Option<i32>,
    pub trashed: Option<bool>,
}

impl WriteGuard {
    /// Whether `record` satisfies this guard right now.
    pub fn permits(&self, record: &EmploymentRecord) -> bool {
        record.id == self.id
            && self.owner.is_none_or(|owner| record.alumni_id == owner)
            && self.trashed.is_none_or(|trashed| record.is_deleted == trashed)
    }
}

/// Admins own everything; a user owns the records of their linked alumni.
/// A user without a linked alumni owns nothing.
fn owns(identity: &AuthUser, record: &EmploymentRecord) -> bool {
    identity.is_admin() || identity.alumni_id == Some(record.alumni_id)
}

/// can_act_on
///
/// The single ownership predicate behind every guarded mutation.
pub fn can_act_on(
    identity: &AuthUser,
    record: &EmploymentRecord,
    required_trash_state: Option<bool>,
) -> bool {
    owns(identity, record)
        && required_trash_state.is_none_or(|trashed| record.is_deleted == trashed)
}

/// authorize
///
/// Decides whether `identity` may perform `action` on `record`:
/// - not the owner → `Forbidden`;
/// - non-admin hard-delete of a record that is not trashed → `Forbidden`;
/// - any other trash-state mismatch → `NotFound` (an active record cannot be
///   restored, a trashed one cannot be updated or trashed again).
pub fn authorize(identity: &AuthUser, record: &EmploymentRecord, action: Action) -> AppResult<WriteGuard> {
    if !owns(identity, record) {
        tracing::warn!(
            user_id = identity.id,
            record_id = record.id,
            action = action.as_str(),
            "ownership check failed"
        );
        return Err(AppError::Forbidden(
            "You do not have access to this employment record".to_string(),
        ));
    }

    let required = action.required_trash_state(identity);
    if !can_act_on(identity, record, required) {
        tracing::warn!(
            user_id = identity.id,
            record_id = record.id,
            action = action.as_str(),
            is_deleted = record.is_deleted,
            "record is in the wrong state"
        );
        return Err(match action {
            Action::HardDelete => AppError::Forbidden(
                "Only records in the trash can be permanently deleted".to_string(),
            ),
            Action::Restore => not_found_in_trash(record.id),
            Action::Update | Action::SoftDelete => not_found(record.id),
        });
    }

    Ok(WriteGuard {
        id: record.id,
        owner: if identity.is_admin() { None } else { Some(record.alumni_id) },
        trashed: required,
    })
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Employment record {id} not found"))
}

fn not_found_in_trash(id: i32) -> AppError {
    AppError::NotFound(format!("Employment record {id} not found in trash"))
}

async fn load(repo: &dyn Repository, id: i32) -> AppResult<EmploymentRecord> {
    repo.get_employment(id).await?.ok_or_else(|| not_found(id))
}

/// create
///
/// Admin-only (gated at the route). Validates before touching storage;
/// `start_date` defaults to today (UTC). An unknown alumni is a validation
/// failure.
pub async fn create(
    repo: &dyn Repository,
    admin: &AuthUser,
    mut req: CreateEmploymentRequest,
) -> AppResult<EmploymentRecord> {
    req.validate()?;
    req.start_date.get_or_insert_with(|| Utc::now().date_naive());

    let alumni_id = req.alumni_id;
    let record = repo.create_employment(req).await.map_err(|e| match e {
        RepoError::ForeignKeyViolation => {
            AppError::Validation(format!("Alumni {alumni_id} does not exist"))
        }
        other => other.into(),
    })?;

    tracing::info!(record_id = record.id, alumni_id, created_by = admin.id, "employment record created");
    Ok(record)
}

/// update
///
/// Partial update of an active record. The owner never changes: any
/// `alumni_id` in the payload is ignored by the write.
pub async fn update(
    repo: &dyn Repository,
    identity: &AuthUser,
    id: i32,
    changes: UpdateEmploymentRequest,
) -> AppResult<EmploymentRecord> {
    changes.validate()?;

    let record = load(repo, id).await?;
    let guard = authorize(identity, &record, Action::Update)?;

    let start = changes.start_date.unwrap_or(record.start_date);
    let end = changes.end_date.or(record.end_date);
    if end.is_some_and(|end| end < start) {
        return Err(AppError::Validation(
            "end_date cannot be before start_date".to_string(),
        ));
    }

    let updated = repo
        .update_employment(&guard, changes)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(record_id = id, user_id = identity.id, "employment record updated");
    Ok(updated)
}

/// soft_delete
///
/// Moves an active record to the trash, stamping when and by whom. A record
/// that is already trashed is reported as not found and keeps its original
/// stamps.
pub async fn soft_delete(repo: &dyn Repository, identity: &AuthUser, id: i32) -> AppResult<EmploymentRecord> {
    let record = load(repo, id).await?;
    let guard = authorize(identity, &record, Action::SoftDelete)?;

    let trashed = repo
        .soft_delete_employment(&guard, identity.id)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(record_id = id, user_id = identity.id, "employment record moved to trash");
    Ok(trashed)
}

/// list_trash
///
/// Admins see every trashed record, users only their own alumni's. A user
/// without a linked alumni gets an empty list.
pub async fn list_trash(repo: &dyn Repository, identity: &AuthUser) -> AppResult<Vec<EmploymentRecord>> {
    let owner = if identity.is_admin() {
        None
    } else {
        match identity.alumni_id {
            Some(alumni_id) => Some(alumni_id),
            None => return Ok(Vec::new()),
        }
    };
    Ok(repo.list_trash(owner).await?)
}

/// restore
///
/// Brings a trashed record back to active and clears its trash stamps.
pub async fn restore(repo: &dyn Repository, identity: &AuthUser, id: i32) -> AppResult<EmploymentRecord> {
    let record = load(repo, id).await?;
    let guard = authorize(identity, &record, Action::Restore)?;

    let restored = repo
        .restore_employment(&guard)
        .await?
        .ok_or_else(|| not_found_in_trash(id))?;

    tracing::info!(record_id = id, user_id = identity.id, "employment record restored");
    Ok(restored)
}

/// hard_delete
///
/// Irreversible removal. Users may only destroy their own trashed records;
/// admins may destroy any record in any state.
pub async fn hard_delete(repo: &dyn Repository, identity: &AuthUser, id: i32) -> AppResult<()> {
    let record = load(repo, id).await?;
    let guard = authorize(identity, &record, Action::HardDelete)?;

    if !repo.hard_delete_employment(&guard).await? {
        return Err(not_found(id));
    }

    tracing::info!(record_id = id, user_id = identity.id, "employment record permanently deleted");
    Ok(())
}
