use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
};

use crate::{
    AppState,
    auth::{AdminUser, AuthUser, issue_token},
    error::{AppError, AppResult, RepoError},
    lifecycle,
    models::{
        AdminCreateUserRequest, Alumni, AlumniEmployment, AuthPayload, CohortCount,
        CreateAlumniRequest, CreateEmploymentRequest, EmploymentRecord, LoginRequest, NewUser,
        ProfileResponse, RegisterRequest, Role, UpdateAlumniRequest, UpdateEmploymentRequest, User,
    },
    pagination::{ALUMNI_SORTABLE, EMPLOYMENT_SORTABLE, ListParams, ListQuery, USER_SORTABLE},
    password::{hash_password_blocking, verify_password_blocking},
    response::{ApiResponse, PageResponse},
};

// Malformed ids, bodies and query strings are taken as `Result` so that the
// rejection is converted into an `AppError` and rendered with the standard
// envelope.
type IdPath = Result<Path<i32>, PathRejection>;
type Body<T> = Result<Json<T>, JsonRejection>;
type ListQueryParams = Result<Query<ListParams>, QueryRejection>;

// --- Authentication ---

/// login
///
/// [Public Route] Exchanges an identifier (username or email) and password for
/// a session token. Unknown accounts and wrong passwords are indistinguishable.
#[utoipa::path(
    post,
    path = "/api/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthPayload),
        (status = 400, description = "Missing credentials"),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    payload: Body<LoginRequest>,
) -> AppResult<Json<ApiResponse<AuthPayload>>> {
    let Json(req) = payload?;
    let identifier = req.identifier.trim();
    if identifier.is_empty() || req.password.is_empty() {
        return Err(AppError::Validation(
            "identifier and password are required".to_string(),
        ));
    }

    let credentials = match state.repo.find_credentials(identifier).await? {
        Some(found) => verify_password_blocking(req.password, found.password_hash.clone())
            .await?
            .then_some(found),
        None => None,
    };

    let Some(credentials) = credentials else {
        tracing::warn!(identifier, "failed login attempt");
        return Err(AppError::Authentication(
            "Invalid username or password".to_string(),
        ));
    };

    let token = issue_token(&credentials.user, &state.config)?;
    tracing::info!(user_id = credentials.user.id, "user logged in");

    Ok(Json(ApiResponse::ok(
        "Login successful",
        AuthPayload {
            user: credentials.user,
            token,
        },
    )))
}

/// register
///
/// [Public Route] Self-registration. The account always gets the `user` role.
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Registered", body = AuthPayload),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Username or email already taken")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    payload: Body<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<AuthPayload>>)> {
    let Json(req) = payload?;
    let user = create_account(&state, req.normalized()?, Role::User, None).await?;
    let token = issue_token(&user, &state.config)?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Registration successful", AuthPayload { user, token })),
    ))
}

/// register_admin
///
/// [Admin Route] Creates an account with an explicit role.
#[utoipa::path(
    post,
    path = "/api/register-admin",
    request_body = AdminCreateUserRequest,
    responses(
        (status = 201, description = "Account created", body = User),
        (status = 403, description = "Not an admin"),
        (status = 409, description = "Username or email already taken")
    )
)]
pub async fn register_admin(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    payload: Body<AdminCreateUserRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let Json(req) = payload?;
    let alumni_id = req.alumni_id;
    let (req, role) = req.normalized()?;
    let user = create_account(&state, req, role, alumni_id).await?;
    tracing::info!(user_id = user.id, %role, ?alumni_id, created_by = admin.id, "account created by admin");

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Account created", user)),
    ))
}

async fn create_account(
    state: &AppState,
    req: RegisterRequest,
    role: Role,
    alumni_id: Option<i32>,
) -> AppResult<User> {
    let taken = || AppError::Conflict("Username or email is already registered".to_string());

    if state.repo.user_exists(&req.username, &req.email).await? {
        return Err(taken());
    }

    let password_hash = hash_password_blocking(req.password).await?;
    let new_user = NewUser {
        username: req.username,
        email: req.email,
        password_hash,
        role,
        alumni_id,
    };

    // A concurrent registration can still win the race; the unique index decides.
    let user = state.repo.create_user(new_user).await.map_err(|e| match e {
        RepoError::UniqueViolation => taken(),
        RepoError::ForeignKeyViolation => AppError::Validation(format!(
            "Alumni {} does not exist",
            alumni_id.unwrap_or_default()
        )),
        other => other.into(),
    })?;

    tracing::info!(user_id = user.id, %role, "account registered");
    Ok(user)
}

/// get_profile
///
/// [Authenticated Route] Returns the identity bound to the current token.
#[utoipa::path(
    get,
    path = "/api/profile",
    responses((status = 200, description = "Current identity", body = ProfileResponse))
)]
pub async fn get_profile(user: AuthUser) -> Json<ApiResponse<ProfileResponse>> {
    Json(ApiResponse::ok("Profile retrieved", user.profile()))
}

/// list_users
///
/// [Admin Route] Paginated account listing.
#[utoipa::path(
    get,
    path = "/api/users",
    params(ListParams),
    responses((status = 200, description = "Page of users", body = [User]))
)]
pub async fn list_users(
    _admin: AdminUser,
    State(state): State<AppState>,
    params: ListQueryParams,
) -> AppResult<Json<PageResponse<User>>> {
    let Query(params) = params?;
    let query = ListQuery::sanitize(&params, USER_SORTABLE);
    let (users, total) = tokio::try_join!(
        state.repo.list_users_page(&query),
        state.repo.count_users(&query.search),
    )?;
    Ok(Json(PageResponse::new("Users retrieved", users, &query, total)))
}

// --- Alumni ---

#[utoipa::path(
    get,
    path = "/api/alumni",
    responses((status = 200, description = "All alumni", body = [Alumni]))
)]
pub async fn list_alumni(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<Alumni>>>> {
    let alumni = state.repo.list_alumni().await?;
    Ok(Json(ApiResponse::ok("Alumni retrieved", alumni)))
}

#[utoipa::path(
    get,
    path = "/api/alumni/{id}",
    params(("id" = i32, Path, description = "Alumni id")),
    responses(
        (status = 200, description = "Alumni", body = Alumni),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_alumni(
    _user: AuthUser,
    State(state): State<AppState>,
    id: IdPath,
) -> AppResult<Json<ApiResponse<Alumni>>> {
    let Path(id) = id?;
    let alumni = state
        .repo
        .get_alumni(id)
        .await?
        .ok_or_else(|| alumni_not_found(id))?;
    Ok(Json(ApiResponse::ok("Alumni retrieved", alumni)))
}

/// count_alumni_by_cohort
///
/// [Authenticated Route] Number of alumni who entered in `year`.
#[utoipa::path(
    get,
    path = "/api/alumni/angkatan/{year}",
    params(("year" = i32, Path, description = "Cohort (entry) year")),
    responses((status = 200, description = "Cohort size", body = CohortCount))
)]
pub async fn count_alumni_by_cohort(
    _user: AuthUser,
    State(state): State<AppState>,
    year: IdPath,
) -> AppResult<Json<ApiResponse<CohortCount>>> {
    let Path(year) = year?;
    let count = state.repo.count_alumni_by_cohort(year).await?;
    Ok(Json(ApiResponse::ok("Cohort count retrieved", count)))
}

/// get_alumni_with_employment
///
/// [Authenticated Route] One alumni joined with each of their active
/// employment records. An alumni without jobs yields an empty list.
#[utoipa::path(
    get,
    path = "/api/alumni/with-pekerjaan/{id}",
    params(("id" = i32, Path, description = "Alumni id")),
    responses(
        (status = 200, description = "Alumni with employment", body = [AlumniEmployment]),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_alumni_with_employment(
    _user: AuthUser,
    State(state): State<AppState>,
    id: IdPath,
) -> AppResult<Json<ApiResponse<Vec<AlumniEmployment>>>> {
    let Path(id) = id?;
    if state.repo.get_alumni(id).await?.is_none() {
        return Err(alumni_not_found(id));
    }
    let rows = state.repo.get_alumni_with_employment(id).await?;
    Ok(Json(ApiResponse::ok("Alumni employment retrieved", rows)))
}

#[utoipa::path(
    post,
    path = "/api/alumni",
    request_body = CreateAlumniRequest,
    responses(
        (status = 201, description = "Created", body = Alumni),
        (status = 400, description = "Invalid input"),
        (status = 409, description = "Student number already exists")
    )
)]
pub async fn create_alumni(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    payload: Body<CreateAlumniRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<Alumni>>)> {
    let Json(req) = payload?;
    req.validate()?;

    let alumni = state.repo.create_alumni(req).await.map_err(|e| match AppError::from(e) {
        AppError::Conflict(_) => AppError::Conflict("Student number is already registered".to_string()),
        other => other,
    })?;

    tracing::info!(alumni_id = alumni.id, created_by = admin.id, "alumni created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Alumni created", alumni))))
}

#[utoipa::path(
    put,
    path = "/api/alumni/{id}",
    params(("id" = i32, Path, description = "Alumni id")),
    request_body = UpdateAlumniRequest,
    responses(
        (status = 200, description = "Updated", body = Alumni),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_alumni(
    _admin: AdminUser,
    State(state): State<AppState>,
    id: IdPath,
    payload: Body<UpdateAlumniRequest>,
) -> AppResult<Json<ApiResponse<Alumni>>> {
    let Path(id) = id?;
    let Json(req) = payload?;
    req.validate()?;

    let alumni = state
        .repo
        .update_alumni(id, req)
        .await?
        .ok_or_else(|| alumni_not_found(id))?;
    Ok(Json(ApiResponse::ok("Alumni updated", alumni)))
}

/// delete_alumni
///
/// [Admin Route] Removes the alumni together with its employment records;
/// linked accounts are unlinked.
#[utoipa::path(
    delete,
    path = "/api/alumni/{id}",
    params(("id" = i32, Path, description = "Alumni id")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_alumni(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    id: IdPath,
) -> AppResult<Json<ApiResponse<()>>> {
    let Path(id) = id?;
    if !state.repo.delete_alumni(id).await? {
        return Err(alumni_not_found(id));
    }
    tracing::info!(alumni_id = id, deleted_by = admin.id, "alumni deleted");
    Ok(Json(ApiResponse::done("Alumni deleted")))
}

/// list_alumni_page
///
/// [Authenticated Route] Sanitized, paginated alumni listing. Search matches
/// name, student number and department.
#[utoipa::path(
    get,
    path = "/api/alumni-pag",
    params(ListParams),
    responses((status = 200, description = "Page of alumni", body = [Alumni]))
)]
pub async fn list_alumni_page(
    _user: AuthUser,
    State(state): State<AppState>,
    params: ListQueryParams,
) -> AppResult<Json<PageResponse<Alumni>>> {
    let Query(params) = params?;
    let query = ListQuery::sanitize(&params, ALUMNI_SORTABLE);
    let (alumni, total) = tokio::try_join!(
        state.repo.list_alumni_page(&query),
        state.repo.count_alumni(&query.search),
    )?;
    Ok(Json(PageResponse::new("Alumni retrieved", alumni, &query, total)))
}

fn alumni_not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Alumni {id} not found"))
}

// --- Employment records ---

#[utoipa::path(
    get,
    path = "/api/pekerjaan",
    responses((status = 200, description = "Active employment records", body = [EmploymentRecord]))
)]
pub async fn list_employment(
    _user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<EmploymentRecord>>>> {
    let records = state.repo.list_employment().await?;
    Ok(Json(ApiResponse::ok("Employment records retrieved", records)))
}

/// get_employment
///
/// [Authenticated Route] A trashed record is only reachable through the trash
/// listing, so it is reported as not found here.
#[utoipa::path(
    get,
    path = "/api/pekerjaan/{id}",
    params(("id" = i32, Path, description = "Employment record id")),
    responses(
        (status = 200, description = "Employment record", body = EmploymentRecord),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_employment(
    _user: AuthUser,
    State(state): State<AppState>,
    id: IdPath,
) -> AppResult<Json<ApiResponse<EmploymentRecord>>> {
    let Path(id) = id?;
    let record = state
        .repo
        .get_employment(id)
        .await?
        .filter(|r| !r.is_deleted)
        .ok_or_else(|| AppError::NotFound(format!("Employment record {id} not found")))?;
    Ok(Json(ApiResponse::ok("Employment record retrieved", record)))
}

#[utoipa::path(
    get,
    path = "/api/pekerjaan/alumni/{id}",
    params(("id" = i32, Path, description = "Alumni id")),
    responses((status = 200, description = "Active records of the alumni", body = [EmploymentRecord]))
)]
pub async fn list_employment_by_alumni(
    _user: AuthUser,
    State(state): State<AppState>,
    alumni_id: IdPath,
) -> AppResult<Json<ApiResponse<Vec<EmploymentRecord>>>> {
    let Path(alumni_id) = alumni_id?;
    let records = state.repo.list_employment_by_alumni(alumni_id).await?;
    Ok(Json(ApiResponse::ok("Employment records retrieved", records)))
}

#[utoipa::path(
    post,
    path = "/api/pekerjaan",
    request_body = CreateEmploymentRequest,
    responses(
        (status = 201, description = "Created", body = EmploymentRecord),
        (status = 400, description = "Missing fields or unknown alumni"),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn create_employment(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    payload: Body<CreateEmploymentRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<EmploymentRecord>>)> {
    let Json(req) = payload?;
    let record = lifecycle::create(state.repo.as_ref(), &admin, req).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Employment record created", record)),
    ))
}

/// update_employment
///
/// [Authenticated Route] Admins may update any active record, users only their
/// own alumni's.
#[utoipa::path(
    put,
    path = "/api/pekerjaan/{id}",
    params(("id" = i32, Path, description = "Employment record id")),
    request_body = UpdateEmploymentRequest,
    responses(
        (status = 200, description = "Updated", body = EmploymentRecord),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_employment(
    user: AuthUser,
    State(state): State<AppState>,
    id: IdPath,
    payload: Body<UpdateEmploymentRequest>,
) -> AppResult<Json<ApiResponse<EmploymentRecord>>> {
    let Path(id) = id?;
    let Json(changes) = payload?;
    let record = lifecycle::update(state.repo.as_ref(), &user, id, changes).await?;
    Ok(Json(ApiResponse::ok("Employment record updated", record)))
}

#[utoipa::path(
    delete,
    path = "/api/pekerjaan/{id}",
    params(("id" = i32, Path, description = "Employment record id")),
    responses(
        (status = 200, description = "Moved to trash", body = EmploymentRecord),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn soft_delete_employment(
    user: AuthUser,
    State(state): State<AppState>,
    id: IdPath,
) -> AppResult<Json<ApiResponse<EmploymentRecord>>> {
    let Path(id) = id?;
    let record = lifecycle::soft_delete(state.repo.as_ref(), &user, id).await?;
    Ok(Json(ApiResponse::ok("Employment record moved to trash", record)))
}

#[utoipa::path(
    get,
    path = "/api/pekerjaan/trash",
    responses((status = 200, description = "Trashed records visible to the caller", body = [EmploymentRecord]))
)]
pub async fn list_trash(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<Vec<EmploymentRecord>>>> {
    let records = lifecycle::list_trash(state.repo.as_ref(), &user).await?;
    Ok(Json(ApiResponse::ok("Trashed employment records retrieved", records)))
}

#[utoipa::path(
    put,
    path = "/api/pekerjaan/restore/{id}",
    params(("id" = i32, Path, description = "Employment record id")),
    responses(
        (status = 200, description = "Restored", body = EmploymentRecord),
        (status = 403, description = "Not Owner"),
        (status = 404, description = "Not in trash")
    )
)]
pub async fn restore_employment(
    user: AuthUser,
    State(state): State<AppState>,
    id: IdPath,
) -> AppResult<Json<ApiResponse<EmploymentRecord>>> {
    let Path(id) = id?;
    let record = lifecycle::restore(state.repo.as_ref(), &user, id).await?;
    Ok(Json(ApiResponse::ok("Employment record restored", record)))
}

/// hard_delete_employment
///
/// [Authenticated Route] Permanent removal. Users must trash the record first.
#[utoipa::path(
    delete,
    path = "/api/pekerjaan/hard-delete/{id}",
    params(("id" = i32, Path, description = "Employment record id")),
    responses(
        (status = 200, description = "Permanently deleted"),
        (status = 403, description = "Not Owner, or not trashed"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn hard_delete_employment(
    user: AuthUser,
    State(state): State<AppState>,
    id: IdPath,
) -> AppResult<Json<ApiResponse<()>>> {
    let Path(id) = id?;
    lifecycle::hard_delete(state.repo.as_ref(), &user, id).await?;
    Ok(Json(ApiResponse::done("Employment record permanently deleted")))
}

/// list_employment_page
///
/// [Authenticated Route] Sanitized, paginated listing of active records.
/// Search is a case-insensitive substring match on company and position.
#[utoipa::path(
    get,
    path = "/api/pekerjaan-pag",
    params(ListParams),
    responses((status = 200, description = "Page of employment records", body = [EmploymentRecord]))
)]
pub async fn list_employment_page(
    _user: AuthUser,
    State(state): State<AppState>,
    params: ListQueryParams,
) -> AppResult<Json<PageResponse<EmploymentRecord>>> {
    let Query(params) = params?;
    let query = ListQuery::sanitize(&params, EMPLOYMENT_SORTABLE);
    let (records, total) = tokio::try_join!(
        state.repo.list_employment_page(&query),
        state.repo.count_employment(&query.search),
    )?;
    Ok(Json(PageResponse::new(
        "Employment records retrieved",
        records,
        &query,
        total,
    )))
}
