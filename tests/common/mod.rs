#![allow(dead_code)]

use std::{
    cmp::Ordering,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering as AtomicOrdering},
    },
};

use alumni_portal::{
    AppConfig, AppState,
    auth::{AuthUser, issue_token},
    error::RepoError,
    lifecycle::WriteGuard,
    models::{
        Alumni, AlumniEmployment, CohortCount, CreateAlumniRequest, CreateEmploymentRequest,
        EmploymentRecord, NewUser, Role, UpdateAlumniRequest, UpdateEmploymentRequest, User,
        UserCredentials,
    },
    pagination::{ListQuery, SortOrder},
    password::hash_password,
    repository::Repository,
};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

// --- In-memory Repository ---

#[derive(Default)]
struct Store {
    users: Vec<(User, String)>,
    alumni: Vec<Alumni>,
    employment: Vec<EmploymentRecord>,
    next_user_id: i32,
    next_alumni_id: i32,
    next_employment_id: i32,
}

fn bump(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

/// Case-insensitive substring match over `fields`; an empty term matches all.
fn contains_term(search: &str, fields: &[&str]) -> bool {
    if search.is_empty() {
        return true;
    }
    let needle = search.to_lowercase();
    fields.iter().any(|field| field.to_lowercase().contains(&needle))
}

fn page<T>(mut rows: Vec<T>, query: &ListQuery, compare: impl Fn(&T, &T) -> Ordering) -> Vec<T> {
    rows.sort_by(|a, b| compare(a, b));
    if query.order == SortOrder::Desc {
        rows.reverse();
    }
    rows.into_iter()
        .skip(query.offset as usize)
        .take(query.limit as usize)
        .collect()
}

type WriteHook = Box<dyn FnOnce(&mut Vec<EmploymentRecord>) + Send>;

/// InMemoryRepo
///
/// A `Repository` over plain vectors. Guarded writes apply `WriteGuard::permits`
/// exactly like the SQL filter does, so lifecycle behaviour can be tested
/// without Postgres. Setting `unavailable` makes every call time out.
#[derive(Default)]
pub struct InMemoryRepo {
    store: Mutex<Store>,
    unavailable: AtomicBool,
    before_write: Mutex<Option<WriteHook>>,
}

impl InMemoryRepo {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, AtomicOrdering::SeqCst);
    }

    /// Runs `change` once, right before the next guarded write is applied:
    /// a concurrent request landing between the guard's read and its write.
    pub fn before_next_write(&self, change: impl FnOnce(&mut Vec<EmploymentRecord>) + Send + 'static) {
        *self.before_write.lock().unwrap() = Some(Box::new(change));
    }

    fn interleave(&self, store: &mut Store) {
        if let Some(change) = self.before_write.lock().unwrap().take() {
            change(&mut store.employment);
        }
    }

    fn check(&self, op: &'static str) -> Result<(), RepoError> {
        if self.unavailable.load(AtomicOrdering::SeqCst) {
            return Err(RepoError::Timeout { op });
        }
        Ok(())
    }

    /// Inserts a user with an unusable password hash.
    pub fn seed_user(&self, username: &str, role: Role, alumni_id: Option<i32>) -> User {
        self.insert_user(username, role, alumni_id, String::new())
    }

    /// Inserts a user who can log in with `password`.
    pub fn seed_user_with_password(&self, username: &str, password: &str, role: Role) -> User {
        let hash = hash_password(password).unwrap();
        self.insert_user(username, role, None, hash)
    }

    fn insert_user(&self, username: &str, role: Role, alumni_id: Option<i32>, hash: String) -> User {
        let mut store = self.store.lock().unwrap();
        let user = User {
            id: bump(&mut store.next_user_id),
            alumni_id,
            username: username.to_string(),
            email: format!("{username}@example.com"),
            role,
            created_at: Utc::now(),
        };
        store.users.push((user.clone(), hash));
        user
    }

    pub fn remove_user(&self, id: i32) {
        self.store.lock().unwrap().users.retain(|(u, _)| u.id != id);
    }

    pub fn set_user_role(&self, id: i32, role: Role) {
        let mut store = self.store.lock().unwrap();
        if let Some((user, _)) = store.users.iter_mut().find(|(u, _)| u.id == id) {
            user.role = role;
        }
    }

    /// Inserts an alumni with a fixed id.
    pub fn seed_alumni(&self, id: i32, name: &str, cohort_year: i32) -> Alumni {
        let mut store = self.store.lock().unwrap();
        store.next_alumni_id = store.next_alumni_id.max(id);
        let alumni = Alumni {
            id,
            student_number: format!("NIM{id:05}"),
            name: name.to_string(),
            department: "Informatics".to_string(),
            cohort_year,
            graduation_year: cohort_year + 4,
            email: format!("alumni{id}@example.com"),
            phone: None,
            address: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.alumni.push(alumni.clone());
        alumni
    }

    pub fn seed_employment(&self, alumni_id: i32, company: &str, position: &str) -> EmploymentRecord {
        let mut store = self.store.lock().unwrap();
        let now = Utc::now();
        let record = EmploymentRecord {
            id: bump(&mut store.next_employment_id),
            alumni_id,
            company: company.to_string(),
            position: position.to_string(),
            industry: "Technology".to_string(),
            location: "Jakarta".to_string(),
            salary_range: Some("10-15jt".to_string()),
            start_date: NaiveDate::from_ymd_opt(2022, 1, 10).unwrap(),
            end_date: None,
            employment_status: "full-time".to_string(),
            description: None,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
        };
        store.employment.push(record.clone());
        record
    }

    /// Current stored state of a record, bypassing every filter.
    pub fn employment(&self, id: i32) -> Option<EmploymentRecord> {
        let store = self.store.lock().unwrap();
        store.employment.iter().find(|r| r.id == id).cloned()
    }

    pub fn employment_count(&self) -> usize {
        self.store.lock().unwrap().employment.len()
    }

    pub fn user_count(&self) -> usize {
        self.store.lock().unwrap().users.len()
    }
}

#[async_trait]
impl Repository for InMemoryRepo {
    // --- Users ---

    async fn get_user(&self, id: i32) -> Result<Option<User>, RepoError> {
        self.check("get_user")?;
        let store = self.store.lock().unwrap();
        Ok(store.users.iter().find(|(u, _)| u.id == id).map(|(u, _)| u.clone()))
    }

    async fn find_credentials(&self, identifier: &str) -> Result<Option<UserCredentials>, RepoError> {
        self.check("find_credentials")?;
        let store = self.store.lock().unwrap();
        let found = store
            .users
            .iter()
            .find(|(u, _)| u.username == identifier)
            .or_else(|| store.users.iter().find(|(u, _)| u.email == identifier));
        Ok(found.map(|(user, hash)| UserCredentials {
            user: user.clone(),
            password_hash: hash.clone(),
        }))
    }

    async fn user_exists(&self, username: &str, email: &str) -> Result<bool, RepoError> {
        self.check("user_exists")?;
        let store = self.store.lock().unwrap();
        Ok(store
            .users
            .iter()
            .any(|(u, _)| u.username == username || u.email == email))
    }

    async fn create_user(&self, user: NewUser) -> Result<User, RepoError> {
        self.check("create_user")?;
        let mut store = self.store.lock().unwrap();
        if store
            .users
            .iter()
            .any(|(u, _)| u.username == user.username || u.email == user.email)
        {
            return Err(RepoError::UniqueViolation);
        }
        if user
            .alumni_id
            .is_some_and(|id| !store.alumni.iter().any(|a| a.id == id))
        {
            return Err(RepoError::ForeignKeyViolation);
        }
        let created = User {
            id: bump(&mut store.next_user_id),
            alumni_id: user.alumni_id,
            username: user.username,
            email: user.email,
            role: user.role,
            created_at: Utc::now(),
        };
        store.users.push((created.clone(), user.password_hash));
        Ok(created)
    }

    async fn list_users_page(&self, query: &ListQuery) -> Result<Vec<User>, RepoError> {
        self.check("list_users_page")?;
        let store = self.store.lock().unwrap();
        let rows: Vec<User> = store
            .users
            .iter()
            .map(|(u, _)| u.clone())
            .filter(|u| contains_term(&query.search, &[u.username.as_str(), u.email.as_str()]))
            .collect();
        Ok(page(rows, query, |a, b| match query.sort_by {
            "username" => a.username.cmp(&b.username),
            "email" => a.email.cmp(&b.email),
            "created_at" => a.created_at.cmp(&b.created_at),
            _ => a.id.cmp(&b.id),
        }))
    }

    async fn count_users(&self, search: &str) -> Result<i64, RepoError> {
        self.check("count_users")?;
        let store = self.store.lock().unwrap();
        Ok(store
            .users
            .iter()
            .filter(|(u, _)| contains_term(search, &[u.username.as_str(), u.email.as_str()]))
            .count() as i64)
    }

    // --- Alumni ---

    async fn list_alumni(&self) -> Result<Vec<Alumni>, RepoError> {
        self.check("list_alumni")?;
        Ok(self.store.lock().unwrap().alumni.clone())
    }

    async fn get_alumni(&self, id: i32) -> Result<Option<Alumni>, RepoError> {
        self.check("get_alumni")?;
        let store = self.store.lock().unwrap();
        Ok(store.alumni.iter().find(|a| a.id == id).cloned())
    }

    async fn count_alumni_by_cohort(&self, cohort_year: i32) -> Result<CohortCount, RepoError> {
        self.check("count_alumni_by_cohort")?;
        let store = self.store.lock().unwrap();
        let total = store.alumni.iter().filter(|a| a.cohort_year == cohort_year).count() as i64;
        Ok(CohortCount { cohort_year, total })
    }

    async fn get_alumni_with_employment(&self, id: i32) -> Result<Vec<AlumniEmployment>, RepoError> {
        self.check("get_alumni_with_employment")?;
        let store = self.store.lock().unwrap();
        let Some(alumni) = store.alumni.iter().find(|a| a.id == id) else {
            return Ok(Vec::new());
        };
        Ok(store
            .employment
            .iter()
            .filter(|r| r.alumni_id == id && !r.is_deleted)
            .map(|r| AlumniEmployment {
                alumni_id: alumni.id,
                student_number: alumni.student_number.clone(),
                name: alumni.name.clone(),
                department: alumni.department.clone(),
                cohort_year: alumni.cohort_year,
                graduation_year: alumni.graduation_year,
                email: alumni.email.clone(),
                employment_id: r.id,
                company: r.company.clone(),
                position: r.position.clone(),
                start_date: r.start_date,
                end_date: r.end_date,
            })
            .collect())
    }

    async fn create_alumni(&self, req: CreateAlumniRequest) -> Result<Alumni, RepoError> {
        self.check("create_alumni")?;
        let mut store = self.store.lock().unwrap();
        if store.alumni.iter().any(|a| a.student_number == req.student_number) {
            return Err(RepoError::UniqueViolation);
        }
        let alumni = Alumni {
            id: bump(&mut store.next_alumni_id),
            student_number: req.student_number,
            name: req.name,
            department: req.department,
            cohort_year: req.cohort_year,
            graduation_year: req.graduation_year,
            email: req.email,
            phone: req.phone,
            address: req.address,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        store.alumni.push(alumni.clone());
        Ok(alumni)
    }

    async fn update_alumni(&self, id: i32, req: UpdateAlumniRequest) -> Result<Option<Alumni>, RepoError> {
        self.check("update_alumni")?;
        let mut store = self.store.lock().unwrap();
        let Some(alumni) = store.alumni.iter_mut().find(|a| a.id == id) else {
            return Ok(None);
        };
        if let Some(name) = req.name {
            alumni.name = name;
        }
        if let Some(department) = req.department {
            alumni.department = department;
        }
        if let Some(cohort_year) = req.cohort_year {
            alumni.cohort_year = cohort_year;
        }
        if let Some(graduation_year) = req.graduation_year {
            alumni.graduation_year = graduation_year;
        }
        if let Some(email) = req.email {
            alumni.email = email;
        }
        if req.phone.is_some() {
            alumni.phone = req.phone;
        }
        if req.address.is_some() {
            alumni.address = req.address;
        }
        alumni.updated_at = Utc::now();
        Ok(Some(alumni.clone()))
    }

    async fn delete_alumni(&self, id: i32) -> Result<bool, RepoError> {
        self.check("delete_alumni")?;
        let mut store = self.store.lock().unwrap();
        let before = store.alumni.len();
        store.alumni.retain(|a| a.id != id);
        if store.alumni.len() == before {
            return Ok(false);
        }
        store.employment.retain(|r| r.alumni_id != id);
        for (user, _) in store.users.iter_mut() {
            if user.alumni_id == Some(id) {
                user.alumni_id = None;
            }
        }
        Ok(true)
    }

    async fn list_alumni_page(&self, query: &ListQuery) -> Result<Vec<Alumni>, RepoError> {
        self.check("list_alumni_page")?;
        let store = self.store.lock().unwrap();
        let rows: Vec<Alumni> = store
            .alumni
            .iter()
            .filter(|a| contains_term(&query.search, &[a.name.as_str(), a.student_number.as_str(), a.department.as_str()]))
            .cloned()
            .collect();
        Ok(page(rows, query, |a, b| match query.sort_by {
            "student_number" => a.student_number.cmp(&b.student_number),
            "name" => a.name.cmp(&b.name),
            "department" => a.department.cmp(&b.department),
            "cohort_year" => a.cohort_year.cmp(&b.cohort_year),
            "graduation_year" => a.graduation_year.cmp(&b.graduation_year),
            "email" => a.email.cmp(&b.email),
            "created_at" => a.created_at.cmp(&b.created_at),
            _ => a.id.cmp(&b.id),
        }))
    }

    async fn count_alumni(&self, search: &str) -> Result<i64, RepoError> {
        self.check("count_alumni")?;
        let store = self.store.lock().unwrap();
        Ok(store
            .alumni
            .iter()
            .filter(|a| contains_term(search, &[a.name.as_str(), a.student_number.as_str(), a.department.as_str()]))
            .count() as i64)
    }

    // --- Employment records ---

    async fn list_employment(&self) -> Result<Vec<EmploymentRecord>, RepoError> {
        self.check("list_employment")?;
        let store = self.store.lock().unwrap();
        Ok(store.employment.iter().filter(|r| !r.is_deleted).cloned().collect())
    }

    async fn get_employment(&self, id: i32) -> Result<Option<EmploymentRecord>, RepoError> {
        self.check("get_employment")?;
        Ok(self.employment(id))
    }

    async fn list_employment_by_alumni(&self, alumni_id: i32) -> Result<Vec<EmploymentRecord>, RepoError> {
        self.check("list_employment_by_alumni")?;
        let store = self.store.lock().unwrap();
        Ok(store
            .employment
            .iter()
            .filter(|r| r.alumni_id == alumni_id && !r.is_deleted)
            .cloned()
            .collect())
    }

    async fn create_employment(&self, req: CreateEmploymentRequest) -> Result<EmploymentRecord, RepoError> {
        self.check("create_employment")?;
        let mut store = self.store.lock().unwrap();
        if !store.alumni.iter().any(|a| a.id == req.alumni_id) {
            return Err(RepoError::ForeignKeyViolation);
        }
        let now = Utc::now();
        let record = EmploymentRecord {
            id: bump(&mut store.next_employment_id),
            alumni_id: req.alumni_id,
            company: req.company,
            position: req.position,
            industry: req.industry,
            location: req.location,
            salary_range: req.salary_range,
            start_date: req.start_date.unwrap_or_else(|| now.date_naive()),
            end_date: req.end_date,
            employment_status: req.employment_status,
            description: req.description,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            deleted_at: None,
            deleted_by: None,
        };
        store.employment.push(record.clone());
        Ok(record)
    }

    async fn update_employment(
        &self,
        guard: &WriteGuard,
        changes: UpdateEmploymentRequest,
    ) -> Result<Option<EmploymentRecord>, RepoError> {
        self.check("update_employment")?;
        let mut store = self.store.lock().unwrap();
        self.interleave(&mut store);
        let Some(record) = store.employment.iter_mut().find(|r| guard.permits(r)) else {
            return Ok(None);
        };
        if let Some(company) = changes.company {
            record.company = company;
        }
        if let Some(position) = changes.position {
            record.position = position;
        }
        if let Some(industry) = changes.industry {
            record.industry = industry;
        }
        if let Some(location) = changes.location {
            record.location = location;
        }
        if changes.salary_range.is_some() {
            record.salary_range = changes.salary_range;
        }
        if let Some(start_date) = changes.start_date {
            record.start_date = start_date;
        }
        if changes.end_date.is_some() {
            record.end_date = changes.end_date;
        }
        if let Some(status) = changes.employment_status {
            record.employment_status = status;
        }
        if changes.description.is_some() {
            record.description = changes.description;
        }
        record.updated_at = Utc::now();
        Ok(Some(record.clone()))
    }

    async fn soft_delete_employment(
        &self,
        guard: &WriteGuard,
        deleted_by: i32,
    ) -> Result<Option<EmploymentRecord>, RepoError> {
        self.check("soft_delete_employment")?;
        let mut store = self.store.lock().unwrap();
        self.interleave(&mut store);
        let Some(record) = store.employment.iter_mut().find(|r| guard.permits(r)) else {
            return Ok(None);
        };
        record.is_deleted = true;
        record.deleted_at = Some(Utc::now());
        record.deleted_by = Some(deleted_by);
        Ok(Some(record.clone()))
    }

    async fn restore_employment(&self, guard: &WriteGuard) -> Result<Option<EmploymentRecord>, RepoError> {
        self.check("restore_employment")?;
        let mut store = self.store.lock().unwrap();
        self.interleave(&mut store);
        let Some(record) = store.employment.iter_mut().find(|r| guard.permits(r)) else {
            return Ok(None);
        };
        record.is_deleted = false;
        record.deleted_at = None;
        record.deleted_by = None;
        Ok(Some(record.clone()))
    }

    async fn hard_delete_employment(&self, guard: &WriteGuard) -> Result<bool, RepoError> {
        self.check("hard_delete_employment")?;
        let mut store = self.store.lock().unwrap();
        self.interleave(&mut store);
        let before = store.employment.len();
        store.employment.retain(|r| !guard.permits(r));
        Ok(store.employment.len() < before)
    }

    async fn list_trash(&self, owner: Option<i32>) -> Result<Vec<EmploymentRecord>, RepoError> {
        self.check("list_trash")?;
        let store = self.store.lock().unwrap();
        Ok(store
            .employment
            .iter()
            .filter(|r| r.is_deleted && owner.is_none_or(|o| r.alumni_id == o))
            .cloned()
            .collect())
    }

    async fn list_employment_page(&self, query: &ListQuery) -> Result<Vec<EmploymentRecord>, RepoError> {
        self.check("list_employment_page")?;
        let store = self.store.lock().unwrap();
        let rows: Vec<EmploymentRecord> = store
            .employment
            .iter()
            .filter(|r| !r.is_deleted && contains_term(&query.search, &[r.company.as_str(), r.position.as_str()]))
            .cloned()
            .collect();
        Ok(page(rows, query, |a, b| match query.sort_by {
            "alumni_id" => a.alumni_id.cmp(&b.alumni_id),
            "company" => a.company.cmp(&b.company),
            "position" => a.position.cmp(&b.position),
            "start_date" => a.start_date.cmp(&b.start_date),
            _ => a.id.cmp(&b.id),
        }))
    }

    async fn count_employment(&self, search: &str) -> Result<i64, RepoError> {
        self.check("count_employment")?;
        let store = self.store.lock().unwrap();
        Ok(store
            .employment
            .iter()
            .filter(|r| !r.is_deleted && contains_term(search, &[r.company.as_str(), r.position.as_str()]))
            .count() as i64)
    }
}

// --- Helpers ---

pub fn test_config() -> AppConfig {
    AppConfig::default()
}

pub fn create_test_state(repo: Arc<InMemoryRepo>) -> AppState {
    AppState {
        repo,
        config: test_config(),
    }
}

pub fn token_for(user: &User) -> String {
    issue_token(user, &test_config()).unwrap()
}

pub fn identity(user: &User) -> AuthUser {
    AuthUser::from(user.clone())
}
