use serde::Deserialize;
use utoipa::IntoParams;

/// Page size used when the client sends none, or sends something unparsable.
pub const DEFAULT_LIMIT: i64 = 10;
/// Hard ceiling on page size.
pub const MAX_LIMIT: i64 = 100;
/// Sort column used whenever the requested one is not whitelisted.
pub const DEFAULT_SORT_FIELD: &str = "id";

/// Sortable columns of `pekerjaan_alumni`.
pub const EMPLOYMENT_SORTABLE: &[&str] = &["id", "alumni_id", "company", "position", "start_date"];

/// Sortable columns of `alumni`.
pub const ALUMNI_SORTABLE: &[&str] = &[
    "id",
    "student_number",
    "name",
    "department",
    "cohort_year",
    "graduation_year",
    "email",
    "created_at",
];

/// Sortable columns of `users`.
pub const USER_SORTABLE: &[&str] = &["id", "username", "email", "created_at"];

/// ListParams
///
/// Raw, untrusted list parameters exactly as they arrive on the query string.
/// Every field is kept as text so that garbage input degrades to defaults
/// instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    /// Lowercases the input; anything other than `asc`/`desc` becomes `Asc`.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }

    /// SQL keyword, safe to splice into `ORDER BY`.
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// ListQuery
///
/// A bounded, injection-safe list specification. `sort_by` is always one of the
/// whitelist's own `&'static str` entries, so it can be pushed into SQL text
/// directly; `search` is only ever bound as a parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page: i64,
    pub limit: i64,
    pub offset: i64,
    pub sort_by: &'static str,
    pub order: SortOrder,
    pub search: String,
}

impl ListQuery {
    /// sanitize
    ///
    /// Pure function of the raw parameters and the entity's sort whitelist:
    /// - `page`: integer, anything non-positive or unparsable becomes 1.
    /// - `limit`: integer, anything non-positive or unparsable becomes 10;
    ///   capped at 100.
    /// - `sort_by`: must be in `sortable`, otherwise `id`.
    /// - `order`: `asc` or `desc`, otherwise `asc`.
    /// - `search`: passed through untouched.
    pub fn sanitize(params: &ListParams, sortable: &[&'static str]) -> Self {
        let page = params
            .page
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .filter(|p| *p >= 1)
            .unwrap_or(1);

        let limit = params
            .limit
            .as_deref()
            .and_then(|l| l.trim().parse::<i64>().ok())
            .filter(|l| *l >= 1)
            .map(|l| l.min(MAX_LIMIT))
            .unwrap_or(DEFAULT_LIMIT);

        let requested = params.sort_by.as_deref().map(str::trim).unwrap_or_default();
        let sort_by = sortable
            .iter()
            .copied()
            .find(|field| *field == requested)
            .unwrap_or(DEFAULT_SORT_FIELD);

        let order = SortOrder::parse(params.order.as_deref());

        let search = params.search.clone().unwrap_or_default();

        Self {
            page,
            limit,
            offset: (page - 1).saturating_mul(limit),
            sort_by,
            order,
            search,
        }
    }

    /// Number of pages needed for `total` rows: `ceil(total / limit)`.
    pub fn pages(&self, total: i64) -> i64 {
        page_count(total, self.limit)
    }
}

/// contains_pattern
///
/// `LIKE` pattern matching `search` as a literal substring: the wildcards
/// `%` and `_` and the escape character `\` itself are backslash-escaped.
pub fn contains_pattern(search: &str) -> String {
    let mut pattern = String::with_capacity(search.len() + 2);
    pattern.push('%');
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// page_count
///
/// `ceil(total / limit)`; zero rows means zero pages.
pub fn page_count(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}
