//! The dependent chain of browser selections.
//!
//! `data_portal`/`format` → `result_type` → (`queries`, `return_fields`,
//! `page_size`) → result set. [`reduce`] is a pure function from the current
//! [`SelectionState`] and an [`Action`] to the next state plus the set of
//! fetched views that must be reloaded.

use std::collections::BTreeSet;

use crate::domain::{AppState, DataPortal, Format};
use crate::endpoint::{Endpoint, SearchRequest};

pub const INITIAL_PAGE_SIZE: usize = 25;
pub const PAGE_SIZE_STEP: usize = 25;
pub const DEFAULT_RESULT_TYPE: &str = "study";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    pub data_portal: DataPortal,
    pub format: Format,
    pub result_type: Option<String>,
    pub queries: Option<String>,
    pub return_fields: BTreeSet<String>,
    pub page_size: usize,
}

impl SelectionState {
    pub fn new(app: AppState) -> Self {
        Self {
            data_portal: app.data_portal,
            format: app.format,
            result_type: None,
            queries: None,
            return_fields: BTreeSet::new(),
            page_size: INITIAL_PAGE_SIZE,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            data_portal: self.data_portal,
            format: self.format,
        }
    }

    pub fn results_endpoint(&self) -> Endpoint {
        Endpoint::Results {
            data_portal: self.data_portal,
            format: self.format,
        }
    }

    pub fn search_fields_endpoint(&self) -> Option<Endpoint> {
        let result_type = self.result_type.clone()?;
        Some(Endpoint::SearchFields {
            data_portal: self.data_portal,
            format: self.format,
            result_type,
        })
    }

    pub fn return_fields_endpoint(&self) -> Option<Endpoint> {
        let result_type = self.result_type.clone()?;
        Some(Endpoint::ReturnFields {
            data_portal: self.data_portal,
            format: self.format,
            result_type,
        })
    }

    /// The paged search backing the results table.
    pub fn search_endpoint(&self) -> Option<Endpoint> {
        self.search_request(Some(self.page_size)).map(Endpoint::Search)
    }

    /// The search without a limit, as shown to and copied by the user.
    pub fn share_endpoint(&self) -> Option<Endpoint> {
        self.search_request(None).map(Endpoint::Search)
    }

    fn search_request(&self, limit: Option<usize>) -> Option<SearchRequest> {
        let result_type = self.result_type.clone()?;
        Some(SearchRequest {
            result_type,
            data_portal: self.data_portal,
            format: self.format,
            limit,
            query: self.queries.clone(),
            fields: self.return_fields.iter().cloned().collect(),
        })
    }

    fn reset_below_result_type(&mut self) {
        self.queries = None;
        self.return_fields.clear();
        self.page_size = INITIAL_PAGE_SIZE;
    }

    fn reset_below_format(&mut self) {
        self.result_type = None;
        self.reset_below_result_type();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SetDataPortal(DataPortal),
    SetFormat(Format),
    SetResultType(String),
    SetQueries(Option<String>),
    ToggleReturnField(String),
    SetReturnFields(BTreeSet<String>),
    LoadMore,
    ClearCache,
    /// Re-apply the persisted global state; a no-op when nothing differs.
    Restore(AppState),
}

/// Fetched views that are stale after a transition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Invalidation {
    pub result_types: bool,
    pub search_fields: bool,
    pub return_field_catalog: bool,
    pub results: bool,
}

impl Invalidation {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            result_types: true,
            search_fields: true,
            return_field_catalog: true,
            results: true,
        }
    }

    pub fn below_result_type() -> Self {
        Self {
            result_types: false,
            search_fields: true,
            return_field_catalog: true,
            results: true,
        }
    }

    pub fn results_only() -> Self {
        Self {
            results: true,
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::none()
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            result_types: self.result_types || other.result_types,
            search_fields: self.search_fields || other.search_fields,
            return_field_catalog: self.return_field_catalog || other.return_field_catalog,
            results: self.results || other.results,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: SelectionState,
    pub invalidated: Invalidation,
}

pub fn reduce(current: &SelectionState, action: &Action) -> Transition {
    let mut state = current.clone();
    let invalidated = match action {
        Action::SetDataPortal(portal) => {
            state.data_portal = *portal;
            state.reset_below_format();
            Invalidation::all()
        }
        Action::SetFormat(format) => {
            state.format = *format;
            state.reset_below_format();
            Invalidation::all()
        }
        Action::SetResultType(result_type) => {
            state.result_type = Some(result_type.clone());
            state.reset_below_result_type();
            Invalidation::below_result_type()
        }
        Action::SetQueries(queries) => {
            state.queries = queries.clone().filter(|query| !query.trim().is_empty());
            Invalidation::results_only()
        }
        Action::ToggleReturnField(field) => {
            if !state.return_fields.remove(field) {
                state.return_fields.insert(field.clone());
            }
            Invalidation::results_only()
        }
        Action::SetReturnFields(fields) => {
            state.return_fields = fields.clone();
            Invalidation::results_only()
        }
        Action::LoadMore => {
            state.page_size = state.page_size.saturating_add(PAGE_SIZE_STEP);
            Invalidation::results_only()
        }
        Action::ClearCache => Invalidation::all(),
        Action::Restore(app) => {
            if state.data_portal == app.data_portal && state.format == app.format {
                Invalidation::none()
            } else {
                state.data_portal = app.data_portal;
                state.format = app.format;
                state.reset_below_format();
                Invalidation::all()
            }
        }
    };
    Transition { state, invalidated }
}

/// Checks the current result type against a freshly loaded catalog. An
/// invalid or missing result type falls back to [`DEFAULT_RESULT_TYPE`] when
/// the catalog offers it, and is left unset otherwise.
pub fn reconcile_result_type(current: &SelectionState, valid: &[String]) -> Transition {
    let still_valid = current
        .result_type
        .as_ref()
        .is_some_and(|result_type| valid.contains(result_type));
    if still_valid {
        return Transition {
            state: current.clone(),
            invalidated: Invalidation::none(),
        };
    }

    let fallback = valid
        .iter()
        .any(|result_type| result_type == DEFAULT_RESULT_TYPE)
        .then(|| DEFAULT_RESULT_TYPE.to_string());

    match fallback {
        Some(result_type) => reduce(current, &Action::SetResultType(result_type)),
        None if current.result_type.is_none() => Transition {
            state: current.clone(),
            invalidated: Invalidation::none(),
        },
        None => {
            let mut state = current.clone();
            state.reset_below_format();
            Transition {
                state,
                invalidated: Invalidation::below_result_type(),
            }
        }
    }
}

/// Joins the non-blank `field=value` pairs with ` AND `, in the order given.
/// Returns `None` when every value is blank.
pub fn build_query<'a, I>(pairs: I) -> Option<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let clauses = pairs
        .into_iter()
        .filter_map(|(field, value)| {
            let value = value.trim();
            (!value.is_empty()).then(|| format!("{field}={value}"))
        })
        .collect::<Vec<_>>();
    (!clauses.is_empty()).then(|| clauses.join(" AND "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_omits_blank_fields() {
        let query = build_query([("A", "x"), ("B", ""), ("C", "y")]);
        assert_eq!(query.as_deref(), Some("A=x AND C=y"));
    }

    #[test]
    fn query_unset_when_all_blank() {
        assert_eq!(build_query([("A", ""), ("B", "  ")]), None);
    }

    #[test]
    fn union_is_fieldwise_or() {
        let merged = Invalidation::results_only().union(Invalidation::below_result_type());
        assert_eq!(merged, Invalidation::below_result_type());
        assert!(Invalidation::none().is_empty());
    }
}
