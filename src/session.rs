use std::collections::BTreeSet;

use crate::cache::{CachedDataset, DataService, ResponseCache};
use crate::dataset::Dataset;
use crate::domain::StateUpdate;
use crate::error::PortalError;
use crate::fetcher::PortalClient;
use crate::selection::{
    Action, Invalidation, SelectionState, Transition, build_query, reconcile_result_type, reduce,
};
use crate::state_store::AppStateStore;

pub const RESULT_ID_COLUMN: &str = "resultId";
pub const COLUMN_ID_COLUMN: &str = "columnId";

/// Data currently on screen, one entry per dependent selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Views {
    pub result_types: Dataset,
    pub search_fields: Dataset,
    pub return_field_catalog: Dataset,
    pub results: Option<CachedDataset>,
}

/// Couples the selection chain with the response cache and the persisted
/// global state. Every action either commits fully or leaves the session as
/// it was.
pub struct Session<C, R, S> {
    service: DataService<C, R>,
    store: S,
    selection: SelectionState,
    views: Views,
    startup_error: Option<PortalError>,
    loaded: bool,
}

impl<C, R, S> Session<C, R, S>
where
    C: PortalClient,
    R: ResponseCache,
    S: AppStateStore,
{
    /// Only a failing state store is fatal. A fetch error leaves the views
    /// empty and is kept for [`Session::take_startup_error`]; the next
    /// successful action fills them in.
    pub fn start(service: DataService<C, R>, store: S) -> Result<Self, PortalError> {
        let app = store.read()?;
        tracing::info!("starting session for {} ({})", app.data_portal, app.format);
        let mut session = Self {
            service,
            store,
            selection: SelectionState::new(app),
            views: Views::default(),
            startup_error: None,
            loaded: false,
        };
        let initial = Transition {
            state: session.selection.clone(),
            invalidated: Invalidation::all(),
        };
        match session.refresh(initial) {
            Ok((selection, views)) => {
                session.selection = selection;
                session.views = views;
                session.loaded = true;
            }
            Err(err) => {
                tracing::warn!("initial load failed: {err}");
                session.startup_error = Some(err);
            }
        }
        Ok(session)
    }

    pub fn take_startup_error(&mut self) -> Option<PortalError> {
        self.startup_error.take()
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn views(&self) -> &Views {
        &self.views
    }

    pub fn service(&self) -> &DataService<C, R> {
        &self.service
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn dispatch(&mut self, action: Action) -> Result<(), PortalError> {
        tracing::debug!("dispatch {action:?}");
        let transition = match &action {
            Action::ClearCache => {
                self.service.clear()?;
                let app = self.store.read()?;
                let cleared = reduce(&self.selection, &Action::ClearCache);
                let restored = reduce(&cleared.state, &Action::Restore(app));
                Transition {
                    state: restored.state,
                    invalidated: cleared.invalidated.union(restored.invalidated),
                }
            }
            other => reduce(&self.selection, other),
        };
        let transition = if self.loaded {
            transition
        } else {
            Transition {
                invalidated: Invalidation::all(),
                ..transition
            }
        };

        let (selection, views) = self.refresh(transition)?;

        match action {
            Action::SetDataPortal(portal) => {
                self.store.update(StateUpdate::DataPortal(portal))?;
            }
            Action::SetFormat(format) => {
                self.store.update(StateUpdate::Format(format))?;
            }
            _ => {}
        }

        self.selection = selection;
        self.views = views;
        self.loaded = true;
        Ok(())
    }

    /// Builds the query from form values in declared field order and applies it.
    pub fn submit_query<'a, I>(&mut self, pairs: I) -> Result<(), PortalError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        self.dispatch(Action::SetQueries(build_query(pairs)))
    }

    pub fn select_all_return_fields(&mut self) -> Result<(), PortalError> {
        let all = self.return_field_ids().into_iter().collect::<BTreeSet<_>>();
        self.dispatch(Action::SetReturnFields(all))
    }

    pub fn result_type_ids(&self) -> Vec<String> {
        self.views.result_types.column(RESULT_ID_COLUMN)
    }

    pub fn search_field_ids(&self) -> Vec<String> {
        self.views.search_fields.column(COLUMN_ID_COLUMN)
    }

    pub fn return_field_ids(&self) -> Vec<String> {
        self.views.return_field_catalog.column(COLUMN_ID_COLUMN)
    }

    /// URL of the paged search behind the results table.
    pub fn search_url(&self) -> Option<String> {
        self.selection
            .search_endpoint()
            .map(|endpoint| self.service.url(&endpoint))
    }

    /// URL of the current search without a page limit.
    pub fn share_url(&self) -> Option<String> {
        self.selection
            .share_endpoint()
            .map(|endpoint| self.service.url(&endpoint))
    }

    fn refresh(&mut self, transition: Transition) -> Result<(SelectionState, Views), PortalError> {
        let Transition {
            mut state,
            mut invalidated,
        } = transition;
        let mut views = self.views.clone();

        if invalidated.result_types {
            views.result_types = self.service.get(&state.results_endpoint(), true)?.data;
            let valid = views.result_types.column(RESULT_ID_COLUMN);
            let reconciled = reconcile_result_type(&state, &valid);
            if reconciled.state.result_type != state.result_type {
                tracing::info!(
                    "result type {:?} -> {:?} for {} ({})",
                    state.result_type,
                    reconciled.state.result_type,
                    state.data_portal,
                    state.format
                );
            }
            state = reconciled.state;
            invalidated = invalidated.union(reconciled.invalidated);
        }

        if invalidated.search_fields {
            views.search_fields = match state.search_fields_endpoint() {
                Some(endpoint) => self.service.get(&endpoint, true)?.data,
                None => Dataset::empty(),
            };
        }

        if invalidated.return_field_catalog {
            views.return_field_catalog = match state.return_fields_endpoint() {
                Some(endpoint) => self.service.get(&endpoint, true)?.data,
                None => Dataset::empty(),
            };
        }

        if invalidated.results {
            views.results = match state.search_endpoint() {
                Some(endpoint) => Some(self.service.get(&endpoint, true)?),
                None => None,
            };
        }

        Ok((state, views))
    }
}
