use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use assert_matches::assert_matches;

use ena_portal_browser::cache::{DataService, MemoryResponseCache, ResponseCache};
use ena_portal_browser::domain::{AppState, DataPortal, Format};
use ena_portal_browser::error::PortalError;
use ena_portal_browser::fetcher::{PortalClient, RawResponse};
use ena_portal_browser::selection::{Action, INITIAL_PAGE_SIZE, PAGE_SIZE_STEP};
use ena_portal_browser::session::{Session, Views};
use ena_portal_browser::state_store::{AppStateStore, MemoryAppStateStore};

const PREFIX: &str = "https://portal.test/api/";

/// Serves a small fake portal API; pathogen offers no `study` result type.
#[derive(Default)]
struct MockPortal {
    calls: Mutex<Vec<String>>,
    offline: AtomicBool,
    status: AtomicU16,
}

impl MockPortal {
    fn new() -> Arc<Self> {
        let portal = Self::default();
        portal.status.store(200, Ordering::SeqCst);
        Arc::new(portal)
    }

    fn count(&self, needle: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.contains(needle))
            .count()
    }

    fn total(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl PortalClient for MockPortal {
    fn get(&self, url: &str) -> Result<RawResponse, PortalError> {
        self.calls.lock().unwrap().push(url.to_string());
        if self.offline.load(Ordering::SeqCst) {
            return Err(PortalError::Http("connection refused".to_string()));
        }
        Ok(RawResponse {
            status: self.status.load(Ordering::SeqCst),
            body: body_for(url),
        })
    }
}

fn body_for(url: &str) -> String {
    if url.contains("/results?") {
        if url.contains("dataPortal=pathogen") {
            return "resultId\tdescription\nsequence\tSequences\nread_run\tRuns\n".to_string();
        }
        return "resultId\tdescription\nstudy\tStudies\nread_run\tRuns\nsample\tSamples\n"
            .to_string();
    }
    if url.contains("/searchFields?") {
        return "columnId\tdescription\nstudy_accession\tAccession\ntax_id\tTaxon\ncountry\tCountry\n"
            .to_string();
    }
    if url.contains("/returnFields?") {
        return "columnId\tdescription\nstudy_accession\tAccession\nstudy_title\tTitle\ncenter_name\tCenter\n"
            .to_string();
    }
    if url.contains("/search?") {
        let limit = url
            .split("limit=")
            .nth(1)
            .map(|rest| rest.chars().take_while(char::is_ascii_digit).collect::<String>())
            .and_then(|digits| digits.parse::<usize>().ok())
            .unwrap_or(0);
        let mut body = String::from("study_accession\tstudy_title\n");
        for index in 0..limit.min(60) {
            body.push_str(&format!("PRJEB{index}\tStudy {index}\n"));
        }
        return body;
    }
    String::new()
}

type TestSession = Session<Arc<MockPortal>, MemoryResponseCache, MemoryAppStateStore>;

fn start(portal: &Arc<MockPortal>, app: AppState) -> TestSession {
    let service = DataService::new(PREFIX, portal.clone(), MemoryResponseCache::new());
    Session::start(service, MemoryAppStateStore::new(app)).unwrap()
}

#[test]
fn startup_defaults_to_study() {
    let portal = MockPortal::new();
    let session = start(&portal, AppState::default());

    let selection = session.selection();
    assert_eq!(selection.result_type.as_deref(), Some("study"));
    assert_eq!(selection.page_size, INITIAL_PAGE_SIZE);
    assert_eq!(session.result_type_ids(), vec!["study", "read_run", "sample"]);
    assert_eq!(
        session.search_field_ids(),
        vec!["study_accession", "tax_id", "country"]
    );
    assert_eq!(session.return_field_ids().len(), 3);

    let results = session.views().results.as_ref().unwrap();
    assert_eq!(results.data.row_count(), 25);
    assert_eq!(portal.total(), 4);
}

#[test]
fn portal_change_resets_and_persists() {
    let portal = MockPortal::new();
    let mut session = start(&portal, AppState::default());
    session
        .dispatch(Action::SetResultType("read_run".to_string()))
        .unwrap();
    session.submit_query([("tax_id", "9606")]).unwrap();
    session
        .dispatch(Action::ToggleReturnField("study_title".to_string()))
        .unwrap();
    session.dispatch(Action::LoadMore).unwrap();

    session
        .dispatch(Action::SetDataPortal(DataPortal::Metagenome))
        .unwrap();

    let selection = session.selection();
    assert_eq!(selection.data_portal, DataPortal::Metagenome);
    assert_eq!(selection.format, Format::Tsv);
    assert_eq!(selection.result_type.as_deref(), Some("study"));
    assert_eq!(selection.queries, None);
    assert!(selection.return_fields.is_empty());
    assert_eq!(selection.page_size, INITIAL_PAGE_SIZE);
    assert_eq!(
        session.store().read().unwrap().data_portal,
        DataPortal::Metagenome
    );
    assert_eq!(portal.count("dataPortal=metagenome"), 4);
}

#[test]
fn pathogen_without_study_leaves_result_type_unset() {
    let portal = MockPortal::new();
    let mut session = start(&portal, AppState::default());
    assert_eq!(session.selection().result_type.as_deref(), Some("study"));

    session
        .dispatch(Action::SetDataPortal(DataPortal::Pathogen))
        .unwrap();

    assert_eq!(session.selection().result_type, None);
    assert!(session.views().results.is_none());
    assert!(session.search_field_ids().is_empty());
    assert_eq!(session.result_type_ids(), vec!["sequence", "read_run"]);
    assert!(session.share_url().is_none());

    session
        .dispatch(Action::SetResultType("sequence".to_string()))
        .unwrap();
    assert!(session.views().results.is_some());
}

#[test]
fn format_change_keeps_portal() {
    let portal = MockPortal::new();
    let mut session = start(
        &portal,
        AppState {
            data_portal: DataPortal::Faang,
            format: Format::Tsv,
        },
    );
    session.dispatch(Action::SetFormat(Format::Json)).unwrap();

    assert_eq!(session.selection().data_portal, DataPortal::Faang);
    assert_eq!(session.selection().format, Format::Json);
    assert_eq!(session.store().read().unwrap().format, Format::Json);
}

#[test]
fn load_more_refetches_with_larger_limit() {
    let portal = MockPortal::new();
    let mut session = start(&portal, AppState::default());

    for round in 1..=3 {
        let searches_before = portal.count("/search?");
        session.dispatch(Action::LoadMore).unwrap();
        let expected = INITIAL_PAGE_SIZE + round * PAGE_SIZE_STEP;
        assert_eq!(session.selection().page_size, expected);
        assert_eq!(portal.count("/search?"), searches_before + 1);
        assert!(
            session
                .search_url()
                .unwrap()
                .contains(&format!("limit={expected}"))
        );
    }
    let rows = session.views().results.as_ref().unwrap().data.row_count();
    assert_eq!(rows, 60);
}

#[test]
fn repeated_query_is_served_from_cache() {
    let portal = MockPortal::new();
    let mut session = start(&portal, AppState::default());

    session
        .submit_query([("study_accession", "PRJEB1"), ("tax_id", ""), ("country", "Norway")])
        .unwrap();
    assert_eq!(
        session.selection().queries.as_deref(),
        Some("study_accession=PRJEB1 AND country=Norway")
    );
    let first = session.views().results.clone();

    session.submit_query([("tax_id", "")]).unwrap();
    assert_eq!(session.selection().queries, None);

    session
        .submit_query([("study_accession", "PRJEB1"), ("country", "Norway")])
        .unwrap();
    assert_eq!(session.views().results, first);
    assert_eq!(portal.count("AND country=Norway"), 1);
}

#[test]
fn clear_cache_refetches_once_and_keeps_selections() {
    let portal = MockPortal::new();
    let mut session = start(&portal, AppState::default());
    session.submit_query([("tax_id", "9606")]).unwrap();
    session
        .dispatch(Action::ToggleReturnField("center_name".to_string()))
        .unwrap();
    let before = session.views().results.clone().unwrap();
    let url = session.search_url().unwrap();
    let fetched_before = portal.count(&url);

    thread::sleep(Duration::from_millis(5));
    session.dispatch(Action::ClearCache).unwrap();

    let after = session.views().results.clone().unwrap();
    assert_eq!(portal.count(&url), fetched_before + 1);
    assert!(after.cached_at > before.cached_at);
    assert_eq!(session.selection().queries.as_deref(), Some("tax_id=9606"));
    assert_eq!(
        session.selection().return_fields,
        BTreeSet::from(["center_name".to_string()])
    );
    assert!(session.service().cache().get(&url).is_some());
}

#[test]
fn select_all_uses_whole_catalog() {
    let portal = MockPortal::new();
    let mut session = start(&portal, AppState::default());
    session.select_all_return_fields().unwrap();

    assert_eq!(session.selection().return_fields.len(), 3);
    let url = session.search_url().unwrap();
    assert!(url.ends_with("&fields=center_name,study_accession,study_title"));
    assert!(!session.share_url().unwrap().contains("limit="));
}

#[test]
fn transport_failure_leaves_state_unchanged() {
    let portal = MockPortal::new();
    let mut session = start(&portal, AppState::default());
    let selection = session.selection().clone();
    let views = session.views().clone();

    portal.offline.store(true, Ordering::SeqCst);
    let err = session.dispatch(Action::LoadMore).unwrap_err();
    assert_matches!(err, PortalError::Http(_));

    let err = session
        .dispatch(Action::SetDataPortal(DataPortal::Metagenome))
        .unwrap_err();
    assert!(err.is_transport());

    assert_eq!(session.selection(), &selection);
    assert_eq!(session.views(), &views);
    assert_eq!(session.store().read().unwrap().data_portal, DataPortal::Ena);

    portal.offline.store(false, Ordering::SeqCst);
    session.dispatch(Action::LoadMore).unwrap();
    assert_eq!(session.selection().page_size, INITIAL_PAGE_SIZE + PAGE_SIZE_STEP);
}

#[test]
fn error_status_surfaces_without_caching() {
    let portal = MockPortal::new();
    let mut session = start(&portal, AppState::default());
    let cached = session.service().cache().len();

    portal.status.store(500, Ordering::SeqCst);
    let err = session.dispatch(Action::LoadMore).unwrap_err();
    assert_matches!(err, PortalError::Status { status: 500, .. });
    assert_eq!(session.service().cache().len(), cached);
    assert_eq!(session.selection().page_size, INITIAL_PAGE_SIZE);
}

#[test]
fn offline_startup_keeps_session_open() {
    let portal = MockPortal::new();
    portal.offline.store(true, Ordering::SeqCst);
    let mut session = start(&portal, AppState::default());

    assert_eq!(session.views(), &Views::default());
    assert_eq!(session.selection().result_type, None);
    assert_matches!(session.take_startup_error(), Some(PortalError::Http(_)));
    assert!(session.take_startup_error().is_none());

    portal.offline.store(false, Ordering::SeqCst);
    session.dispatch(Action::LoadMore).unwrap();
    assert_eq!(session.selection().result_type.as_deref(), Some("study"));
    assert_eq!(session.result_type_ids().len(), 3);
    assert!(session.views().results.is_some());
}

#[test]
fn rejected_stored_portal_still_opens() {
    let portal = MockPortal::new();
    portal.status.store(400, Ordering::SeqCst);
    let mut session = start(
        &portal,
        AppState {
            data_portal: DataPortal::Faang,
            format: Format::Json,
        },
    );
    assert_matches!(
        session.take_startup_error(),
        Some(PortalError::Status { status: 400, .. })
    );

    portal.status.store(200, Ordering::SeqCst);
    session
        .dispatch(Action::SetDataPortal(DataPortal::Ena))
        .unwrap();
    assert_eq!(session.store().read().unwrap().data_portal, DataPortal::Ena);
    assert!(session.views().results.is_some());
}
