use std::collections::BTreeSet;

use ena_portal_browser::domain::{AppState, DataPortal, Format};
use ena_portal_browser::endpoint::Endpoint;
use ena_portal_browser::selection::{
    Action, DEFAULT_RESULT_TYPE, INITIAL_PAGE_SIZE, Invalidation, PAGE_SIZE_STEP, SelectionState,
    build_query, reconcile_result_type, reduce,
};

fn populated(portal: DataPortal, format: Format) -> SelectionState {
    let mut state = SelectionState::new(AppState {
        data_portal: portal,
        format,
    });
    state.result_type = Some("read_run".to_string());
    state.queries = Some("tax_id=9606".to_string());
    state.return_fields = BTreeSet::from(["run_accession".to_string()]);
    state.page_size = 75;
    state
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn portal_and_format_changes_reset_downstream() {
    for portal in DataPortal::ALL {
        for format in Format::ALL {
            let start = populated(DataPortal::Ena, Format::Tsv);

            let by_portal = reduce(&start, &Action::SetDataPortal(portal));
            let by_format = reduce(&start, &Action::SetFormat(format));

            for transition in [&by_portal, &by_format] {
                assert_eq!(transition.state.result_type, None);
                assert_eq!(transition.state.queries, None);
                assert!(transition.state.return_fields.is_empty());
                assert_eq!(transition.state.page_size, INITIAL_PAGE_SIZE);
                assert_eq!(transition.invalidated, Invalidation::all());
            }
            assert_eq!(by_portal.state.data_portal, portal);
            assert_eq!(by_portal.state.format, Format::Tsv);
            assert_eq!(by_format.state.format, format);
            assert_eq!(by_format.state.data_portal, DataPortal::Ena);
        }
    }
}

#[test]
fn result_type_change_keeps_portal_and_format() {
    for result_type in ["study", "sample", "read_run", "no_such_type"] {
        let start = populated(DataPortal::Metagenome, Format::Json);
        let transition = reduce(&start, &Action::SetResultType(result_type.to_string()));

        assert_eq!(transition.state.result_type.as_deref(), Some(result_type));
        assert_eq!(transition.state.data_portal, DataPortal::Metagenome);
        assert_eq!(transition.state.format, Format::Json);
        assert_eq!(transition.state.queries, None);
        assert!(transition.state.return_fields.is_empty());
        assert_eq!(transition.state.page_size, INITIAL_PAGE_SIZE);
        assert!(!transition.invalidated.result_types);
        assert!(transition.invalidated.search_fields);
        assert!(transition.invalidated.return_field_catalog);
        assert!(transition.invalidated.results);
    }
}

#[test]
fn queries_and_fields_only_touch_results() {
    let start = populated(DataPortal::Ena, Format::Tsv);

    let queried = reduce(&start, &Action::SetQueries(Some("country=Norway".to_string())));
    assert_eq!(queried.state.queries.as_deref(), Some("country=Norway"));
    assert_eq!(queried.state.return_fields, start.return_fields);
    assert_eq!(queried.state.page_size, start.page_size);
    assert_eq!(queried.invalidated, Invalidation::results_only());

    let toggled = reduce(&start, &Action::ToggleReturnField("sample_accession".to_string()));
    assert_eq!(toggled.state.return_fields.len(), 2);
    assert_eq!(toggled.state.queries, start.queries);
    let untoggled = reduce(
        &toggled.state,
        &Action::ToggleReturnField("sample_accession".to_string()),
    );
    assert_eq!(untoggled.state.return_fields, start.return_fields);
    assert_eq!(untoggled.invalidated, Invalidation::results_only());
}

#[test]
fn blank_queries_are_unset() {
    let start = populated(DataPortal::Ena, Format::Tsv);
    let transition = reduce(&start, &Action::SetQueries(Some(String::new())));
    assert_eq!(transition.state.queries, None);
}

#[test]
fn load_more_grows_page_and_url() {
    let mut state = populated(DataPortal::Ena, Format::Tsv);
    let mut seen_urls = BTreeSet::new();
    seen_urls.insert(state.search_endpoint().unwrap().url("https://portal.test/"));

    for _ in 0..5 {
        let before = state.page_size;
        let transition = reduce(&state, &Action::LoadMore);
        assert_eq!(transition.state.page_size, before + PAGE_SIZE_STEP);
        assert_eq!(transition.invalidated, Invalidation::results_only());
        state = transition.state;
        let url = state.search_endpoint().unwrap().url("https://portal.test/");
        assert!(seen_urls.insert(url), "load more must produce a new URL");
    }
}

#[test]
fn restore_is_noop_when_state_matches() {
    let start = populated(DataPortal::Faang, Format::Json);
    let same = reduce(
        &start,
        &Action::Restore(AppState {
            data_portal: DataPortal::Faang,
            format: Format::Json,
        }),
    );
    assert_eq!(same.state, start);
    assert!(same.invalidated.is_empty());

    let changed = reduce(&start, &Action::Restore(AppState::default()));
    assert_eq!(changed.state.data_portal, DataPortal::Ena);
    assert_eq!(changed.state.result_type, None);
    assert_eq!(changed.invalidated, Invalidation::all());
}

#[test]
fn clear_cache_keeps_transient_selections() {
    let start = populated(DataPortal::Ena, Format::Tsv);
    let transition = reduce(&start, &Action::ClearCache);
    assert_eq!(transition.state, start);
    assert_eq!(transition.invalidated, Invalidation::all());
}

#[test]
fn reconcile_keeps_valid_result_type() {
    let start = populated(DataPortal::Ena, Format::Tsv);
    let transition = reconcile_result_type(&start, &ids(&["study", "read_run"]));
    assert_eq!(transition.state, start);
    assert!(transition.invalidated.is_empty());
}

#[test]
fn reconcile_falls_back_to_default_when_offered() {
    let start = populated(DataPortal::Ena, Format::Tsv);
    let transition = reconcile_result_type(&start, &ids(&["study", "sample"]));
    assert_eq!(transition.state.result_type.as_deref(), Some(DEFAULT_RESULT_TYPE));
    assert_eq!(transition.state.queries, None);
    assert!(transition.state.return_fields.is_empty());
    assert_eq!(transition.state.page_size, INITIAL_PAGE_SIZE);
    assert_eq!(transition.invalidated, Invalidation::below_result_type());
}

#[test]
fn reconcile_clears_when_default_is_not_offered() {
    let start = populated(DataPortal::Pathogen, Format::Tsv);
    let transition = reconcile_result_type(&start, &ids(&["sequence"]));
    assert_eq!(transition.state.result_type, None);
    assert_eq!(transition.state.queries, None);
    assert_eq!(transition.invalidated, Invalidation::below_result_type());

    let unset = reconcile_result_type(&transition.state, &ids(&["sequence"]));
    assert_eq!(unset.state.result_type, None);
    assert!(unset.invalidated.is_empty());
}

#[test]
fn endpoints_require_result_type() {
    let state = SelectionState::new(AppState::default());
    assert!(state.search_endpoint().is_none());
    assert!(state.search_fields_endpoint().is_none());
    assert_eq!(
        state.results_endpoint(),
        Endpoint::Results {
            data_portal: DataPortal::Ena,
            format: Format::Tsv,
        }
    );
}

#[test]
fn query_follows_declared_field_order() {
    let query = build_query([("A", "x"), ("B", ""), ("C", "y")]);
    assert_eq!(query.as_deref(), Some("A=x AND C=y"));

    let reversed = build_query([("C", "y"), ("B", ""), ("A", "x")]);
    assert_eq!(reversed.as_deref(), Some("C=y AND A=x"));
}
