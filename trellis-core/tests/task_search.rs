//! Searching the task list the way the search box does.

use serde_json::json;

use trellis_core::model::EntityId;
use trellis_core::query::{Search, SearchTerm};
use trellis_core::reactive::Collection;
use trellis_core::tasks;

fn bootstrapped() -> Collection {
    tasks::load(json!([
        {
            "id": 1,
            "title": "Anchors aweigh",
            "complete": true,
            "assigned_users": [{ "id": 123, "email": "alice@example.com" }]
        },
        {
            "id": 2,
            "title": "Swab the deck",
            "complete": false,
            "assigned_users": [{ "id": 456, "email": "bob@example.com" }]
        },
        {
            "id": 3,
            "title": "Hoist the colours"
        }
    ]))
}

fn ids(search: &Search) -> Vec<u64> {
    search
        .filtered()
        .ids()
        .into_iter()
        .filter_map(|id| match id {
            Some(EntityId::Int(id)) => Some(id),
            _ => None,
        })
        .collect()
}

fn run(search: &Search, category: &str, value: &str) -> Vec<u64> {
    search.search(&[SearchTerm::new(category, value)]);
    ids(search)
}

#[test]
fn every_task_is_visible_before_searching() {
    let search = tasks::search(&bootstrapped());
    assert_eq!(ids(&search), vec![1, 2, 3]);
}

#[test]
fn searches_titles_by_substring() {
    let search = tasks::search(&bootstrapped());

    assert_eq!(run(&search, "title", "a"), vec![1, 2]);
    assert_eq!(run(&search, "title", "Anchors"), vec![1]);
    assert_eq!(run(&search, "title", "anchors"), Vec::<u64>::new());
}

#[test]
fn searches_completion() {
    let search = tasks::search(&bootstrapped());

    assert_eq!(run(&search, "completed", "true"), vec![1]);
    assert_eq!(run(&search, "completed", "false"), vec![2, 3]);
    assert_eq!(run(&search, "completed", "yes"), Vec::<u64>::new());
}

#[test]
fn searches_assignee_emails() {
    let search = tasks::search(&bootstrapped());

    assert_eq!(run(&search, "assignees", "alice"), vec![1]);
    assert_eq!(run(&search, "assignees", "example"), vec![1, 2]);
}

#[test]
fn combines_terms_with_and() {
    let search = tasks::search(&bootstrapped());
    search.search(&[
        SearchTerm::new("assignees", "example"),
        SearchTerm::new("completed", "false"),
    ]);

    assert_eq!(ids(&search), vec![2]);
}

#[test]
fn unknown_categories_do_not_narrow() {
    let search = tasks::search(&bootstrapped());
    search.search(&[SearchTerm::new("priority", "high"), SearchTerm::new("title", "deck")]);

    assert_eq!(ids(&search), vec![2]);
}

#[test]
fn clearing_shows_everything_again() {
    let search = tasks::search(&bootstrapped());
    run(&search, "title", "deck");
    search.clear();

    assert_eq!(ids(&search), vec![1, 2, 3]);
}

#[test]
fn results_follow_task_edits() {
    let all = bootstrapped();
    let search = tasks::search(&all);
    run(&search, "completed", "true");

    let swab = all.get(&EntityId::from(2)).expect("task 2");
    swab.set([("complete", true)]);
    assert_eq!(ids(&search), vec![1, 2]);

    all.add(tasks::load(json!([{ "id": 4, "title": "Splice", "complete": true }]))
        .at(0)
        .expect("task 4"));
    assert_eq!(ids(&search), vec![1, 2, 4]);
}

#[test]
fn autocompletes_facets_and_values() {
    let search = tasks::search(&bootstrapped());

    assert_eq!(search.facet_matches(), vec!["title", "assignees", "completed"]);
    assert_eq!(
        search.value_matches("title"),
        vec!["Anchors aweigh", "Swab the deck", "Hoist the colours"]
    );
    assert_eq!(
        search.value_matches("assignees"),
        vec!["alice@example.com", "bob@example.com"]
    );
    assert_eq!(search.value_matches("completed"), vec!["true", "false"]);
    assert!(search.value_matches("priority").is_empty());
}

#[test]
fn value_matches_ignore_the_current_search() {
    let search = tasks::search(&bootstrapped());
    run(&search, "title", "Anchors");

    assert_eq!(search.value_matches("assignees").len(), 2);
}

#[test]
fn schema_loads_from_config() {
    let schema = trellis_core::QuerySchema::from_json(
        r#"{ "facets": [
            { "name": "title", "kind": "text", "field": "title" },
            { "name": "done", "kind": "boolean", "field": "complete" }
        ] }"#,
    )
    .expect("valid schema");
    let search = Search::new(bootstrapped(), schema);

    assert_eq!(run(&search, "done", "true"), vec![1]);
}

#[test]
fn teardown_keeps_the_last_results() {
    let all = bootstrapped();
    let search = tasks::search(&all);
    run(&search, "title", "deck");

    let results = search.teardown();
    all.reset(Vec::new());

    assert_eq!(results.len(), 1);
    assert_eq!(all.subscriber_count(), 0);
}
