use std::sync::Arc;

use bson::{Bson, Document, doc};
use mongomate::{
    browse::{
        BrowseError, BrowseSession, BrowseSettings, Confirmation, DeleteOutcome, EditOutcome,
        ErrorKind,
        IdentityResolver, RowKey, SortDirection, TablePage, compute_columns,
        table::ELLIPSIS,
    },
    store::{DocumentStore, MemoryStore, Namespace},
};

fn namespace() -> Namespace {
    Namespace::new("iot", "entities")
}

fn sensors() -> Vec<Document> {
    vec![
        doc! { "_id": { "id": "d1", "type": "Sensor" }, "value": 10 },
        doc! { "_id": { "id": "d2", "type": "Sensor" }, "value": 20 },
    ]
}

fn session(documents: Vec<Document>, settings: BrowseSettings) -> (Arc<MemoryStore>, BrowseSession) {
    let store = Arc::new(MemoryStore::new().with_documents(&namespace(), documents));
    let session = BrowseSession::new(store.clone(), namespace(), Arc::new(settings));
    (store, session)
}

fn row_key(session: &BrowseSession, index: usize) -> RowKey {
    session.page().rows[index].key.clone()
}

fn displayed_ids(page: &TablePage) -> Vec<String> {
    page.rows
        .iter()
        .map(|row| row.identity.display_id.clone())
        .collect()
}

#[tokio::test]
async fn sorted_pages_walk_composite_ids_in_order() {
    let (_, mut session) = session(sensors(), BrowseSettings::default().with_page_size(1));
    session.set_filter("{}").await.unwrap();
    session.toggle_sort("value").await.unwrap();
    let page = session.toggle_sort("value").await.unwrap();
    assert_eq!(
        page.documents(),
        &[doc! { "_id": { "id": "d2", "type": "Sensor" }, "value": 20 }]
    );

    let page = session.next_page().await.unwrap();
    assert_eq!(displayed_ids(page), vec!["d1"]);
    assert_eq!(session.state().page_index, 1);
}

#[tokio::test]
async fn numeric_field_edit_is_stored_as_a_number() {
    let (store, mut session) = session(sensors(), BrowseSettings::default());
    session.load().await.unwrap();
    let key = row_key(&session, 0);

    let editor = session.open_field_editor(&key, "value").await.unwrap();
    assert_eq!(editor.identity.predicate, doc! { "_id.id": "d1" });
    assert!(!editor.structured);

    let outcome = session.submit_field_edit(&editor, "42").await.unwrap();
    assert_eq!(outcome, EditOutcome::Updated);
    assert_eq!(store.documents(&namespace())[0].get("value"), Some(&Bson::Int32(42)));
    assert_eq!(session.page().rows[0].cells[1].text, "42");
}

#[tokio::test]
async fn replace_keeps_the_pinned_identifier() {
    let (store, mut session) = session(
        vec![doc! { "_id": "abc123", "name": "old" }],
        BrowseSettings::default(),
    );
    session.load().await.unwrap();
    let key = row_key(&session, 0);

    let editor = session.open_document_editor(&key).await.unwrap();
    assert_eq!(editor.pinned_id, Bson::String("abc123".to_string()));
    session
        .submit_document_replace(&editor, r#"{"_id": "other", "name": "new"}"#)
        .await
        .unwrap();

    assert_eq!(
        store.documents(&namespace()),
        vec![doc! { "_id": "abc123", "name": "new" }]
    );
}

#[tokio::test]
async fn deleting_a_vanished_document_reports_not_found_and_reloads() {
    let (store, mut session) = session(sensors(), BrowseSettings::default());
    session.load().await.unwrap();
    let key = row_key(&session, 0);

    // Removed by someone else after the page was shown.
    store
        .delete_one(&namespace(), &doc! { "_id.id": "d1" })
        .await
        .unwrap();

    let err = session
        .delete_document(&key, Confirmation::Confirmed)
        .await
        .unwrap_err();
    assert!(matches!(err, BrowseError::NotFound { .. }));
    assert_eq!(err.kind(), ErrorKind::NotFoundOnWrite);
    assert_eq!(displayed_ids(session.page()), vec!["d2"]);
    assert_eq!(store.documents(&namespace()).len(), 1);
}

#[tokio::test]
async fn declined_delete_leaves_the_collection_alone() {
    let (store, mut session) = session(sensors(), BrowseSettings::default());
    session.load().await.unwrap();
    let key = row_key(&session, 0);
    session
        .delete_document(&key, Confirmation::Declined)
        .await
        .unwrap();
    assert_eq!(store.documents(&namespace()).len(), 2);
}

#[tokio::test]
async fn toggling_sort_twice_restores_direction() {
    let (_, mut session) = session(sensors(), BrowseSettings::default());
    session.toggle_sort("value").await.unwrap();
    let first = session.state().sort.clone().unwrap();
    assert_eq!(first.direction, SortDirection::Ascending);

    session.toggle_sort("value").await.unwrap();
    session.toggle_sort("value").await.unwrap();
    let again = session.state().sort.clone().unwrap();
    assert_eq!(again, first);
    assert_eq!(displayed_ids(session.page()), vec!["d1", "d2"]);
}

#[tokio::test]
async fn next_then_prev_returns_to_the_same_page() {
    let documents: Vec<Document> = (0..7).map(|n| doc! { "_id": n, "n": n }).collect();
    let (_, mut session) = session(documents, BrowseSettings::default().with_page_size(3));
    session.load().await.unwrap();
    let before = session.next_page().await.unwrap().documents().to_vec();

    session.next_page().await.unwrap();
    let after = session.prev_page().await.unwrap().documents().to_vec();
    assert_eq!(session.state().page_index, 1);
    assert_eq!(after, before);
}

#[tokio::test]
async fn prev_on_the_first_page_keeps_the_page() {
    let (_, mut session) = session(sensors(), BrowseSettings::default());
    session.load().await.unwrap();
    let err = session.prev_page().await.unwrap_err();
    assert_eq!(err, BrowseError::AtFirstPage);
    assert_eq!(session.page().len(), 2);
}

#[tokio::test]
async fn bad_filter_keeps_the_previous_page() {
    let (_, mut session) = session(sensors(), BrowseSettings::default());
    session.load().await.unwrap();
    let err = session.set_filter("value >").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FilterParseError);
    assert_eq!(displayed_ids(session.page()), vec!["d1", "d2"]);
    assert_eq!(session.state().filter_text, "");
}

#[tokio::test]
async fn lone_token_filter_finds_composite_ids() {
    let (_, mut session) = session(sensors(), BrowseSettings::default());
    let page = session.set_filter("d2").await.unwrap();
    assert_eq!(displayed_ids(page), vec!["d2"]);
}

#[tokio::test]
async fn switching_collections_starts_from_a_clean_slate() {
    let readings = Namespace::new("iot", "readings");
    let store = Arc::new(
        MemoryStore::new()
            .with_documents(
                &namespace(),
                vec![
                    doc! { "_id": { "id": "d1", "type": "Sensor" }, "value": 1 },
                    doc! { "_id": { "id": "d1", "type": "Room" }, "value": 2 },
                    doc! { "_id": { "id": "d2", "type": "Sensor" }, "value": 3 },
                ],
            )
            .with_documents(
                &readings,
                vec![doc! { "_id": { "id": "d1", "type": "Sensor" }, "reading": 5.5 }],
            ),
    );
    let mut session = BrowseSession::new(
        store.clone(),
        namespace(),
        Arc::new(BrowseSettings::default().with_page_size(1)),
    );
    session.toggle_sort("value").await.unwrap();
    let key = row_key(&session, 0);
    let err = session
        .delete_document(&key, Confirmation::Confirmed)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConsistencyViolation);
    session.next_page().await.unwrap();
    assert_eq!(session.state().page_index, 1);
    assert!(session.state().sort.is_some());

    let page = session.set_collection(readings.clone()).await.unwrap();
    assert_eq!(page.columns, vec!["_id", "reading"]);
    assert_eq!(displayed_ids(page), vec!["d1"]);
    assert_eq!(session.state().page_index, 0);
    assert_eq!(session.state().sort, None);

    // Same `_id.id` predicate that was blocked in the previous collection.
    let key = row_key(&session, 0);
    let outcome = session
        .delete_document(&key, Confirmation::Confirmed)
        .await
        .unwrap();
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert!(store.documents(&readings).is_empty());
    assert_eq!(store.documents(&namespace()).len(), 3);
}

#[test]
fn column_order_ignores_document_order() {
    let documents = vec![
        doc! { "_id": 1, "zeta": 1 },
        doc! { "_id": 2, "alpha": 1, "mid": true },
        doc! { "_id": 3, "mid": false },
    ];
    let mut reversed = documents.clone();
    reversed.reverse();
    assert_eq!(
        compute_columns(&documents, "_id"),
        compute_columns(&reversed, "_id")
    );
    assert_eq!(
        compute_columns(&documents, "_id"),
        vec!["_id", "alpha", "mid", "zeta"]
    );
}

#[tokio::test]
async fn truncated_cells_fetch_the_full_value() {
    let attrs = doc! {
        "temperature": { "value": 21.5, "unit": "celsius" },
        "humidity": { "value": 40, "unit": "percent" },
    };
    let (_, mut session) = session(
        vec![doc! { "_id": "room-1", "attrs": attrs.clone() }],
        BrowseSettings::default().with_cell_width(24),
    );
    session.load().await.unwrap();
    let key = row_key(&session, 0);

    let cell = session.page().cell(&key, "attrs").unwrap().clone();
    assert!(cell.truncated);
    assert!(cell.text.chars().count() <= 24 + ELLIPSIS.len());

    let text = session.field_text(&key, "attrs").await.unwrap();
    let full = mongomate::document::from_text(&text).unwrap();
    assert_eq!(full, Bson::Document(attrs));
}

#[test]
fn composite_and_native_identities() {
    let resolver = IdentityResolver::default();
    let oid = bson::oid::ObjectId::new();
    let native = resolver.derive_identity(&doc! { "_id": oid });
    assert_eq!(native.display_id, oid.to_hex());
    assert_eq!(native.predicate, doc! { "_id": oid });

    let composite = resolver.derive_identity(&sensors()[0]);
    assert_eq!(composite.display_id, "d1");
    assert_eq!(composite.predicate, doc! { "_id.id": "d1" });
}
