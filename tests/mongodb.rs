use std::{sync::Arc, time::Duration};

use assert_cmd::Command;
use bson::{Bson, Document, doc};
use color_eyre::Result;
use mongomate::{
    browse::{BrowseSession, BrowseSettings, Confirmation, EditOutcome},
    store::{ConnectOptions, DocumentStore, MongoStore, Namespace},
};
use predicates::prelude::*;
use testcontainers::{
    ContainerAsync, GenericImage, ImageExt,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};

#[allow(dead_code)]
struct MongoEnv {
    container: ContainerAsync<GenericImage>,
    uri: String,
}

async fn new_mongo_env() -> Result<MongoEnv> {
    let container = GenericImage::new("mongo", "7.0")
        .with_exposed_port(27017.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Waiting for connections"))
        .with_startup_timeout(Duration::from_secs(120))
        .start()
        .await
        .expect("Failed to start MongoDB");
    let port = container.get_host_port_ipv4(27017).await?;
    Ok(MongoEnv {
        container,
        uri: format!("mongodb://127.0.0.1:{port}/"),
    })
}

async fn connect(uri: &str) -> Result<MongoStore> {
    let options = ConnectOptions {
        uri: uri.to_string(),
        ..ConnectOptions::default()
    };
    Ok(MongoStore::connect(&options).await?)
}

async fn seed(uri: &str, namespace: &Namespace, documents: Vec<Document>) -> Result<()> {
    let client = mongodb::Client::with_uri_str(uri).await?;
    client
        .database(&namespace.database)
        .collection::<Document>(&namespace.collection)
        .insert_many(documents)
        .await?;
    Ok(())
}

fn sensors() -> Vec<Document> {
    vec![
        doc! { "_id": { "id": "d1", "type": "Sensor" }, "value": 10 },
        doc! { "_id": { "id": "d2", "type": "Sensor" }, "value": 20 },
        doc! { "_id": { "id": "d3", "type": "Sensor" }, "value": 30, "attrs": { "unit": "C" } },
    ]
}

#[tokio::test]
async fn list_databases_and_collections() {
    let env = new_mongo_env().await.unwrap();
    seed(&env.uri, &Namespace::new("iot", "entities"), sensors())
        .await
        .unwrap();
    seed(&env.uri, &Namespace::new("iot", "devices"), vec![doc! { "_id": 1 }])
        .await
        .unwrap();

    let stdout = Command::cargo_bin("mongomate")
        .unwrap()
        .args(["--uri", &env.uri, "list-databases", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: serde_json::Value = serde_json::from_slice(&stdout).expect("output is valid JSON");
    let names: Vec<&str> = parsed
        .as_array()
        .expect("expected top-level JSON array")
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert!(names.contains(&"iot"), "missing iot in {names:?}");

    let store = connect(&env.uri).await.unwrap();
    let collections = store.list_collections("iot").await.unwrap();
    assert_eq!(collections, vec!["devices", "entities"]);
}

#[tokio::test]
async fn find_prints_a_sorted_page() {
    let env = new_mongo_env().await.unwrap();
    seed(&env.uri, &Namespace::new("iot", "entities"), sensors())
        .await
        .unwrap();

    let stdout = Command::cargo_bin("mongomate")
        .unwrap()
        .args([
            "--uri",
            &env.uri,
            "--page-size",
            "1",
            "find",
            "iot",
            "entities",
            "--sort",
            "value",
            "--desc",
            "--json",
        ])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let parsed: serde_json::Value = serde_json::from_slice(&stdout).expect("output is valid JSON");
    let documents = parsed.as_array().expect("expected top-level JSON array");
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0]["_id"]["id"], "d3");

    Command::cargo_bin("mongomate")
        .unwrap()
        .args(["--uri", &env.uri, "find", "iot", "entities", "--filter", "value >= 20"])
        .assert()
        .success()
        .stdout(predicate::str::contains("value"))
        .stdout(predicate::str::contains(r#""d1""#).not());

    Command::cargo_bin("mongomate")
        .unwrap()
        .args(["--uri", &env.uri, "find", "iot", "entities", "--filter", "value > 1000"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("No documents"));
}

#[tokio::test]
async fn session_edits_and_deletes_through_the_server() {
    let env = new_mongo_env().await.unwrap();
    let namespace = Namespace::new("iot", "entities");
    seed(&env.uri, &namespace, sensors()).await.unwrap();

    let store: Arc<dyn DocumentStore> = Arc::new(connect(&env.uri).await.unwrap());
    let mut session = BrowseSession::new(
        store.clone(),
        namespace.clone(),
        Arc::new(BrowseSettings::default()),
    );
    session.load().await.unwrap();
    let key = session.page().rows[0].key.clone();

    let editor = session.open_field_editor(&key, "value").await.unwrap();
    let outcome = session.submit_field_edit(&editor, "42").await.unwrap();
    assert_eq!(outcome, EditOutcome::Updated);
    let stored = store
        .find_one(&namespace, &doc! { "_id.id": "d1" })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.get("value"), Some(&Bson::Int32(42)));

    let outcome = session.submit_field_edit(&editor, "42").await.unwrap();
    assert_eq!(outcome, EditOutcome::Unchanged);

    session
        .delete_document(&key, Confirmation::Confirmed)
        .await
        .unwrap();
    assert_eq!(session.page().len(), 2);
}

#[tokio::test]
async fn malformed_operator_filter_is_a_filter_error() {
    let env = new_mongo_env().await.unwrap();
    let namespace = Namespace::new("iot", "entities");
    seed(&env.uri, &namespace, sensors()).await.unwrap();

    let store: Arc<dyn DocumentStore> = Arc::new(connect(&env.uri).await.unwrap());
    let mut session = BrowseSession::new(store, namespace, Arc::new(BrowseSettings::default()));
    session.load().await.unwrap();
    let err = session
        .set_filter(r#"{"value": {"$bogus": 1}}"#)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), mongomate::browse::ErrorKind::FilterParseError);
    assert_eq!(session.page().len(), 3);
}
