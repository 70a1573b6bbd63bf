use std::{
    collections::{HashMap, HashSet},
    time::Duration,
};

use pretty_assertions::assert_eq;

use crate::{
    bson::{doc, Bson, Document},
    bulk::BatchType,
    cmap::StreamDescription,
    error::{BulkWriteError, Error, ErrorKind, UNKNOWN_ERROR},
    options::{BulkOptions, WriteConcern},
    test::util::{statement_count, MockExecutor},
    Collection,
    Command,
};

fn description(max_write_batch_size: i64) -> StreamDescription {
    let mut description = StreamDescription::with_wire_version(25);
    description.max_write_batch_size = max_write_batch_size;
    description
}

fn collection(mock: &MockExecutor) -> Collection {
    mock.client().database("db").collection("coll")
}

fn acknowledge(command: &Command) -> crate::error::Result<Document> {
    Ok(doc! { "ok": 1, "n": statement_count(command) as i32 })
}

fn bulk_write_error(error: Error) -> BulkWriteError {
    match *error.kind {
        ErrorKind::BulkWrite(bulk_write_error) => bulk_write_error,
        other => panic!("expected a bulk write error, got {other:?}"),
    }
}

#[tokio::test]
async fn unordered_inserts_split_by_count() {
    let mock = MockExecutor::new()
        .with_description(description(1))
        .with_handler(acknowledge);
    let coll = collection(&mock);

    let mut bulk = coll.initialize_unordered_bulk_op(None);
    bulk.insert(doc! { "_id": 1, "a": 1 }).unwrap();
    bulk.insert(doc! { "_id": 2, "a": 2 }).unwrap();
    let result = bulk.execute().await.unwrap();

    assert_eq!(bulk.batches().len(), 2);
    assert!(bulk
        .batches()
        .iter()
        .all(|batch| batch.batch_type() == BatchType::Insert));
    assert!(result.is_ok());
    assert_eq!(result.n_inserted(), 2);
    assert_eq!(
        result.inserted_ids(),
        HashMap::from([(0, Bson::Int32(1)), (1, Bson::Int32(2))])
    );
    assert_eq!(mock.commands_named("insert").len(), 2);
}

#[tokio::test]
async fn batches_keep_original_indexes() {
    let mock = MockExecutor::new()
        .with_description(description(2))
        .with_handler(acknowledge);
    let coll = collection(&mock);

    let mut bulk = coll.initialize_ordered_bulk_op(None);
    for i in 0..5 {
        bulk.insert(doc! { "_id": i }).unwrap();
    }
    assert_eq!(bulk.len(), 5);
    let result = bulk.execute().await.unwrap();

    let sizes: Vec<_> = bulk.batches().iter().map(|batch| batch.len()).collect();
    let zero_indexes: Vec<_> = bulk
        .batches()
        .iter()
        .map(|batch| batch.original_zero_index())
        .collect();
    assert_eq!(sizes, vec![2, 2, 1]);
    assert_eq!(zero_indexes, vec![0, 2, 4]);
    assert_eq!(result.inserted_count(), 5);

    let sent: Vec<_> = mock.commands().iter().map(statement_count).collect();
    assert_eq!(sent, vec![2, 2, 1]);
}

fn fail_updates(command: &Command) -> crate::error::Result<Document> {
    match command.name() {
        "update" => Ok(doc! {
            "ok": 1,
            "n": 0,
            "nModified": 0,
            "writeErrors": [{ "index": 0, "code": 9, "errmsg": "bad update" }],
        }),
        _ => acknowledge(command),
    }
}

fn add_insert_update_insert(coll: &Collection, ordered: bool) -> crate::bulk::BulkOperation {
    let mut bulk = if ordered {
        coll.initialize_ordered_bulk_op(None)
    } else {
        coll.initialize_unordered_bulk_op(None)
    };
    bulk.insert(doc! { "_id": 1 }).unwrap();
    bulk.find(doc! { "_id": 1 })
        .unwrap()
        .update_one(doc! { "$set": { "x": 1 } })
        .unwrap();
    bulk.insert(doc! { "_id": 2 }).unwrap();
    bulk
}

#[tokio::test]
async fn ordered_stops_at_first_write_error() {
    let mock = MockExecutor::new().with_handler(fail_updates);
    let coll = collection(&mock);

    let mut bulk = add_insert_update_insert(&coll, true);
    let error = bulk_write_error(bulk.execute().await.unwrap_err());

    assert_eq!(error.code, 9);
    assert_eq!(error.message, "bad update");
    assert_eq!(error.write_errors.len(), 1);
    assert_eq!(error.write_errors[0].index, 1);
    assert_eq!(
        error.write_errors[0].op,
        Some(doc! { "q": { "_id": 1 }, "u": { "$set": { "x": 1 } }, "multi": false, "upsert": false })
    );

    // the last insert is never sent, so its id is not reported
    assert_eq!(error.result.n_inserted(), 1);
    assert_eq!(
        error.result.inserted_ids(),
        HashMap::from([(0, Bson::Int32(1))])
    );
    let names: Vec<_> = mock
        .commands()
        .iter()
        .map(|command| command.name().to_string())
        .collect();
    assert_eq!(names, vec!["insert", "update"]);
}

#[tokio::test]
async fn unordered_aggregates_every_batch() {
    let mock = MockExecutor::new().with_handler(fail_updates);
    let coll = collection(&mock);

    let mut bulk = add_insert_update_insert(&coll, false);
    let error = bulk_write_error(bulk.execute().await.unwrap_err());

    assert_eq!(error.write_errors.len(), 1);
    assert_eq!(error.write_errors[0].index, 1);
    assert_eq!(error.result.n_inserted(), 2);
    assert_eq!(
        error.result.inserted_ids(),
        HashMap::from([(0, Bson::Int32(1)), (2, Bson::Int32(2))])
    );
    assert_eq!(mock.commands_named("insert").len(), 1);
    assert_eq!(mock.commands_named("update").len(), 1);
}

#[tokio::test]
async fn results_reference_original_indexes() {
    let mock = MockExecutor::new()
        .with_description(description(2))
        .with_handler(|command| match command.name() {
            "update" => Ok(doc! {
                "ok": 1,
                "n": 1,
                "nModified": 0,
                "upserted": [{ "index": 1, "_id": "u" }],
            }),
            "delete" => Ok(doc! {
                "ok": 1,
                "n": 0,
                "writeErrors": [{ "index": 0, "code": 2, "errmsg": "bad delete" }],
            }),
            _ => acknowledge(command),
        });
    let coll = collection(&mock);

    let mut bulk = coll.initialize_unordered_bulk_op(None);
    bulk.insert(doc! { "_id": "a" }).unwrap();
    bulk.find(doc! { "k": 1 })
        .unwrap()
        .upsert()
        .update_one(doc! { "$set": { "v": 1 } })
        .unwrap();
    bulk.insert(doc! { "_id": "b" }).unwrap();
    bulk.find(doc! { "k": 2 })
        .unwrap()
        .upsert()
        .update_one(doc! { "$set": { "v": 2 } })
        .unwrap();
    bulk.find(doc! { "k": 3 }).unwrap().delete_one().unwrap();

    let error = bulk_write_error(bulk.execute().await.unwrap_err());
    let result = &error.result;

    assert_eq!(
        result.inserted_ids(),
        HashMap::from([(0, Bson::from("a")), (2, Bson::from("b"))])
    );
    assert_eq!(result.upserted_ids(), HashMap::from([(3, Bson::from("u"))]));
    assert_eq!(result.n_upserted(), 1);
    assert_eq!(result.n_matched(), 0);
    assert_eq!(error.write_errors.len(), 1);
    assert_eq!(error.write_errors[0].index, 4);
    assert_eq!(
        error.write_errors[0].op,
        Some(doc! { "q": { "k": 3 }, "limit": 1 })
    );
}

#[tokio::test]
async fn unordered_results_do_not_depend_on_arrival_order() {
    let mock = MockExecutor::new()
        .with_handler(|command| match command.name() {
            "update" => Ok(doc! {
                "ok": 1,
                "n": 1,
                "nModified": 0,
                "upserted": [{ "index": 0, "_id": "u" }],
                "writeErrors": [{ "index": 1, "code": 9, "errmsg": "bad update" }],
            }),
            _ => acknowledge(command),
        })
        .with_delay(|command| {
            (command.name() == "insert").then(|| Duration::from_millis(50))
        });
    let coll = collection(&mock);

    let mut bulk = coll.initialize_unordered_bulk_op(None);
    bulk.insert(doc! { "_id": 1 }).unwrap();
    bulk.find(doc! { "k": 1 })
        .unwrap()
        .upsert()
        .update_one(doc! { "$set": { "v": 1 } })
        .unwrap();
    bulk.find(doc! { "k": 2 })
        .unwrap()
        .update_one(doc! { "$set": { "v": 2 } })
        .unwrap();

    let error = bulk_write_error(bulk.execute().await.unwrap_err());

    let sent: Vec<_> = mock
        .commands()
        .iter()
        .map(|command| command.name().to_string())
        .collect();
    assert_eq!(sent, vec!["insert", "update"]);
    assert_eq!(mock.arrivals(), vec!["update", "insert"]);

    let result = &error.result;
    assert_eq!(result.inserted_ids(), HashMap::from([(0, Bson::Int32(1))]));
    assert_eq!(result.n_inserted(), 1);
    assert_eq!(result.upserted_ids(), HashMap::from([(1, Bson::from("u"))]));
    assert_eq!(error.write_errors.len(), 1);
    assert_eq!(error.write_errors[0].index, 2);
    assert_eq!(
        error.write_errors[0].op,
        Some(doc! { "q": { "k": 2 }, "u": { "$set": { "v": 2 } }, "multi": false, "upsert": false })
    );
}

#[tokio::test]
async fn missing_n_modified_is_sticky() {
    let mock = MockExecutor::new().with_description(description(1));
    mock.reply(doc! { "ok": 1, "n": 1, "nModified": 3 })
        .reply(doc! { "ok": 1, "n": 1 });
    let coll = collection(&mock);

    let mut bulk = coll.initialize_ordered_bulk_op(None);
    bulk.find(doc! { "a": 1 })
        .unwrap()
        .update_one(doc! { "$set": { "b": 1 } })
        .unwrap();
    bulk.find(doc! { "a": 2 })
        .unwrap()
        .update_one(doc! { "$set": { "b": 2 } })
        .unwrap();
    let result = bulk.execute().await.unwrap();

    assert_eq!(result.n_matched(), 2);
    assert_eq!(result.n_modified(), None);
    assert!(!result.to_document().unwrap().contains_key("nModified"));
}

#[tokio::test]
async fn command_failures_record_one_write_error() {
    let mock = MockExecutor::new().with_handler(|_| {
        Ok(doc! { "ok": 0, "code": 13, "codeName": "Unauthorized", "errmsg": "not authorized" })
    });
    let coll = collection(&mock);

    let mut bulk = coll.initialize_unordered_bulk_op(None);
    bulk.insert(doc! { "_id": 1 }).unwrap();
    bulk.find(doc! {}).unwrap().delete().unwrap();
    let error = bulk.execute().await.unwrap_err();

    assert_eq!(error.code(), Some(13));
    assert_eq!(error.source_error().and_then(Error::code), Some(13));
    let error = bulk_write_error(error);
    assert_eq!(error.result.ok(), 0);
    assert_eq!(error.write_errors.len(), 1);
    assert_eq!(error.write_errors[0].message, "not authorized");
    assert_eq!(mock.commands().len(), 2);
}

#[tokio::test]
async fn retryable_write_is_resent_once() {
    let mock = MockExecutor::new();
    mock.fail(std::io::ErrorKind::ConnectionReset)
        .reply(doc! { "ok": 1, "n": 1 });
    let coll = collection(&mock);

    let mut bulk = coll.initialize_ordered_bulk_op(None);
    bulk.insert(doc! { "_id": 1 }).unwrap();
    let result = bulk.execute().await.unwrap();
    assert_eq!(result.n_inserted(), 1);

    let commands = mock.commands();
    assert_eq!(commands.len(), 2);
    assert!(commands[0].txn_number().is_some());
    assert_eq!(commands[0].txn_number(), commands[1].txn_number());
    assert_eq!(
        commands[0].body().get("lsid"),
        commands[1].body().get("lsid")
    );
}

#[tokio::test]
async fn retry_failure_is_reported_against_the_batch() {
    let mock = MockExecutor::new();
    mock.fail(std::io::ErrorKind::ConnectionReset)
        .fail(std::io::ErrorKind::ConnectionReset);
    let coll = collection(&mock);

    let mut bulk = coll.initialize_ordered_bulk_op(None);
    bulk.insert(doc! { "_id": 1 }).unwrap();
    bulk.insert(doc! { "_id": 2 }).unwrap();
    let error = bulk.execute().await.unwrap_err();

    assert!(error.source_error().is_some());
    let error = bulk_write_error(error);
    assert_eq!(error.code, UNKNOWN_ERROR);
    assert_eq!(error.write_errors[0].index, 0);
    assert!(error.result.inserted_ids().is_empty());
    assert_eq!(mock.commands().len(), 2);
}

#[tokio::test]
async fn multi_writes_are_not_retried() {
    let mock = MockExecutor::new();
    mock.fail(std::io::ErrorKind::ConnectionReset);
    let coll = collection(&mock);

    let mut bulk = coll.initialize_ordered_bulk_op(None);
    bulk.find(doc! {})
        .unwrap()
        .update(doc! { "$set": { "x": 1 } })
        .unwrap();
    assert!(bulk.execute().await.is_err());

    let commands = mock.commands();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].txn_number(), None);
    assert!(commands[0].body().contains_key("lsid"));
}

#[tokio::test]
async fn unordered_batches_get_distinct_txn_numbers() {
    let mock = MockExecutor::new().with_handler(acknowledge);
    let coll = collection(&mock);

    let mut bulk = coll.initialize_unordered_bulk_op(None);
    bulk.insert(doc! { "_id": 1 }).unwrap();
    bulk.find(doc! { "_id": 1 }).unwrap().delete_one().unwrap();
    bulk.execute().await.unwrap();

    let txn_numbers: HashSet<_> = mock
        .commands()
        .iter()
        .map(|command| command.txn_number().unwrap())
        .collect();
    assert_eq!(txn_numbers.len(), 2);
}

#[tokio::test]
async fn empty_and_executed_bulks() {
    let mock = MockExecutor::new();
    let coll = collection(&mock);

    let mut bulk = coll.initialize_ordered_bulk_op(None);
    let error = bulk.execute().await.unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::EmptyBulk));

    bulk.insert(doc! { "_id": 1 }).unwrap();
    bulk.execute().await.unwrap();

    let error = bulk.insert(doc! { "_id": 2 }).unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::AlreadyExecuted));
    let error = bulk.find(doc! {}).err().unwrap();
    assert!(matches!(*error.kind, ErrorKind::AlreadyExecuted));
    let error = bulk.execute().await.unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::AlreadyExecuted));
    assert_eq!(mock.commands().len(), 1);
}

#[tokio::test]
async fn find_requires_selector_and_valid_documents() {
    let mock = MockExecutor::new();
    let coll = collection(&mock);
    let mut bulk = coll.initialize_ordered_bulk_op(None);

    let error = bulk.find(None::<Document>).err().unwrap();
    assert!(matches!(*error.kind, ErrorKind::MissingSelector));

    let error = bulk
        .find(doc! {})
        .unwrap()
        .update_one(doc! { "x": 1 })
        .unwrap_err();
    assert!(error.is_invalid_argument());

    let error = bulk
        .find(doc! {})
        .unwrap()
        .replace_one(doc! { "$set": { "x": 1 } })
        .unwrap_err();
    assert!(error.is_invalid_argument());
    assert!(bulk.is_empty());
}

#[tokio::test]
async fn array_filters_require_wire_version_6() {
    let mock = MockExecutor::new().with_description(StreamDescription::with_wire_version(5));
    let coll = collection(&mock);
    let mut bulk = coll.initialize_ordered_bulk_op(None);

    let error = bulk
        .find(doc! {})
        .unwrap()
        .array_filters([doc! { "e.x": 1 }])
        .update(doc! { "$set": { "a.$[e].y": 1 } })
        .unwrap_err();
    assert!(error.is_invalid_argument());
}

#[tokio::test]
async fn raw_operation_shapes() {
    let mock = MockExecutor::new();
    let coll = collection(&mock);

    let mut bulk = coll.initialize_ordered_bulk_op(None);
    bulk.raw(doc! { "insertOne": { "document": { "_id": 1 } } })
        .unwrap()
        .raw(doc! { "insertMany": [{ "_id": 2 }, { "_id": 3 }] })
        .unwrap()
        .raw(doc! {
            "updateOne": { "filter": { "_id": 1 }, "update": { "$set": { "a": 1 } }, "upsert": true }
        })
        .unwrap()
        .raw(doc! { "updateMany": { "q": { "a": 1 }, "u": { "$set": { "b": 1 } } } })
        .unwrap()
        .raw(doc! { "replaceOne": { "filter": { "_id": 2 }, "replacement": { "c": 1 } } })
        .unwrap()
        .raw(doc! { "deleteOne": { "filter": { "_id": 3 } } })
        .unwrap()
        .raw(doc! { "removeMany": { "q": { "d": 1 } } })
        .unwrap();
    assert_eq!(bulk.len(), 8);
    bulk.execute().await.unwrap();

    let commands = mock.commands();
    assert_eq!(commands.len(), 3);
    assert_eq!(
        commands[0].body().get_array("documents").unwrap(),
        &vec![
            Bson::Document(doc! { "_id": 1 }),
            Bson::Document(doc! { "_id": 2 }),
            Bson::Document(doc! { "_id": 3 }),
        ]
    );
    assert_eq!(
        commands[1].body().get_array("updates").unwrap(),
        &vec![
            Bson::Document(
                doc! { "q": { "_id": 1 }, "u": { "$set": { "a": 1 } }, "multi": false, "upsert": true }
            ),
            Bson::Document(doc! { "q": { "a": 1 }, "u": { "$set": { "b": 1 } }, "multi": true }),
            Bson::Document(
                doc! { "q": { "_id": 2 }, "u": { "c": 1 }, "multi": false, "upsert": false }
            ),
        ]
    );
    assert_eq!(
        commands[2].body().get_array("deletes").unwrap(),
        &vec![
            Bson::Document(doc! { "q": { "_id": 3 }, "limit": 1 }),
            Bson::Document(doc! { "q": { "d": 1 }, "limit": 0 }),
        ]
    );
}

#[tokio::test]
async fn raw_rejects_unknown_shapes() {
    let mock = MockExecutor::new();
    let coll = collection(&mock);
    let mut bulk = coll.initialize_ordered_bulk_op(None);

    let error = bulk.raw(Bson::Array(vec![])).unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::InvalidOperation { .. }));

    let error = bulk.raw(doc! { "bogus": {} }).unwrap_err();
    assert!(matches!(
        *error.kind,
        ErrorKind::UnsupportedOperation { ref name } if name == "bogus"
    ));

    let error = bulk
        .raw(doc! { "updateOne": { "update": { "$set": { "a": 1 } } } })
        .unwrap_err();
    assert!(matches!(*error.kind, ErrorKind::MissingSelector));
}

#[tokio::test]
async fn write_concern_and_options_reach_the_command() {
    let mock = MockExecutor::new();
    let coll = collection(&mock);

    let options = BulkOptions::builder()
        .bypass_document_validation(false)
        .comment(Bson::from("bulk"))
        .build();
    let mut bulk = coll.initialize_ordered_bulk_op(options);
    bulk.insert(doc! { "_id": 1 }).unwrap();
    bulk.execute()
        .write_concern(WriteConcern::majority())
        .await
        .unwrap();

    let body = mock.commands()[0].body().clone();
    assert_eq!(body.get_str("insert").unwrap(), "coll");
    assert_eq!(mock.commands()[0].target_db(), "db");
    assert!(body.get_bool("ordered").unwrap());
    assert_eq!(
        body.get_document("writeConcern").unwrap(),
        &doc! { "w": "majority" }
    );
    assert_eq!(body.get_str("comment").unwrap(), "bulk");
    assert!(!body.contains_key("bypassDocumentValidation"));
}

#[tokio::test]
async fn unacknowledged_writes_skip_sessions() {
    let mock = MockExecutor::new();
    let client = mock.client();
    let coll = client.database("db").collection("coll");

    let mut bulk = coll.initialize_ordered_bulk_op(None);
    bulk.insert(doc! { "_id": 1 }).unwrap();
    let mut session = client.start_session();
    let error = bulk
        .execute()
        .write_concern(WriteConcern::nodes(0))
        .session(&mut session)
        .await
        .unwrap_err();
    assert!(error.is_invalid_argument());

    bulk.execute()
        .write_concern(WriteConcern::nodes(0))
        .await
        .unwrap();
    let commands = mock.commands();
    assert_eq!(commands.len(), 1);
    assert!(!commands[0].body().contains_key("lsid"));
    assert_eq!(commands[0].txn_number(), None);
}

#[tokio::test]
async fn write_concern_error_fails_the_bulk() {
    let mock = MockExecutor::new();
    mock.reply(doc! {
        "ok": 1,
        "n": 1,
        "writeConcernError": { "code": 100, "errmsg": "waiting for replication timed out" },
    });
    let coll = collection(&mock);

    let mut bulk = coll.initialize_ordered_bulk_op(None);
    bulk.insert(doc! { "_id": 1 }).unwrap();
    let error = bulk_write_error(bulk.execute().await.unwrap_err());

    assert_eq!(error.code, 100);
    assert!(error.write_errors.is_empty());
    assert_eq!(
        error.write_concern_error.map(|error| error.message),
        Some("waiting for replication timed out".to_string())
    );
    assert_eq!(error.result.n_inserted(), 1);
}
