mod common;

use prep_server::import::{CsvImporter, ImportError, TableRegistry};
use prep_server::test_support::TestFixtures;
use serde_json::json;

fn registry() -> TableRegistry {
    TableRegistry::standard().expect("standard registry")
}

const SUBJECTS_CSV: &str = "subject_id,name,description\n\
    1,Mathematics,Numbers and shapes\n\
    2,Physics,\n\
    3,Chemistry,Reactions\n";

#[tokio::test]
async fn valid_file_upserts_every_row() {
    let Some(test_db) = common::provision("csv import count test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let registry = registry();

    let summary = CsvImporter::new(&pool, &registry)
        .import("subjects", SUBJECTS_CSV.as_bytes())
        .await
        .expect("import succeeds");
    assert_eq!(summary.inserted_count, 3);

    let rows: Vec<(i32, String, Option<String>)> =
        sqlx::query_as("SELECT subject_id, name, description FROM subjects ORDER BY subject_id")
            .fetch_all(&pool)
            .await
            .expect("query subjects");
    assert_eq!(
        rows,
        vec![
            (1, "Mathematics".into(), Some("Numbers and shapes".into())),
            (2, "Physics".into(), None),
            (3, "Chemistry".into(), Some("Reactions".into())),
        ]
    );

    // Identity sequence follows the imported keys.
    let next_id: i32 =
        sqlx::query_scalar("INSERT INTO subjects (name) VALUES ('Biology') RETURNING subject_id")
            .fetch_one(&pool)
            .await
            .expect("insert after import");
    assert_eq!(next_id, 4);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn resubmitting_the_same_file_updates_in_place() {
    let Some(test_db) = common::provision("csv import idempotence test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let registry = registry();
    let importer = CsvImporter::new(&pool, &registry);

    importer
        .import("subjects", SUBJECTS_CSV.as_bytes())
        .await
        .expect("first import");
    let second = importer
        .import("subjects", SUBJECTS_CSV.as_bytes())
        .await
        .expect("second import");
    assert_eq!(second.inserted_count, 3);

    let fixtures = TestFixtures::new(&pool);
    assert_eq!(fixtures.count("subjects").await.unwrap(), 3);

    let renamed = "subject_id,name,description\n2,Applied Physics,Motion\n";
    importer
        .import("subjects", renamed.as_bytes())
        .await
        .expect("update import");
    let name: String = sqlx::query_scalar("SELECT name FROM subjects WHERE subject_id = 2")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(name, "Applied Physics");
    assert_eq!(fixtures.count("subjects").await.unwrap(), 3);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn missing_headers_write_nothing() {
    let Some(test_db) = common::provision("csv import header test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let registry = registry();
    let fixtures = TestFixtures::new(&pool);
    let subject_id = fixtures.insert_subject("Mathematics").await.unwrap();

    let csv = format!("topic_id,subject_id\n1,{subject_id}\n");
    let err = CsvImporter::new(&pool, &registry)
        .import("topics", csv.as_bytes())
        .await
        .expect_err("headers are incomplete");

    match err {
        ImportError::MissingColumns(mut missing) => {
            missing.sort();
            assert_eq!(missing, vec!["description".to_string(), "name".to_string()]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fixtures.count("topics").await.unwrap(), 0);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn failing_row_rolls_back_the_whole_file() {
    let Some(test_db) = common::provision("csv import rollback test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let registry = registry();
    let fixtures = TestFixtures::new(&pool);
    let before = fixtures.count("users").await.unwrap();

    // Row 3 reuses row 1's primary key under a different email.
    let csv = "id,name,email,password_hash,role\n\
        8a3c0a52-0c7e-4f1e-9a0b-1f1d2c3b4a50,Ada,ada@example.com,x,user\n\
        8a3c0a52-0c7e-4f1e-9a0b-1f1d2c3b4a51,Grace,grace@example.com,x,user\n\
        8a3c0a52-0c7e-4f1e-9a0b-1f1d2c3b4a50,Alan,alan@example.com,x,user\n\
        8a3c0a52-0c7e-4f1e-9a0b-1f1d2c3b4a53,Edsger,edsger@example.com,x,user\n\
        8a3c0a52-0c7e-4f1e-9a0b-1f1d2c3b4a54,Barbara,barbara@example.com,x,admin\n";

    let err = CsvImporter::new(&pool, &registry)
        .import("users", csv.as_bytes())
        .await
        .expect_err("row 3 violates the primary key");

    match err {
        ImportError::RowFailed { row_number, message } => {
            assert_eq!(row_number, 3);
            assert!(message.contains("duplicate key"), "message: {message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fixtures.count("users").await.unwrap(), before);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn json_and_boolean_columns_are_normalized() {
    let Some(test_db) = common::provision("csv import normalization test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let registry = registry();
    let fixtures = TestFixtures::new(&pool);
    let subject_id = fixtures.insert_subject("Mathematics").await.unwrap();
    let topic_id = fixtures.insert_topic(subject_id, "Algebra").await.unwrap();

    let good = format!(
        "id,subject_id,topic_id,text,options,correct_answer,explanation,difficulty,is_demo\n\
         1,{subject_id},{topic_id},First,\"{{\"\"a\"\":\"\"X\"\",\"\"b\"\":\"\"Y\"\",\"\"c\"\":\"\"Z\"\"}}\",a,,easy,YES\n\
         2,{subject_id},{topic_id},Second,\"{{\"\"a\"\":\"\"1\"\"}}\",a,,,maybe\n"
    );
    CsvImporter::new(&pool, &registry)
        .import("questions", good.as_bytes())
        .await
        .expect("import questions");

    let rows: Vec<(i32, serde_json::Value, bool)> =
        sqlx::query_as("SELECT id, options, is_demo FROM questions ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(rows[0].1, json!({"a": "X", "b": "Y", "c": "Z"}));
    assert!(rows[0].2);
    assert!(!rows[1].2);

    let bad = format!(
        "id,subject_id,topic_id,text,options,correct_answer,explanation,difficulty,is_demo\n\
         3,{subject_id},{topic_id},Third,\"{{\"\"a\"\":\"\"1\"\"}}\",a,,,no\n\
         4,{subject_id},{topic_id},Fourth,not json,a,,,no\n"
    );
    let err = CsvImporter::new(&pool, &registry)
        .import("questions", bad.as_bytes())
        .await
        .expect_err("invalid JSON");
    match err {
        ImportError::RowFailed { row_number, message } => {
            assert_eq!(row_number, 2);
            assert!(message.contains("options"), "message: {message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(fixtures.count("questions").await.unwrap(), 2);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn failed_import_does_not_poison_the_connection() {
    let Some(test_db) = common::provision("csv import reused connection test").await else {
        return;
    };
    let pool = test_db
        .single_connection_pool()
        .await
        .expect("single connection pool");
    let registry = registry();
    let fixtures = TestFixtures::new(&pool);
    let subject_id = fixtures.insert_subject("Mathematics").await.unwrap();
    let topic_id = fixtures.insert_topic(subject_id, "Algebra").await.unwrap();
    let importer = CsvImporter::new(&pool, &registry);
    let header = "id,subject_id,topic_id,text,options,correct_answer,explanation,difficulty,is_demo\n";

    // Blank options violates NOT NULL on the first attempt.
    let blank = format!("{header}1,{subject_id},{topic_id},Q,,a,,,no\n");
    let err = importer
        .import("questions", blank.as_bytes())
        .await
        .expect_err("options is required");
    match err {
        ImportError::RowFailed { row_number, message } => {
            assert_eq!(row_number, 1);
            assert!(message.contains("not-null"), "message: {message}");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let fixed = format!(
        "{header}1,{subject_id},{topic_id},Q,\"{{\"\"a\"\":\"\"X\"\"}}\",a,,,no\n"
    );
    let summary = importer
        .import("questions", fixed.as_bytes())
        .await
        .expect("corrected file imports on the same connection");
    assert_eq!(summary.inserted_count, 1);

    let options: serde_json::Value =
        sqlx::query_scalar("SELECT options FROM questions WHERE id = 1")
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(options, json!({"a": "X"}));

    pool.close().await;
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn malformed_bytes_abort_before_writing() {
    let Some(test_db) = common::provision("csv import decode test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let registry = registry();
    let fixtures = TestFixtures::new(&pool);
    fixtures.insert_subject("Existing").await.unwrap();
    let before = fixtures.count("subjects").await.unwrap();

    let mut csv = b"subject_id,name,description\n10,Mathematics,ok\n11,Physics,ok\n12,".to_vec();
    csv.extend_from_slice(b"\xff\xfeChem,ok\n");

    let err = CsvImporter::new(&pool, &registry)
        .import("subjects", &csv)
        .await
        .expect_err("row 3 is not UTF-8");
    assert!(matches!(err, ImportError::Parse(_)), "unexpected error: {err:?}");
    assert_eq!(fixtures.count("subjects").await.unwrap(), before);

    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn unknown_tables_are_rejected_before_parsing() {
    let Some(test_db) = common::provision("csv import table test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let registry = registry();

    let err = CsvImporter::new(&pool, &registry)
        .import("user_activity", b"\xff\xfe")
        .await
        .expect_err("table is not importable");
    assert!(matches!(err, ImportError::UnknownTable(name) if name == "user_activity"));

    test_db.close().await.expect("failed to drop test database");
}
