mod common;

use prep_server::api_routes;
use prep_server::auth::Role;
use prep_server::models::{PaginatedResponse, Subject};
use prep_server::test_support::{TestFixtures, TestRocketBuilder, test_auth_state};
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use serde_json::{Value, json};

const BOUNDARY: &str = "X-PREP-BOUNDARY";

fn multipart() -> ContentType {
    ContentType::new("multipart", "form-data").with_params(("boundary", BOUNDARY))
}

async fn upload_csv(
    client: &Client,
    admin: &Header<'static>,
    table: Option<&str>,
    csv: Option<&[u8]>,
) -> (Status, Value) {
    let mut fields: Vec<(&str, Option<&str>, &[u8])> = Vec::new();
    if let Some(table) = table {
        fields.push(("tableName", None, table.as_bytes()));
    }
    if let Some(csv) = csv {
        fields.push(("file", Some("upload.csv"), csv));
    }
    let response = client
        .post("/api/v1/admin/upload-csv")
        .header(admin.clone())
        .header(multipart())
        .body(common::multipart_body(BOUNDARY, &fields))
        .dispatch()
        .await;
    let status = response.status();
    let body = response.into_json::<Value>().await.unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn demo_code_upload_counts_every_processed_row() {
    let Some(test_db) = common::provision("demo code upload test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    let auth = test_auth_state();
    let (_, admin) = common::signed_in(&fixtures, &auth, "admin@example.com", Role::Admin).await;

    let subject_id = fixtures.insert_subject("Mathematics").await.unwrap();
    let first = fixtures.insert_topic(subject_id, "Algebra").await.unwrap();
    let second = fixtures.insert_topic(subject_id, "Geometry").await.unwrap();

    let client = TestRocketBuilder::new()
        .manage_pg_pool(pool.clone())
        .with_default_state()
        .mount_api_routes(api_routes())
        .async_client()
        .await;

    let csv = format!("topic_id,demo_code\n{first},ABCD\n{second},EFGH\n{first},WXYZ\n");
    let (status, body) = upload_csv(&client, &admin, Some("demo_codes"), Some(csv.as_bytes())).await;
    assert_eq!(status, Status::Ok);
    assert_eq!(body, json!({ "insertedCount": 3 }));

    let rows: Vec<(i32, String)> =
        sqlx::query_as("SELECT topic_id, demo_code FROM demo_codes ORDER BY topic_id")
            .fetch_all(&pool)
            .await
            .unwrap();
    assert_eq!(rows, vec![(first, "WXYZ".into()), (second, "EFGH".into())]);

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn upload_reports_each_failure_shape() {
    let Some(test_db) = common::provision("upload failure shape test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    let auth = test_auth_state();
    let (_, admin) = common::signed_in(&fixtures, &auth, "admin@example.com", Role::Admin).await;

    let client = TestRocketBuilder::new()
        .manage_pg_pool(pool.clone())
        .with_default_state()
        .mount_api_routes(api_routes())
        .async_client()
        .await;

    let (status, body) = upload_csv(&client, &admin, Some("payments"), Some(b"id\n1\n")).await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body, json!({ "message": "Invalid table name." }));

    let (status, body) = upload_csv(&client, &admin, Some("subjects"), None).await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body, json!({ "message": "CSV file is required." }));

    let (status, body) =
        upload_csv(&client, &admin, Some("subjects"), Some(b"subject_id,name\n1,Maths\n")).await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(
        body,
        json!({
            "message": "CSV is missing required columns.",
            "missingColumns": ["description"],
        })
    );

    let csv = b"subject_id,name,description\n1,Maths,\n2,,Missing name\n";
    let (status, body) = upload_csv(&client, &admin, Some("subjects"), Some(csv)).await;
    assert_eq!(status, Status::BadRequest);
    assert_eq!(body["message"], "Failed to insert row.");
    assert_eq!(body["rowNumber"], 2);
    assert!(body["error"].as_str().is_some());
    assert_eq!(fixtures.count("subjects").await.unwrap(), 0);

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn admin_routes_reject_learners() {
    let Some(test_db) = common::provision("admin guard test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    let auth = test_auth_state();
    let (_, learner) = common::signed_in(&fixtures, &auth, "learner@example.com", Role::User).await;

    let client = TestRocketBuilder::new()
        .manage_pg_pool(pool.clone())
        .with_default_state()
        .mount_api_routes(api_routes())
        .async_client()
        .await;

    let response = client
        .get("/api/v1/admin/subjects")
        .header(learner.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Forbidden);

    drop(response);
    let response = client.get("/api/v1/admin/stats").dispatch().await;
    assert_eq!(response.status(), Status::Unauthorized);

    let (status, _) = upload_csv(&client, &learner, Some("subjects"), Some(b"x\n")).await;
    assert_eq!(status, Status::Forbidden);

    drop(response);
    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn subject_crud_round_trip() {
    let Some(test_db) = common::provision("admin subject crud test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    let auth = test_auth_state();
    let (_, admin) = common::signed_in(&fixtures, &auth, "admin@example.com", Role::Admin).await;

    let client = TestRocketBuilder::new()
        .manage_pg_pool(pool.clone())
        .with_default_state()
        .mount_api_routes(api_routes())
        .async_client()
        .await;

    let response = client
        .post("/api/v1/admin/subjects")
        .header(admin.clone())
        .header(ContentType::JSON)
        .body(json!({ "name": "Mathematics", "description": "Numbers" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let created: Subject = response.into_json().await.expect("subject body");
    assert_eq!(created.name, "Mathematics");

    let response = client
        .put(format!("/api/v1/admin/subjects/{}", created.subject_id))
        .header(admin.clone())
        .header(ContentType::JSON)
        .body(json!({ "name": "Applied Mathematics" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let updated: Subject = response.into_json().await.expect("subject body");
    assert_eq!(updated.name, "Applied Mathematics");
    assert_eq!(updated.description, None);

    let response = client
        .post("/api/v1/admin/subjects")
        .header(admin.clone())
        .header(ContentType::JSON)
        .body(json!({ "name": "   " }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    drop(response);
    let response = client
        .get("/api/v1/admin/subjects?q=applied&page=1&size=10")
        .header(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let page: PaginatedResponse<Subject> = response.into_json().await.expect("page body");
    assert_eq!(page.data.len(), 1);
    assert_eq!(page.page.total_items, 1);

    let response = client
        .delete(format!("/api/v1/admin/subjects/{}", created.subject_id))
        .header(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NoContent);

    drop(response);
    let response = client
        .delete(format!("/api/v1/admin/subjects/{}", created.subject_id))
        .header(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NotFound);

    drop(response);
    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn demo_codes_are_generated_and_unique_per_topic() {
    let Some(test_db) = common::provision("admin demo code test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    let auth = test_auth_state();
    let (_, admin) = common::signed_in(&fixtures, &auth, "admin@example.com", Role::Admin).await;
    let subject_id = fixtures.insert_subject("Mathematics").await.unwrap();
    let topic_id = fixtures.insert_topic(subject_id, "Algebra").await.unwrap();

    let client = TestRocketBuilder::new()
        .manage_pg_pool(pool.clone())
        .with_default_state()
        .mount_api_routes(api_routes())
        .async_client()
        .await;

    let response = client
        .post("/api/v1/admin/demo-codes")
        .header(admin.clone())
        .header(ContentType::JSON)
        .body(json!({ "topicId": topic_id }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let body: Value = response.into_json().await.unwrap();
    let code = body["demoCode"].as_str().unwrap();
    assert!(code.starts_with("DEMO") && code.len() == 8);

    let response = client
        .post("/api/v1/admin/demo-codes")
        .header(admin.clone())
        .header(ContentType::JSON)
        .body(json!({ "topicId": topic_id, "demoCode": "DEMOAAAA" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Conflict);

    drop(response);
    let response = client
        .post("/api/v1/admin/demo-codes")
        .header(admin.clone())
        .header(ContentType::JSON)
        .body(json!({ "topicId": 9999 }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    drop(response);
    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn stats_and_user_management() {
    let Some(test_db) = common::provision("admin users test").await else {
        return;
    };
    let pool = test_db.pool_clone();
    let fixtures = TestFixtures::new(&pool);
    let auth = test_auth_state();
    let (admin_id, admin) =
        common::signed_in(&fixtures, &auth, "admin@example.com", Role::Admin).await;
    let (learner_id, learner) =
        common::signed_in(&fixtures, &auth, "learner@example.com", Role::User).await;
    let subject_id = fixtures.insert_subject("Mathematics").await.unwrap();
    fixtures.insert_topic(subject_id, "Algebra").await.unwrap();

    let client = TestRocketBuilder::new()
        .manage_pg_pool(pool.clone())
        .with_default_state()
        .mount_api_routes(api_routes())
        .async_client()
        .await;

    let response = client
        .get("/api/v1/admin/stats")
        .header(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let stats: Value = response.into_json().await.unwrap();
    assert_eq!(stats["totalSubjects"], 1);
    assert_eq!(stats["totalTopics"], 1);
    assert_eq!(stats["totalUsers"], 2);

    let response = client
        .put(format!("/api/v1/admin/users/{learner_id}/role"))
        .header(admin.clone())
        .header(ContentType::JSON)
        .body(json!({ "role": "admin" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    // The learner's token was minted for the old role.
    drop(response);
    let response = client
        .get("/api/v1/subscriptions/me")
        .header(learner.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);

    drop(response);
    let response = client
        .delete(format!("/api/v1/admin/users/{admin_id}"))
        .header(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);

    drop(response);
    let response = client
        .delete(format!("/api/v1/admin/users/{learner_id}"))
        .header(admin.clone())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::NoContent);
    assert_eq!(fixtures.count("users").await.unwrap(), 1);

    drop(response);
    drop(client);
    test_db.close().await.expect("failed to drop test database");
}
