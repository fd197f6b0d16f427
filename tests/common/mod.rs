#![allow(dead_code)]

use prep_server::auth::{AuthState, Role};
use prep_server::test_support::{TestDatabase, TestDatabaseError, TestFixtures, bearer_for};
use rocket::http::Header;
use uuid::Uuid;

/// Fresh migrated database, or `None` when no container runtime is reachable.
pub async fn provision(test_name: &str) -> Option<TestDatabase> {
    match TestDatabase::new().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::Container(err)) => {
            eprintln!("skipping {test_name}: docker unavailable ({err})");
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

/// Insert an account with the given role and return its bearer header.
pub async fn signed_in(
    fixtures: &TestFixtures<'_>,
    auth: &AuthState,
    email: &str,
    role: Role,
) -> (Uuid, Header<'static>) {
    let user_id = fixtures
        .insert_user(email, "Test User", role.as_str(), "not-a-real-hash")
        .await
        .expect("insert user");
    let header = Header::new("Authorization", bearer_for(auth, user_id, email, role));
    (user_id, header)
}

/// Encode `fields` as a `multipart/form-data` body. `filename` marks file parts.
pub fn multipart_body(boundary: &str, fields: &[(&str, Option<&str>, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, filename, content) in fields {
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        match filename {
            Some(filename) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
            }
            None => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
            }
        }
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}
