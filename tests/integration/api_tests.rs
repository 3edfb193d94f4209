//! API integration tests
//!
//! These run against a live server seeded with a librarian account:
//! LIBRARY__SEED__LIBRARIAN_EMAIL=librarian@example.org
//! LIBRARY__SEED__LIBRARIAN_PASSWORD=change-me

use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};

const BASE_URL: &str = "http://localhost:8080/api";

/// Helper to get a librarian token
async fn librarian_token(client: &Client) -> String {
    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "email": "librarian@example.org",
            "password": "change-me"
        }))
        .send()
        .await
        .expect("Failed to send login request");

    let body: Value = response.json().await.expect("Failed to parse login response");
    body["token"].as_str().expect("No token in response").to_string()
}

/// Unique suffix so repeated runs do not collide on emails, student ids and bids
fn unique() -> i64 {
    Utc::now().timestamp_micros() % 1_000_000_000
}

async fn register_student(client: &Client, suffix: i64) -> (String, i64) {
    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "name": "Test Student",
            "email": format!("student{}@example.org", suffix),
            "password": "testpass",
            "role": "student",
            "studentId": format!("S{}", suffix)
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());
    let body: Value = response.json().await.expect("Failed to parse response");
    (
        body["token"].as_str().expect("No token").to_string(),
        body["user"]["id"].as_i64().expect("No user ID"),
    )
}

#[tokio::test]
#[ignore] // Run with: cargo test -- --ignored
async fn test_health_check() {
    let client = Client::new();

    let response = client
        .get(format!("{}/health", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
#[ignore]
async fn test_login_invalid_credentials() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/login", BASE_URL))
        .json(&json!({
            "email": "librarian@example.org",
            "password": "wrong"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_register_duplicate_email() {
    let client = Client::new();
    let suffix = unique();
    register_student(&client, suffix).await;

    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "name": "Second Student",
            "email": format!("student{}@example.org", suffix),
            "password": "testpass",
            "role": "student",
            "studentId": format!("T{}", suffix)
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 409);
}

#[tokio::test]
#[ignore]
async fn test_register_librarian_rejected() {
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/register", BASE_URL))
        .json(&json!({
            "name": "Sneaky",
            "email": format!("lib{}@example.org", unique()),
            "password": "testpass",
            "role": "librarian"
        }))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
#[ignore]
async fn test_unauthorized_access() {
    let client = Client::new();

    let response = client
        .get(format!("{}/books", BASE_URL))
        .send()
        .await
        .expect("Failed to send request");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
#[ignore]
async fn test_loan_lifecycle() {
    let client = Client::new();
    let token = librarian_token(&client).await;
    let suffix = unique();
    let (student_token, student_id) = register_student(&client, suffix).await;
    let bid = 16 + suffix;

    // Add the book
    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({
            "bid": bid,
            "title": "Dune",
            "author": "Frank Herbert",
            "category": "Fiction"
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    let book_id = body["book"]["id"].as_i64().expect("No book ID");

    // Students cannot issue
    let due = (Utc::now() + Duration::days(14)).to_rfc3339();
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&student_token)
        .json(&json!({ "studentId": student_id, "bid": bid, "dueDate": due }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 403);

    // Issue
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "studentId": student_id, "bid": bid, "dueDate": due }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    let loan_id = body["loan"]["id"].as_i64().expect("No loan ID");

    // Book is now issued
    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(book["status"], "issued");

    // Second issue conflicts
    let response = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "studentId": student_id, "bid": bid, "dueDate": due }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    // The losing issue leaves the book as it was
    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(book["status"], "issued");

    // Active listing includes it
    let active: Value = client
        .get(format!("{}/loans/active", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert!(active["loans"]
        .as_array()
        .expect("No loans")
        .iter()
        .any(|l| l["id"].as_i64() == Some(loan_id)));

    // Return five days after the due date
    let returned_at = (Utc::now() + Duration::days(19) + Duration::hours(1)).to_rfc3339();
    let response = client
        .put(format!("{}/loans/return/{}", BASE_URL, loan_id))
        .bearer_auth(&token)
        .json(&json!({ "returnDate": returned_at }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert!(body["record"]["returnDate"].is_string());
    assert_eq!(body["record"]["fine"], 25);

    // No longer active, book available again
    let active: Value = client
        .get(format!("{}/loans/active", BASE_URL))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert!(!active["loans"]
        .as_array()
        .expect("No loans")
        .iter()
        .any(|l| l["id"].as_i64() == Some(loan_id)));

    let book: Value = client
        .get(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(book["status"], "available");

    // Returning twice conflicts
    let response = client
        .put(format!("{}/loans/return/{}", BASE_URL, loan_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    // The student sees the loan in their history
    let history: Value = client
        .get(format!("{}/loans", BASE_URL))
        .bearer_auth(&student_token)
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    assert_eq!(history[0]["id"].as_i64(), Some(loan_id));

    // Cleanup: the book goes, the loan history stays
    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 204);
}

#[tokio::test]
#[ignore]
async fn test_bid_of_deleted_book_on_loan_stays_reserved() {
    let client = Client::new();
    let token = librarian_token(&client).await;
    let suffix = unique();
    let (_, student_id) = register_student(&client, suffix).await;
    let bid = 2_000_000_000 - (suffix % 1_000_000_000);

    let body: Value = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "bid": bid, "title": "Kindred", "author": "Octavia E. Butler" }))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    let book_id = body["book"]["id"].as_i64().expect("No book ID");

    let due = (Utc::now() + Duration::days(14)).to_rfc3339();
    let body: Value = client
        .post(format!("{}/loans", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "studentId": student_id, "bid": bid, "dueDate": due }))
        .send()
        .await
        .expect("Failed to send request")
        .json()
        .await
        .expect("Failed to parse response");
    let loan_id = body["loan"]["id"].as_i64().expect("No loan ID");

    // Deleting a book on loan is allowed, re-adding its bid is not
    let response = client
        .delete(format!("{}/books/{}", BASE_URL, book_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 204);

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "bid": bid, "title": "Kindred", "author": "Octavia E. Butler" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 409);

    // Once returned, the bid is free again
    let response = client
        .put(format!("{}/loans/return/{}", BASE_URL, loan_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 200);

    let response = client
        .post(format!("{}/books", BASE_URL))
        .bearer_auth(&token)
        .json(&json!({ "bid": bid, "title": "Kindred", "author": "Octavia E. Butler" }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), 201);
    let body: Value = response.json().await.expect("Failed to parse response");
    assert_eq!(body["book"]["status"], "available");

    let readded_id = body["book"]["id"].as_i64().expect("No book ID");
    client
        .delete(format!("{}/books/{}", BASE_URL, readded_id))
        .bearer_auth(&token)
        .send()
        .await
        .expect("Failed to send request");
}
