//! Integration tests for registration, sign-in and account deletion.

#![allow(clippy::unwrap_used)]

use pizza_time_client::ClientError;
use pizza_time_core::{Credentials, NewContact, Price};
use pizza_time_integration_tests::{TEST_PASSWORD, TestServer, credentials, read_collection};

#[tokio::test]
async fn test_register_then_login_from_another_client() {
    let server = TestServer::start().await;

    let first = server.client();
    let user = first.session().register(credentials("Maya")).await.unwrap();
    assert_eq!(user.username, "maya");
    assert_eq!(user.email.as_deref(), Some("Maya@pizza.example"));

    let second = server.client();
    assert!(!second.session().is_authenticated());
    let logged_in = second
        .session()
        .login(Credentials {
            username: "MAYA".to_owned(),
            email: None,
            password: TEST_PASSWORD.to_owned(),
        })
        .await
        .unwrap();
    assert_eq!(logged_in.id, user.id);

    let restored = second.session().restore().await.unwrap().unwrap();
    assert_eq!(restored.id, user.id);
}

#[tokio::test]
async fn test_duplicate_username_is_rejected() {
    let server = TestServer::start().await;
    server.signed_in_client("maya").await;

    let err = server
        .client()
        .session()
        .register(credentials("Maya"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(409));
    assert_eq!(err.to_string(), "Username already exists");
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let server = TestServer::start().await;
    server.signed_in_client("maya").await;

    let client = server.client();
    let err = client
        .session()
        .login(Credentials {
            username: "maya".to_owned(),
            email: None,
            password: "Wrong-password1".to_owned(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), "Invalid username or password");
    assert!(!client.session().is_authenticated());
}

#[tokio::test]
async fn test_logout_drops_token() {
    let server = TestServer::start().await;
    let client = server.signed_in_client("maya").await;

    client.session().logout();
    assert!(!client.session().is_authenticated());
    assert!(client.session().restore().await.unwrap().is_none());

    // Without a token the gateway refuses, so the order stays local.
    let placed = client
        .orders()
        .place_order(pizza_time_core::ProductSnapshot {
            pizza_id: "pepperoni".to_owned(),
            pizza_name: "Pepperoni".to_owned(),
            pizza_image: None,
            pizza_price: Some(Price::from_cents(1400)),
            note: None,
        })
        .await
        .unwrap();
    assert!(!placed.is_synced());
}

#[tokio::test]
async fn test_delete_account_cascades() {
    let server = TestServer::start().await;
    let client = server.signed_in_client("maya").await;
    client
        .contacts()
        .add(NewContact {
            name: "Mom".to_owned(),
            phone: "555-0100".to_owned(),
            is_primary: true,
        })
        .await
        .unwrap();
    assert_eq!(read_collection(server.data_dir(), "contacts").len(), 1);

    let err = client.delete_account("Not-my-password1").await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 401, .. }));
    assert!(client.session().is_authenticated());

    client.delete_account(TEST_PASSWORD).await.unwrap();
    assert!(!client.session().is_authenticated());
    assert!(client.contacts().contacts().is_empty());
    assert!(read_collection(server.data_dir(), "users").is_empty());
    assert!(read_collection(server.data_dir(), "contacts").is_empty());

    let err = server
        .client()
        .session()
        .login(credentials("maya"))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(401));
}
