//! Integration tests for the support chat relay and support email.

#![allow(clippy::unwrap_used)]

use pizza_time_client::SupportEmail;
use pizza_time_integration_tests::{TestServer, spawn_chat_upstream};

#[tokio::test]
async fn test_chat_reply_is_relayed() {
    let (upstream, _upstream_task) = spawn_chat_upstream("Your pizza is on its way!").await;
    let server = TestServer::start_with_chat(Some(upstream)).await;
    let client = server.client();

    let reply = client.chat().send("Where is my order?").await.unwrap();
    assert_eq!(reply, "Your pizza is on its way!");

    let history = client.chat().history();
    assert_eq!(history.len(), 3);
    assert_eq!(history.last().unwrap().content, reply);
}

#[tokio::test]
async fn test_unconfigured_chat_explains_itself() {
    let server = TestServer::start().await;
    let client = server.client();

    let reply = client.chat().send("hello").await.unwrap();
    assert_eq!(
        reply,
        "Chat service is not configured. Please add GEMINI_API_KEY to the server environment."
    );
}

#[tokio::test]
async fn test_support_email_is_accepted() {
    let server = TestServer::start().await;
    let client = server.client();

    client
        .send_support_email(SupportEmail {
            name: "Maya".to_owned(),
            email: "maya@pizza.example".to_owned(),
            subject: Some("Order Delivery Delay".to_owned()),
            message: "My pizza is late.".to_owned(),
        })
        .await
        .unwrap();

    let err = client
        .send_support_email(SupportEmail {
            name: "Maya".to_owned(),
            email: "maya@pizza.example".to_owned(),
            subject: None,
            message: "   ".to_owned(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Please fill in all required fields");
}

#[tokio::test]
async fn test_health_endpoints() {
    let server = TestServer::start().await;
    let http = reqwest::Client::new();

    let body: serde_json::Value = http
        .get(format!("{}/health", server.api_url()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["storage"], "JSON file storage");

    let ready = http
        .get(format!("{}/health/ready", server.origin()))
        .send()
        .await
        .unwrap();
    assert_eq!(ready.status(), reqwest::StatusCode::OK);
}
