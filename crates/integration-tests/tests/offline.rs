//! Integration tests for the local fallback when the gateway cannot be reached.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pizza_time_client::{CartProduct, ClientConfig, PaymentDetails, PizzaApp};
use pizza_time_core::{NewContact, OrderStatus, Price};
use pizza_time_integration_tests::{TestServer, credentials, unreachable_api_url};

fn card() -> PaymentDetails {
    PaymentDetails {
        card_number: "4111111111111111".to_owned(),
        expiry: "08/31".to_owned(),
        cvv: "321".to_owned(),
        cardholder_name: "Maya Lopez".to_owned(),
        billing_address: None,
    }
}

async fn unreachable_client(storage: &std::path::Path) -> PizzaApp {
    let config = ClientConfig {
        request_timeout: Duration::from_secs(2),
        get_retries: 0,
        ..ClientConfig::new(unreachable_api_url().await)
    }
    .with_storage_dir(storage);
    PizzaApp::new(config).unwrap()
}

#[tokio::test]
async fn test_unreachable_gateway_keeps_working_locally() {
    let dir = tempfile::tempdir().unwrap();
    let client = unreachable_client(dir.path()).await;

    client
        .cart()
        .add_to_cart(CartProduct::new("margherita", "Margherita", Price::from_cents(1299)));
    let receipt = client.checkout("", &card()).await.unwrap();
    assert!(!receipt.synced);
    let id = receipt.orders.first().unwrap().id.clone();

    let added = client
        .contacts()
        .add(NewContact {
            name: "Mom".to_owned(),
            phone: "555-0100".to_owned(),
            is_primary: true,
        })
        .await
        .unwrap();
    assert!(!added.is_synced());

    let accepted = client
        .orders()
        .set_order_status(&id, OrderStatus::Accepted)
        .await
        .unwrap();
    assert!(!accepted.is_synced());

    // Everything survives a restart from the same storage directory.
    drop(client);
    let restarted = unreachable_client(dir.path()).await;
    assert_eq!(restarted.orders().find(&id).unwrap().status, OrderStatus::Accepted);
    assert_eq!(restarted.contacts().contacts().len(), 1);
    assert!(!restarted.orders().refresh().await.unwrap().is_synced());
}

#[tokio::test]
async fn test_backend_disabled_never_calls_gateway() {
    let server = TestServer::start().await;
    let config = ClientConfig {
        use_backend: false,
        ..server.client_config()
    };
    let client = PizzaApp::new(config).unwrap();

    let err = client
        .session()
        .register(credentials("maya"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Backend disabled");

    client
        .cart()
        .add_to_cart(CartProduct::new("veggie", "Veggie", Price::from_cents(1100)));
    let receipt = client.checkout("", &card()).await.unwrap();
    assert!(!receipt.synced);
    assert!(pizza_time_integration_tests::read_collection(server.data_dir(), "orders").is_empty());
}

#[tokio::test]
async fn test_session_survives_gateway_outage() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start().await;
    let online = PizzaApp::new(server.client_config().with_storage_dir(dir.path())).unwrap();
    let user = online.session().register(credentials("maya")).await.unwrap();
    drop(online);

    let offline = unreachable_client(dir.path()).await;
    assert_eq!(offline.session().current_user().unwrap().id, user.id);
    offline.sync().await.unwrap();
    assert!(offline.session().is_authenticated());
}
