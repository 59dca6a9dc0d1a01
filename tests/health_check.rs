mod common;

use actix_web::{test, web, App};
use chrono::DateTime;
use doorlock_server::configure_routes;

#[actix_web::test]
async fn test_health_check() {
    let (state, _) = common::test_state();

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(state))
            .configure(configure_routes)
    ).await;

    // Send request
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;

    // Assert response
    assert!(resp.status().is_success());

    // Parse response body
    let body = test::read_body(resp).await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();

    // Verify response format
    assert_eq!(json["status"], "healthy");
    assert!(DateTime::parse_from_rfc3339(
        json["timestamp"].as_str().unwrap()
    ).is_ok());
}
