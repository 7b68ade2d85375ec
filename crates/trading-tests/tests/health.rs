//! Health check endpoint tests.

use trading_tests::TestServer;

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await;

    let health = server
        .client()
        .health_check()
        .await
        .expect("Health check failed");

    assert_eq!(health.status, "healthy");
    assert!(!health.version.is_empty());
    assert_eq!(health.relay_sessions, 0);
}
