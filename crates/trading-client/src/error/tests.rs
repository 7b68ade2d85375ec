//! Unit tests for error module.

use super::*;

#[test]
fn test_api_error_display() {
    let error = Error::Api {
        status: 400,
        code: "INVALID_REQUEST".to_string(),
        message: "Invalid order type: hold. Use 'buy' or 'sell'".to_string(),
    };

    let display = format!("{}", error);
    assert!(display.contains("400"));
    assert!(display.contains("INVALID_REQUEST"));
    assert!(display.contains("Invalid order type"));
}

#[test]
fn test_not_found_error_display() {
    let error = Error::NotFound("Order 7 not found".to_string());

    let display = format!("{}", error);
    assert!(display.contains("Not found"));
    assert!(display.contains("Order 7"));
}

#[test]
fn test_missing_token_display() {
    assert_eq!(Error::MissingToken.to_string(), "No access token configured");
}

#[test]
fn test_connection_closed_error_display() {
    let error = Error::ConnectionClosed;
    assert!(format!("{}", error).contains("Connection closed"));
}

#[test]
fn test_error_status() {
    let api = Error::Api {
        status: 409,
        code: "CONFLICT".to_string(),
        message: "Email already registered".to_string(),
    };
    assert_eq!(api.status(), Some(409));
    assert_eq!(Error::NotFound(String::new()).status(), Some(404));
    assert_eq!(Error::Unauthorized(String::new()).status(), Some(401));
    assert_eq!(Error::MissingToken.status(), None);
}
