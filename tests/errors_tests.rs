use std::error::Error;
use tripplanner::PlannerError;
use tripplanner::ai::MalformedFrame;

#[test]
fn test_planner_error_implements_error_trait() {
    fn assert_error<T: Error>(_: &T) {}

    assert_error(&PlannerError::Cancelled);
    assert_error(&MalformedFrame {
        line: "data: {".to_string(),
        reason: "EOF".to_string(),
    });
}

#[test]
fn test_planner_error_display() {
    let error = PlannerError::Server {
        status: 429,
        body: "rate limited".to_string(),
    };
    assert_eq!(
        format!("{error}"),
        "Completion API returned status 429: rate limited"
    );

    let error = PlannerError::Connection("dns error".to_string());
    assert_eq!(
        format!("{error}"),
        "Failed to reach the completion API: dns error"
    );

    let error = PlannerError::StreamInterrupted("connection closed before [DONE]".to_string());
    assert_eq!(
        format!("{error}"),
        "Stream interrupted before completion: connection closed before [DONE]"
    );
}

#[test]
fn test_status_code_only_for_server_errors() {
    let server = PlannerError::Server {
        status: 401,
        body: String::new(),
    };
    assert_eq!(server.status_code(), Some(401));
    assert_eq!(PlannerError::Cancelled.status_code(), None);
}

#[test]
fn test_retryable_classification() {
    assert!(PlannerError::Connection("timeout".to_string()).is_retryable());
    assert!(PlannerError::StreamInterrupted("reset".to_string()).is_retryable());
    assert!(
        PlannerError::Server {
            status: 503,
            body: String::new()
        }
        .is_retryable()
    );
    assert!(
        !PlannerError::Server {
            status: 401,
            body: String::new()
        }
        .is_retryable()
    );
    assert!(!PlannerError::Cancelled.is_retryable());
    assert!(!PlannerError::GenerationActive.is_retryable());
}

#[test]
fn test_planner_error_from_conversions() {
    let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
    let err: PlannerError = io.into();
    match err {
        PlannerError::Store(msg) => assert!(msg.contains("read-only")),
        other => panic!("Unexpected error type: {other:?}"),
    }

    // Only verifies that the conversion exists.
    #[allow(unused)]
    #[allow(clippy::items_after_statements)]
    fn _check_reqwest_conversion(err: reqwest::Error) -> PlannerError {
        PlannerError::from(err)
    }
}
