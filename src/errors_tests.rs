// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use super::*;
use kube::core::Status;

fn api_error(code: u16) -> kube::Error {
    kube::Error::Api(
        Status::failure(&format!("status {code}"), "")
            .with_code(code)
            .boxed(),
    )
}

#[test]
fn not_found_is_terminal() {
    assert_eq!(classify(&api_error(404)), ErrorKind::NotFound);
    assert!(is_not_found(&api_error(404)));
    assert!(!is_not_found(&api_error(500)));
}

#[test]
fn conflict_is_conflict() {
    assert_eq!(classify(&api_error(409)), ErrorKind::Conflict);
}

#[test]
fn throttling_and_server_errors_are_transient() {
    assert_eq!(classify(&api_error(429)), ErrorKind::Transient);
    assert_eq!(classify(&api_error(500)), ErrorKind::Transient);
    assert_eq!(classify(&api_error(503)), ErrorKind::Transient);
    assert_eq!(classify(&api_error(599)), ErrorKind::Transient);
}

#[test]
fn client_errors_are_permanent() {
    assert_eq!(classify(&api_error(400)), ErrorKind::Permanent);
    assert_eq!(classify(&api_error(403)), ErrorKind::Permanent);
    assert_eq!(classify(&api_error(422)), ErrorKind::Permanent);
}

#[test]
fn operator_errors_format_with_context() {
    let err = OperatorError::SubControllerConstruction {
        namespace: "workload-ns".to_string(),
        reason: "watch registration failed".to_string(),
    };
    let text = err.to_string();
    assert!(text.contains("workload-ns"));
    assert!(text.contains("watch registration failed"));

    let err = OperatorError::InvalidSpec {
        observer: "op-ns/observer".to_string(),
        reason: "empty target namespace".to_string(),
    };
    assert!(err.to_string().contains("op-ns/observer"));
}
