use super::*;

#[test]
fn request_round_trips_through_json() {
    let req = Request::LaunchCommand {
        handle: 3,
        user: Some(1000),
        cmdline: vec!["echo".to_string(), "hi".to_string()],
        cwd: None,
        out_file: None,
        env: HashMap::new(),
    };
    let encoded = wire::encode(&req).unwrap();
    let decoded: Request = wire::decode(&encoded).unwrap();
    match decoded {
        Request::LaunchCommand { handle, user, cmdline, .. } => {
            assert_eq!(handle, 3);
            assert_eq!(user, Some(1000));
            assert_eq!(cmdline, vec!["echo".to_string(), "hi".to_string()]);
        }
        other => panic!("unexpected request: {other:?}"),
    }
}

#[test]
fn capability_ids_extracts_set_capabilities_ids_only() {
    let req = Request::SetCapabilities { handle: 1, ids: vec!["a".to_string(), "b".to_string()] };
    let ids = req.capability_ids().unwrap();
    assert_eq!(ids, vec![CapabilityName::new("a"), CapabilityName::new("b")]);

    assert!(Request::Ping.capability_ids().is_none());
}

#[test]
fn process_state_changed_converts_into_a_signal_response() {
    let signal = ProcessStateChanged {
        handle: sc_core::ContainerHandle(5),
        pid: 42,
        is_running: false,
        exit_code: 0,
    };
    let response: Response = signal.into();
    match response {
        Response::Signal { handle, pid, is_running, exit_code } => {
            assert_eq!(handle, 5);
            assert_eq!(pid, 42);
            assert!(!is_running);
            assert_eq!(exit_code, 0);
        }
        other => panic!("unexpected response: {other:?}"),
    }
}

#[test]
fn error_response_round_trips() {
    let resp = Response::Error {
        error_kind: "state_mismatch".to_string(),
        message: "expected Started".to_string(),
    };
    let encoded = wire::encode(&resp).unwrap();
    let decoded: Response = wire::decode(&encoded).unwrap();
    assert!(matches!(decoded, Response::Error { error_kind, .. } if error_kind == "state_mismatch"));
}
