use serde_json::json;
use signspeak::gesture_classifier::ClassificationResult;
use signspeak::handlers::{ServerEvent, ServerMessage, ServiceError};
use signspeak::session::{
    SessionState, EVENT_CONNECT, EVENT_DISCONNECT, EVENT_LIVE_LANDMARKS, EVENT_SAVE_SAMPLE,
    WELCOME_MESSAGE,
};
mod common;

use common::{broken_harness, hand, harness, recv};

#[test]
fn connect_emits_welcome() {
    let h = harness(2);
    let (session, rx) = h.service.connect();
    assert_eq!(session.state(), SessionState::Connected);
    assert_eq!(
        serde_json::to_value(recv(&rx)).unwrap(),
        json!({"event": "server_message", "data": {"message": WELCOME_MESSAGE}})
    );
}

#[test]
fn live_landmarks_emits_prediction() {
    let h = harness(2);
    let (mut session, rx) = h.service.connect();
    recv(&rx);

    session
        .dispatch(EVENT_LIVE_LANDMARKS, json!({ "landmarks": hand(0.1) }))
        .unwrap();
    assert_eq!(
        recv(&rx),
        ServerEvent::Prediction(ClassificationResult::Prediction {
            prediction: "hola".into(),
            confidence: 0.8
        })
    );

    session
        .dispatch(EVENT_LIVE_LANDMARKS, json!({ "landmarks": hand(-0.1) }))
        .unwrap();
    match recv(&rx) {
        ServerEvent::Prediction(ClassificationResult::Prediction { prediction, .. }) => {
            assert_eq!(prediction, "adios")
        }
        other => panic!("evento inesperado: {:?}", other),
    }
}

#[test]
fn short_payload_is_rejected_without_classifying() {
    let h = harness(2);
    let (mut session, rx) = h.service.connect();
    recv(&rx);

    let mut landmarks = hand(0.1);
    landmarks.pop();
    session
        .dispatch(EVENT_LIVE_LANDMARKS, json!({ "landmarks": landmarks }))
        .unwrap();

    assert_eq!(
        serde_json::to_value(recv(&rx)).unwrap(),
        json!({"event": "prediction", "data": {"error": "Invalid landmarks"}})
    );
    assert_eq!(h.calls(), 0);
}

#[test]
fn classifier_failure_keeps_session_alive() {
    let h = broken_harness();
    let (mut session, rx) = h.service.connect();
    recv(&rx);

    for _ in 0..3 {
        session
            .dispatch(EVENT_LIVE_LANDMARKS, json!({ "landmarks": hand(0.0) }))
            .unwrap();
        match recv(&rx) {
            ServerEvent::Prediction(result) => assert!(result.is_error()),
            other => panic!("evento inesperado: {:?}", other),
        }
    }
    assert!(session.is_connected());

    // Y el guardado sigue funcionando
    session
        .dispatch(EVENT_SAVE_SAMPLE, json!({"label": "hola", "landmarks": hand(0.0)}))
        .unwrap();
    assert_eq!(recv(&rx), ServerEvent::message("Saved one sample for 'hola'"));
}

#[test]
fn save_sample_defaults_to_unknown() {
    let h = harness(2);
    let (mut session, rx) = h.service.connect();
    recv(&rx);

    session
        .dispatch(EVENT_SAVE_SAMPLE, json!({ "landmarks": hand(0.2) }))
        .unwrap();
    assert_eq!(
        serde_json::to_value(recv(&rx)).unwrap(),
        json!({"event": "server_message", "data": {"message": "Saved one sample for 'unknown'"}})
    );

    let log = h.dataset.path().join("unknown").join("samples.csv");
    let rows = signspeak::csv_loader::load_samples(&log).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].to_vec(), hand(0.2));
    assert_eq!(h.calls(), 0);
}

#[test]
fn save_sample_stores_the_values_sent() {
    let h = harness(2);
    let (mut session, rx) = h.service.connect();
    recv(&rx);

    let mut landmarks = hand(0.2);
    landmarks[0] = 0.123456789012345;
    landmarks[5] = 1e39;
    session
        .dispatch(EVENT_SAVE_SAMPLE, json!({"label": "hola", "landmarks": landmarks}))
        .unwrap();
    assert_eq!(recv(&rx), ServerEvent::message("Saved one sample for 'hola'"));

    let log = h.dataset.path().join("hola").join("samples.csv");
    let rows = signspeak::csv_loader::load_samples(&log).unwrap();
    assert_eq!(rows[0].to_vec(), landmarks);
}

#[test]
fn save_sample_rejects_bad_input() {
    let h = harness(2);
    let (mut session, rx) = h.service.connect();
    recv(&rx);

    let invalid = ServerEvent::error("Invalid sample");
    for data in [
        json!({"label": "hola", "landmarks": [0.1, 0.2]}),
        json!({"label": "hola"}),
        json!({"label": "../fuera", "landmarks": hand(0.0)}),
        json!({"label": 7, "landmarks": hand(0.0)}),
        json!({"label": "NUL", "landmarks": hand(0.0)}),
    ] {
        session.dispatch(EVENT_SAVE_SAMPLE, data).unwrap();
        assert_eq!(recv(&rx), invalid);
    }
    assert_eq!(std::fs::read_dir(h.dataset.path()).unwrap().count(), 0);
}

#[test]
fn repeated_connect_and_disconnect() {
    let h = harness(1);
    let (mut session, rx) = h.service.connect();
    recv(&rx);

    session.dispatch(EVENT_CONNECT, json!({})).unwrap();
    assert_eq!(recv(&rx), ServerEvent::message(WELCOME_MESSAGE));

    session.dispatch(EVENT_DISCONNECT, json!({})).unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);
    assert_eq!(
        session.dispatch(EVENT_LIVE_LANDMARKS, json!({ "landmarks": hand(0.1) })),
        Err(ServiceError::SessionClosed(session.id()))
    );
    assert_eq!(h.calls(), 0);
}

#[test]
fn responses_follow_event_order() {
    let h = harness(4);
    let (mut session, rx) = h.service.connect();
    recv(&rx);

    let mut expected = Vec::new();
    for i in 0..50 {
        let (dx, class) = if i % 2 == 0 { (0.1, "hola") } else { (-0.1, "adios") };
        session
            .dispatch(EVENT_LIVE_LANDMARKS, json!({ "landmarks": hand(dx) }))
            .unwrap();
        expected.push(class.to_string());
        if i % 10 == 9 {
            session.dispatch(EVENT_CONNECT, json!({})).unwrap();
            expected.push(WELCOME_MESSAGE.to_string());
        }
    }

    let received: Vec<String> = (0..expected.len())
        .map(|_| match recv(&rx) {
            ServerEvent::Prediction(ClassificationResult::Prediction { prediction, .. }) => prediction,
            ServerEvent::ServerMessage(ServerMessage::Message { message }) => message,
            other => panic!("evento inesperado: {:?}", other),
        })
        .collect();
    assert_eq!(received, expected);
    assert_eq!(h.calls(), 50);
}

#[test]
fn unknown_event_reply_waits_its_turn() {
    let h = harness(2);
    let (mut session, rx) = h.service.connect();
    recv(&rx);

    session
        .dispatch(EVENT_LIVE_LANDMARKS, json!({ "landmarks": hand(0.1) }))
        .unwrap();
    session.dispatch("wave", json!({})).unwrap();

    assert!(matches!(recv(&rx), ServerEvent::Prediction(_)));
    assert_eq!(recv(&rx), ServerEvent::error("Unknown event 'wave'"));
}
