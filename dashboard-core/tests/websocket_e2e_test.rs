//! End-to-end test against a local WebSocket server
//!
//! Spins up a tokio-tungstenite server on a loopback port, connects a real
//! session to it and checks the handshake and frame flow.

use dashboard_core::pipeline::{DashboardPipeline, PipelineSettings};
use dashboard_core::session::DashboardSession;
use dashboard_core::transport::{ConnectionState, Transport, TransportError};
use dashboard_core::usecase::presets;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;

fn fall_payload(probability: f64, is_fall: bool) -> String {
    json!({
        "fall_detection": {"is_fall": is_fall, "fall_probability": probability},
        "point_data": {"x_pos": [0.1, 0.2], "y_pos": [1.0, 1.1], "z_pos": [0.4, 0.5]}
    })
    .to_string()
}

/// Accept one client, report its first message, stream `frames` and close
async fn serve_once(listener: TcpListener, frames: Vec<Message>, handshake_tx: oneshot::Sender<String>) {
    let (stream, _) = listener.accept().await.unwrap();
    let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

    if let Some(Ok(Message::Text(text))) = ws.next().await {
        let _ = handshake_tx.send(text);
    }
    for frame in frames {
        ws.send(frame).await.unwrap();
    }
    ws.close(None).await.unwrap();
    while let Some(Ok(_)) = ws.next().await {}
}

async fn pump_until_inactive(session: &mut DashboardSession) {
    for _ in 0..64 {
        let pumped = tokio::time::timeout(Duration::from_secs(5), session.pump())
            .await
            .expect("transport event within timeout");
        if !pumped || !session.transport().is_active() {
            return;
        }
    }
    panic!("session did not finish");
}

#[tokio::test]
async fn test_websocket_session_end_to_end() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}/ws", listener.local_addr().unwrap());

    let frames = vec![
        Message::Text(fall_payload(0.1, false)),
        Message::Text(fall_payload(0.95, true)),
        Message::Text("{broken".to_string()),
        Message::Binary(fall_payload(0.3, false).into_bytes()),
    ];
    let (handshake_tx, handshake_rx) = oneshot::channel();
    let server = tokio::spawn(serve_once(listener, frames, handshake_tx));

    let transport = Transport::websocket().unwrap();
    let pipeline =
        DashboardPipeline::new(presets::fall_detection(), PipelineSettings::default()).unwrap();
    let mut session = DashboardSession::new(transport, pipeline).unwrap();

    assert!(session.start(&endpoint));
    pump_until_inactive(&mut session).await;

    let handshake = handshake_rx.await.unwrap();
    assert_eq!(handshake, r#"{"useCase":"fall_detection"}"#);

    assert_eq!(session.state(), ConnectionState::Closed);
    assert_eq!(session.transport().stats().delivered, 3);
    assert_eq!(session.transport().stats().undecodable, 1);

    let pipeline = session.pipeline();
    let stats = pipeline.aggregate_stats();
    assert_eq!(stats.sample_count(), 3);
    assert_eq!(stats.event_count(), 1);
    assert_eq!(stats.running_max(), Some(0.95));
    assert_eq!(pipeline.latest_frame().unwrap().points().len(), 2);
    drop(pipeline);

    server.await.unwrap();
}

#[tokio::test]
async fn test_websocket_connect_refused() {
    // bind then drop to get a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let endpoint = format!("ws://{}/ws", listener.local_addr().unwrap());
    drop(listener);

    let transport = Transport::websocket().unwrap();
    let pipeline =
        DashboardPipeline::new(presets::occupancy(), PipelineSettings::default()).unwrap();
    let mut session = DashboardSession::new(transport, pipeline).unwrap();

    session.start(&endpoint);
    pump_until_inactive(&mut session).await;

    assert_eq!(session.state(), ConnectionState::Errored);
    assert!(matches!(
        session.transport().last_error(),
        Some(TransportError::Connect(_))
    ));
    assert_eq!(session.pipeline().connection(), ConnectionState::Errored);
}
