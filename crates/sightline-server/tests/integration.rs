//! End-to-end tests against a real listener using WebSocket and HTTP clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};

use sightline_core::{
    BoundingBox, Detection, DetectionThreshold, Frame, OutputFormat, Pacing, ResponseMode,
};
use sightline_server::{CaptureConfig, FramePipeline, PipelineConfig, ServerConfig, SightlineServer};
use sightline_vision::{EncodeOptions, StaticDetector, codec};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

const PNG: EncodeOptions = EncodeOptions {
    format: OutputFormat::Png,
    jpeg_quality: 90,
};

fn box_detection(confidence: f64) -> Detection {
    Detection::new("box", 0, confidence, BoundingBox::new(10, 10, 50, 50).unwrap())
}

fn pipeline_config(mode: ResponseMode) -> PipelineConfig {
    PipelineConfig {
        response_mode: mode,
        encode: PNG,
        threshold: DetectionThreshold::default(),
        ..PipelineConfig::default()
    }
}

/// Boot a test server on an auto-assigned port.
async fn boot(
    detections: Vec<Detection>,
    pipeline: PipelineConfig,
    config: ServerConfig,
    capture: Option<CaptureConfig>,
) -> (SocketAddr, Arc<SightlineServer>) {
    let pipeline = FramePipeline::new(Arc::new(StaticDetector::new(detections)), pipeline);
    let metrics = PrometheusBuilder::new().build_recorder().handle();
    let server = Arc::new(SightlineServer::new(config, pipeline, capture, metrics));
    let (addr, _handle) = server.listen().await.unwrap();
    (addr, server)
}

async fn boot_push(detections: Vec<Detection>, mode: ResponseMode) -> SocketAddr {
    boot(detections, pipeline_config(mode), ServerConfig::default(), None)
        .await
        .0
}

async fn connect(addr: SocketAddr, path: &str) -> WsStream {
    let (ws, _) = timeout(TIMEOUT, connect_async(format!("ws://{addr}{path}")))
        .await
        .unwrap()
        .unwrap();
    ws
}

/// 640x480 black frame with a white rectangle outline at `[10, 10, 50, 50]`.
fn scene() -> Frame {
    let mut frame = Frame::filled(640, 480, [0, 0, 0]).unwrap();
    for i in 10..=50 {
        for (x, y) in [(i, 10), (i, 50), (10, i), (50, i)] {
            frame.put_rgb(x, y, [255, 255, 255]);
        }
    }
    frame
}

fn png_base64(frame: &Frame) -> String {
    codec::encode_base64(frame, PNG).unwrap()
}

async fn send_text(ws: &mut WsStream, text: String) {
    ws.send(Message::Text(text.into())).await.unwrap();
}

async fn next_json(ws: &mut WsStream) -> Value {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timed out waiting for a response")
            .expect("stream ended")
            .expect("websocket error");
        match msg {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected message: {other:?}"),
        }
    }
}

fn response_frame(value: &Value) -> Frame {
    codec::decode_base64(value["image"].as_str().expect("image field")).unwrap()
}

async fn wait_for_connections(addr: SocketAddr, expected: u64) {
    let client = reqwest::Client::new();
    timeout(TIMEOUT, async {
        loop {
            let health: Value = client
                .get(format!("http://{addr}/health"))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            if health["connections"] == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

fn assert_refused(result: Result<(WsStream, tungstenite::handshake::client::Response), tungstenite::Error>) {
    match result {
        Err(tungstenite::Error::Http(resp)) => assert_eq!(resp.status().as_u16(), 503),
        Err(other) => panic!("expected HTTP 503, got {other}"),
        Ok(_) => panic!("expected HTTP 503, got an open socket"),
    }
}

// ── Push mode ──

#[tokio::test]
async fn known_box_is_reported_exactly() {
    let addr = boot_push(vec![box_detection(0.9)], ResponseMode::DetectionsOnly).await;
    let mut ws = connect(addr, "/stream").await;

    send_text(&mut ws, png_base64(&scene())).await;
    let resp = next_json(&mut ws).await;
    assert_eq!(
        resp,
        json!({"detections": [{"label": "box", "confidence": 0.9, "box": [10, 10, 50, 50]}]})
    );
}

#[tokio::test]
async fn image_mode_returns_annotated_frame_and_detections() {
    let addr = boot_push(vec![box_detection(0.9)], ResponseMode::ImageWithDetections).await;
    let mut ws = connect(addr, "/stream").await;

    send_text(&mut ws, png_base64(&scene())).await;
    let resp = next_json(&mut ws).await;
    assert_eq!(resp["detections"][0]["box"], json!([10, 10, 50, 50]));
    let frame = response_frame(&resp);
    assert_eq!((frame.width(), frame.height()), (640, 480));
    assert_eq!(frame.pixel(10, 30).unwrap(), &[0, 255, 0]);
}

#[tokio::test]
async fn below_threshold_detection_is_drawn_but_not_reported() {
    let addr = boot_push(vec![box_detection(0.5)], ResponseMode::ImageWithDetections).await;
    let mut ws = connect(addr, "/stream").await;

    send_text(&mut ws, png_base64(&scene())).await;
    let resp = next_json(&mut ws).await;
    assert_eq!(resp["detections"], json!([]));

    let frame = response_frame(&resp);
    assert_eq!(frame.pixel(10, 30).unwrap(), &[0, 255, 0]);
    assert_eq!(frame.pixel(300, 300).unwrap(), &[0, 0, 0]);
}

#[tokio::test]
async fn garbage_middle_payload_yields_two_ordered_responses() {
    let addr = boot_push(Vec::new(), ResponseMode::ImageWithDetections).await;
    let mut ws = connect(addr, "/stream").await;

    let first = Frame::filled(64, 48, [10, 10, 10]).unwrap();
    let third = Frame::filled(32, 24, [10, 10, 10]).unwrap();
    send_text(&mut ws, png_base64(&first)).await;
    ws.send(Message::Binary(b"\x89PNG garbage".to_vec().into()))
        .await
        .unwrap();
    send_text(&mut ws, png_base64(&third)).await;

    let a = next_json(&mut ws).await;
    let b = next_json(&mut ws).await;
    assert_eq!(response_frame(&a).width(), 64);
    assert_eq!(response_frame(&b).width(), 32);

    // nothing is sent for the garbage frame
    assert!(
        timeout(Duration::from_millis(300), ws.next()).await.is_err(),
        "unexpected third message"
    );
}

#[tokio::test]
async fn data_url_and_binary_payloads_are_accepted() {
    let addr = boot_push(vec![box_detection(0.8)], ResponseMode::DetectionsOnly).await;
    let mut ws = connect(addr, "/stream").await;

    let frame = Frame::filled(64, 64, [1, 2, 3]).unwrap();
    send_text(&mut ws, format!("data:image/png;base64,{}", png_base64(&frame))).await;
    assert_eq!(next_json(&mut ws).await["detections"][0]["label"], "box");

    let raw = codec::encode(&frame, PNG).unwrap();
    ws.send(Message::Binary(raw.into())).await.unwrap();
    assert_eq!(next_json(&mut ws).await["detections"][0]["label"], "box");
}

// ── Registry and limits ──

#[tokio::test]
async fn sessions_are_listed_while_connected() {
    let addr = boot_push(Vec::new(), ResponseMode::DetectionsOnly).await;
    let mut ws = connect(addr, "/stream").await;
    wait_for_connections(addr, 1).await;

    let sessions: Value = reqwest::get(format!("http://{addr}/sessions"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(sessions[0]["mode"], "push");
    assert_eq!(sessions[0]["state"], "active");
    assert!(sessions[0]["id"].as_str().unwrap().starts_with("sess_"));

    ws.close(None).await.unwrap();
    wait_for_connections(addr, 0).await;
}

#[tokio::test]
async fn upgrades_beyond_the_limit_get_503() {
    let config = ServerConfig {
        max_connections: 1,
        ..ServerConfig::default()
    };
    let (addr, _server) = boot(
        Vec::new(),
        pipeline_config(ResponseMode::DetectionsOnly),
        config,
        None,
    )
    .await;

    let mut first = connect(addr, "/stream").await;
    assert_refused(connect_async(format!("ws://{addr}/stream")).await);

    first.close(None).await.unwrap();
    wait_for_connections(addr, 0).await;
    // the slot is released once the first session has fully closed
    let reopened = timeout(TIMEOUT, async {
        loop {
            if let Ok((ws, _)) = connect_async(format!("ws://{addr}/stream")).await {
                return ws;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(reopened.is_ok());
}

// ── Pull mode ──

#[tokio::test]
async fn live_is_refused_when_capture_is_disabled() {
    let addr = boot_push(Vec::new(), ResponseMode::DetectionsOnly).await;
    assert_refused(connect_async(format!("ws://{addr}/live")).await);
}

#[tokio::test]
async fn live_streams_synthetic_frames() {
    let capture = CaptureConfig {
        source: "synthetic:64x48".into(),
        interval: Duration::from_millis(10),
        pacing: Pacing::FixedDelay,
    };
    let (addr, _server) = boot(
        vec![box_detection(0.9)],
        pipeline_config(ResponseMode::ImageWithDetections),
        ServerConfig::default(),
        Some(capture),
    )
    .await;

    let mut ws = connect(addr, "/live").await;
    for _ in 0..2 {
        let resp = next_json(&mut ws).await;
        assert_eq!(response_frame(&resp).width(), 64);
        assert_eq!(resp["detections"][0]["label"], "box");
    }
}

#[tokio::test]
async fn live_loops_over_an_image_directory() {
    let dir = tempfile::tempdir().unwrap();
    for (name, width) in [("a.png", 40), ("b.png", 20)] {
        let frame = Frame::filled(width, 16, [50, 60, 70]).unwrap();
        std::fs::write(dir.path().join(name), codec::encode(&frame, PNG).unwrap()).unwrap();
    }
    let capture = CaptureConfig {
        source: dir.path().display().to_string(),
        interval: Duration::from_millis(5),
        pacing: Pacing::FixedRate,
    };
    let (addr, _server) = boot(
        Vec::new(),
        pipeline_config(ResponseMode::ImageWithDetections),
        ServerConfig::default(),
        Some(capture),
    )
    .await;

    let mut ws = connect(addr, "/live").await;
    let mut widths = Vec::new();
    for _ in 0..3 {
        widths.push(response_frame(&next_json(&mut ws).await).width());
    }
    assert_eq!(widths, vec![40, 20, 40]);
}

// ── HTTP ──

#[tokio::test]
async fn one_shot_detect_endpoint() {
    let addr = boot_push(
        vec![box_detection(0.9), box_detection(0.2)],
        ResponseMode::DetectionsOnly,
    )
    .await;
    let client = reqwest::Client::new();

    let ok = client
        .post(format!("http://{addr}/detect"))
        .json(&json!({ "image_base64": png_base64(&scene()) }))
        .send()
        .await
        .unwrap();
    assert_eq!(ok.status().as_u16(), 200);
    let body: Value = ok.json().await.unwrap();
    assert_eq!(body["detections"].as_array().unwrap().len(), 1);

    let bad = client
        .post(format!("http://{addr}/detect"))
        .json(&json!({ "image_base64": "AAAA" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad.status().as_u16(), 400);
}

#[tokio::test]
async fn health_reports_capture_flag() {
    let addr = boot_push(Vec::new(), ResponseMode::DetectionsOnly).await;
    let health: Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["capture_enabled"], false);
}

// ── Shutdown ──

#[tokio::test]
async fn drain_closes_open_sessions() {
    let (addr, server) = boot(
        Vec::new(),
        pipeline_config(ResponseMode::DetectionsOnly),
        ServerConfig::default(),
        None,
    )
    .await;
    let mut ws = connect(addr, "/stream").await;
    wait_for_connections(addr, 1).await;

    assert!(server.drain().await);
    assert!(server.registry().is_empty());

    // the client sees a close frame or the end of the stream
    let ended = timeout(TIMEOUT, async {
        while let Some(msg) = ws.next().await {
            if matches!(msg, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
    })
    .await;
    assert!(ended.is_ok());
}
