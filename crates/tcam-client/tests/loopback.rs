//! End-to-end tests against a fake camera on the loopback interface.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use bytes::BytesMut;
use serde_json::{json, Value};
use tcam_client::image::{HEIGHT, TELEMETRY_WORDS, WIDTH};
use tcam_client::words::encode_words;
use tcam_client::{
    CameraClient, ClientConfig, ClientError, SocketConfig, SocketTransport, Spotmeter,
    StreamOptions,
};
use tcam_frame::{encode_json, extract_messages};

struct FakeCamera {
    port: u16,
    worker: JoinHandle<Vec<Value>>,
}

impl FakeCamera {
    /// Accept one client and answer its commands until it hangs up.
    fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let worker = thread::spawn(move || {
            let (conn, _) = listener.accept().unwrap();
            serve(conn)
        });
        Self { port, worker }
    }

    /// Commands the camera received, in order.
    fn finish(self) -> Vec<Value> {
        self.worker.join().unwrap()
    }
}

fn frame_message(seq: u64) -> Value {
    let pixels = vec![29_515u16; WIDTH * HEIGHT];
    let mut telemetry = vec![0u16; TELEMETRY_WORDS];
    telemetry[24] = 30_315;
    json!({
        "radiometric": encode_words(&pixels),
        "telemetry": encode_words(&telemetry),
        "seq": seq,
    })
}

fn serve(mut conn: TcpStream) -> Vec<Value> {
    let mut seen = Vec::new();
    let mut pending = BytesMut::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = match conn.read(&mut chunk) {
            Ok(0) | Err(_) => return seen,
            Ok(n) => n,
        };
        pending.extend_from_slice(&chunk[..n]);
        for message in extract_messages(&mut pending) {
            let command = Value::from(message);
            let mut out = BytesMut::new();
            match command["cmd"].as_str().unwrap_or_default() {
                "get_status" => encode_json(
                    &json!({"status": {"Camera": "tCam-Mini", "Version": "2.1"}}),
                    &mut out,
                )
                .unwrap(),
                "get_lep_cci" => encode_json(
                    &json!({"cci_reg": {
                        "command": command["args"]["command"],
                        "length": command["args"]["length"],
                        "status": 0,
                        "data": "OwBPADwAUAA=",
                    }}),
                    &mut out,
                )
                .unwrap(),
                "get_image" => encode_json(&frame_message(0), &mut out).unwrap(),
                "stream_on" => {
                    // Reply and both frames leave in a single write.
                    encode_json(&json!({"stream": "on"}), &mut out).unwrap();
                    encode_json(&frame_message(1), &mut out).unwrap();
                    encode_json(&frame_message(2), &mut out).unwrap();
                }
                "get_wifi" => {}
                "run_ffc" => {
                    seen.push(command);
                    return seen;
                }
                other => encode_json(&json!({"ack": other}), &mut out).unwrap(),
            }
            seen.push(command);
            if !out.is_empty() && conn.write_all(&out).is_err() {
                return seen;
            }
        }
    }
}

fn client() -> CameraClient<SocketTransport> {
    let transport = SocketTransport::with_config(SocketConfig {
        read_timeout: Duration::from_millis(50),
        ..SocketConfig::default()
    });
    let config = ClientConfig::default()
        .with_response_timeout(Duration::from_secs(5))
        .with_idle_timeout(Duration::from_millis(50));
    CameraClient::with_transport(transport, config).unwrap()
}

#[test]
fn connect_then_query_status() {
    let camera = FakeCamera::start();
    let client = client();

    let reply = client.connect("127.0.0.1", camera.port).unwrap();
    assert_eq!(reply.status(), Some("connected"));

    let status = client.get_status().unwrap();
    assert_eq!(status["status"]["Camera"], json!("tCam-Mini"));

    client.shutdown();
    let seen = camera.finish();
    assert_eq!(seen, vec![json!({"cmd": "get_status"})]);
}

#[test]
fn cci_read_decodes_register_words() {
    let camera = FakeCamera::start();
    let client = client();
    client.connect("127.0.0.1", camera.port).unwrap();

    let reply = client.get_spotmeter_roi().unwrap();
    assert_eq!(reply["cci_reg"]["command"], json!(0x4ECC));

    let register = client.read_register(0x4ECC, 4).unwrap();
    assert_eq!(register.words().unwrap(), vec![59, 79, 60, 80]);

    client.shutdown();
    let seen = camera.finish();
    assert_eq!(seen[0]["args"], json!({"command": 0x4ECC, "length": 4}));
}

#[test]
fn cci_write_sends_encoded_words() {
    let camera = FakeCamera::start();
    let client = client();
    client.connect("127.0.0.1", camera.port).unwrap();

    let reply = client.set_lep_cci(0x4ECD, &[59, 79, 60, 80]).unwrap();
    assert_eq!(reply["ack"], json!("set_lep_cci"));
    let reply = client.set_spotmeter_roi(&Spotmeter::default()).unwrap();
    assert_eq!(reply["ack"], json!("set_lep_cci"));

    client.shutdown();
    let seen = camera.finish();
    let expected = json!({"command": 0x4ECD, "length": 4, "data": "OwBPADwAUAA="});
    assert_eq!(seen[0]["args"], expected);
    assert_eq!(seen[1]["args"], expected);
}

#[test]
fn frames_sharing_one_read_arrive_in_order() {
    let camera = FakeCamera::start();
    let client = client();
    client.connect("127.0.0.1", camera.port).unwrap();

    let reply = client
        .start_stream(StreamOptions {
            delay_msec: 0,
            num_frames: 2,
        })
        .unwrap();
    assert_eq!(reply["stream"], json!("on"));

    let deadline = Instant::now() + Duration::from_secs(2);
    while client.frame_count() < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(client.frame_count(), 2);

    let first = client.next_frame(None).unwrap();
    assert_eq!(client.frame_count(), 1);
    let second = client.next_frame(None).unwrap();
    assert_eq!(first["seq"], json!(1));
    assert_eq!(second["seq"], json!(2));
    assert_eq!(client.frame_count(), 0);
    assert!(client.get_frame().is_none());

    client.shutdown();
    camera.finish();
}

#[test]
fn get_image_decodes_frame() {
    let camera = FakeCamera::start();
    let client = client();
    client.connect("127.0.0.1", camera.port).unwrap();

    let image = client.capture(None).unwrap();
    assert_eq!(image.min_max(), (29_515, 29_515));
    let telemetry = image.telemetry().unwrap();
    assert!((telemetry.fpa_temp_celsius() - 30.0).abs() < 1e-9);

    client.shutdown();
    camera.finish();
}

#[test]
fn image_request_before_connect_leaves_no_stale_response() {
    let camera = FakeCamera::start();
    let client = client();

    let early = client.get_image(Some(Duration::from_millis(500))).unwrap();
    assert_eq!(early.error(), Some("not connected"));

    let reply = client.connect("127.0.0.1", camera.port).unwrap();
    assert_eq!(reply.status(), Some("connected"));
    let status = client.get_status().unwrap();
    assert_eq!(status["status"]["Camera"], json!("tCam-Mini"));

    client.shutdown();
    camera.finish();
}

#[test]
fn status_request_before_connect_leaves_no_stale_frame() {
    let camera = FakeCamera::start();
    let client = client();

    let early = client.get_status().unwrap();
    assert_eq!(early.error(), Some("not connected"));
    assert_eq!(client.frame_count(), 0);

    client.connect("127.0.0.1", camera.port).unwrap();
    let frame = client.get_image(None).unwrap();
    assert_eq!(frame.error(), None);
    assert_eq!(frame["seq"], json!(0));
    assert!(client.get_frame().is_none());

    client.shutdown();
    camera.finish();
}

#[test]
fn get_frame_on_empty_queue_does_not_block() {
    let camera = FakeCamera::start();
    let client = client();
    client.connect("127.0.0.1", camera.port).unwrap();

    let started = Instant::now();
    assert!(client.get_frame().is_none());
    assert!(started.elapsed() < Duration::from_millis(500));

    client.shutdown();
    camera.finish();
}

#[test]
fn unanswered_request_times_out() {
    let camera = FakeCamera::start();
    let client = client();
    client.connect("127.0.0.1", camera.port).unwrap();

    let err = client
        .request(
            tcam_client::Command::new(tcam_client::CommandKind::GetWifi),
            Some(Duration::from_millis(200)),
        )
        .unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)));

    client.shutdown();
    camera.finish();
}

#[test]
fn camera_hangup_is_reported() {
    let camera = FakeCamera::start();
    let client = client();
    client.connect("127.0.0.1", camera.port).unwrap();

    let reply = client.run_ffc().unwrap();
    assert_eq!(reply.status(), Some("disconnected"));
    assert!(reply.get("reason").is_some());

    let reply = client.get_status().unwrap();
    assert_eq!(reply.error(), Some("not connected"));

    client.shutdown();
    camera.finish();
}

#[test]
fn failed_connect_reports_reason() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = client();
    let reply = client.connect("127.0.0.1", port).unwrap();
    assert_eq!(reply.status(), Some("disconnected"));
    assert!(reply["reason"].as_str().unwrap().contains("127.0.0.1"));
    client.shutdown();
}

#[test]
fn shutdown_while_idle_is_prompt() {
    let config = ClientConfig::default().with_idle_timeout(Duration::from_secs(30));
    let client = CameraClient::with_transport(SocketTransport::new(), config).unwrap();

    let started = Instant::now();
    client.shutdown();
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn dropping_the_client_disconnects() {
    let camera = FakeCamera::start();
    {
        let client = client();
        client.connect("127.0.0.1", camera.port).unwrap();
    }
    // The camera sees the hangup and returns.
    assert!(camera.finish().is_empty());
}
