use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use vision_agent::config::{NtMode, VisionConfig};
use vision_agent::telemetry::MqttBusOptions;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(json.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_config_and_selects_client_broker() {
    let _guard = ENV_LOCK.lock().unwrap();
    std::env::remove_var("VISION_BROKER_ADDR");

    let file = write_config(
        r#"{
            "team": 1234,
            "cameras": [
                { "name": "front", "path": "stub://front", "width": 320, "height": 240, "fps": 15,
                  "pixel format": "yuyv", "brightness": 30 },
                { "name": "rear", "path": "/dev/video1", "width": 160, "height": 120, "fps": 30 }
            ]
        }"#,
    );

    let cfg = VisionConfig::load(file.path()).expect("load config");
    assert_eq!(cfg.team, 1234);
    assert_eq!(cfg.ntmode, NtMode::Client);
    assert_eq!(cfg.cameras.len(), 2);
    assert_eq!(cfg.cameras[0].geometry.width, 320);
    assert_eq!(cfg.cameras[1].path, "/dev/video1");
    assert!(cfg.broker_addr.is_none());

    let options = MqttBusOptions::for_role(cfg.ntmode, cfg.team, cfg.broker_addr.as_deref())
        .expect("broker options");
    assert_eq!(options.endpoint.host, "10.12.34.2");
    assert_eq!(options.endpoint.port, 1883);
}

#[test]
fn env_override_replaces_broker_address() {
    let _guard = ENV_LOCK.lock().unwrap();
    let file = write_config(
        r#"{ "team": 254, "ntmode": "SERVER",
             "cameras": [{ "name": "c", "path": "stub://c", "width": 64, "height": 48, "fps": 10 }] }"#,
    );

    std::env::set_var("VISION_BROKER_ADDR", "broker.lan:1999");
    let cfg = VisionConfig::load(file.path()).expect("load config");
    std::env::remove_var("VISION_BROKER_ADDR");

    assert_eq!(cfg.ntmode, NtMode::Server);
    assert_eq!(cfg.broker_addr.as_deref(), Some("broker.lan:1999"));
    let options = MqttBusOptions::for_role(cfg.ntmode, cfg.team, cfg.broker_addr.as_deref())
        .expect("broker options");
    assert_eq!(options.endpoint.host, "broker.lan");
    assert_eq!(options.endpoint.port, 1999);
}

#[test]
fn missing_team_aborts_load() {
    let _guard = ENV_LOCK.lock().unwrap();
    let file = write_config(
        r#"{ "cameras": [{ "name": "c", "path": "stub://c", "width": 64, "height": 48, "fps": 10 }] }"#,
    );
    let err = VisionConfig::load(file.path()).unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("config error in '"), "{message}");
    assert!(message.contains("could not read team number"), "{message}");
}

#[test]
fn missing_frame_geometry_aborts_load() {
    let _guard = ENV_LOCK.lock().unwrap();
    let file = write_config(
        r#"{ "team": 1, "cameras": [{ "name": "c", "path": "stub://c", "height": 48, "fps": 10 }] }"#,
    );
    let err = VisionConfig::load(file.path()).unwrap_err();
    assert!(err.to_string().contains("could not read width"), "{err}");
}
