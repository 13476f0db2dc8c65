use hue_bridge_settings::{
    ActionOutcome, DeviceClient, HueBridgeClient, Phase, SettingsSynchronizer,
    bridge::{PartialSettings, UpdateState},
};
use std::{net::SocketAddr, time::Duration};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

const CONFIG: &str = r#"{
    "name": "Philips hue",
    "apiversion": "1.50.0",
    "swversion": "1950207110",
    "linkbutton": false,
    "timezone": "Europe/Berlin",
    "zigbeechannel": 15,
    "mac": "00:17:88:aa:bb:cc",
    "ipaddress": "192.168.1.2",
    "netmask": "255.255.255.0",
    "gateway": "192.168.1.1",
    "dhcp": true,
    "proxyaddress": "none",
    "proxyport": 0,
    "swupdate2": {
        "state": "noupdates",
        "autoinstall": {"on": true, "updatetime": "T03:00:00"},
        "bridge": {"state": "noupdates"}
    }
}"#;

const CAPABILITIES: &str = r#"{
    "lights": {"available": 60, "total": 63},
    "timezones": {"values": ["Europe/Berlin", "UTC"]}
}"#;

const UNAUTHORIZED: &str =
    r#"[{"error": {"type": 1, "address": "/config", "description": "unauthorized user"}}]"#;

/// One request as seen by the mock bridge
#[derive(Debug)]
struct Recorded {
    method: String,
    path: String,
    body: String,
}

fn respond(method: &str, path: &str, body: &str) -> String {
    match (method, path) {
        ("GET", "/api/user/config") => CONFIG.to_string(),
        ("GET", "/api/user/capabilities") => CAPABILITIES.to_string(),
        ("GET", "/api/user/info/timezones") => r#"["UTC"]"#.to_string(),
        ("PUT", "/api/user/config") if body.contains("\"name\":\"Forbidden\"") => {
            UNAUTHORIZED.to_string()
        }
        ("PUT", "/api/user/config") => r#"[{"success": {"/config": "updated"}}]"#.to_string(),
        (_, _) if path.starts_with("/api/other") => UNAUTHORIZED.to_string(),
        _ => "[]".to_string(),
    }
}

/// Serve canned bridge responses, reporting every request on `requests`
async fn start_mock_bridge(requests: mpsc::UnboundedSender<Recorded>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind mock bridge");
    let addr = listener.local_addr().expect("no local address");

    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let requests = requests.clone();

            tokio::spawn(async move {
                let mut reader = BufReader::new(&mut stream);

                let mut request_line = String::new();
                if reader.read_line(&mut request_line).await.is_err() {
                    return;
                }
                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or_default().to_string();
                let path = parts.next().unwrap_or_default().to_string();

                // Read HTTP headers
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).await.is_err() {
                        return;
                    }
                    if line.trim().is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap_or(0);
                        }
                    }
                }

                let mut body = vec![0; content_length];
                if reader.read_exact(&mut body).await.is_err() {
                    return;
                }
                let body = String::from_utf8_lossy(&body).to_string();

                let response_body = respond(&method, &path, &body);
                let _ = requests.send(Recorded { method, path, body });

                let http_response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    response_body.len(),
                    response_body
                );
                let _ = stream.write_all(http_response.as_bytes()).await;
            });
        }
    });

    addr
}

async fn client_for(path: &str) -> (HueBridgeClient, mpsc::UnboundedReceiver<Recorded>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let addr = start_mock_bridge(tx).await;
    let client = HueBridgeClient::with_api_url(format!("http://{addr}{path}"), Duration::from_secs(5))
        .expect("failed to create bridge client");
    (client, rx)
}

#[tokio::test]
async fn reads_settings_and_capabilities() {
    let (client, _requests) = client_for("/api/user").await;

    let settings = client.read_settings().await.expect("settings read failed");
    assert_eq!(settings.name, "Philips hue");
    assert_eq!(settings.zigbeechannel, 15);
    assert!(settings.swupdate.is_none());
    assert!(settings.swupdate2.is_some());

    let capabilities = client
        .read_capabilities()
        .await
        .expect("capabilities read failed");
    assert_eq!(
        capabilities.time_zones(),
        Some(["Europe/Berlin".to_string(), "UTC".to_string()].as_slice())
    );

    assert_eq!(client.read_time_zones().await.unwrap(), vec!["UTC"]);
    assert!(client.last_errors().is_empty());
}

#[tokio::test]
async fn records_bridge_errors() {
    let (client, _requests) = client_for("/api/other").await;

    let err = client.read_settings().await.unwrap_err();

    assert!(err.to_string().contains("unauthorized user"));
    let errors = client.last_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, 1);
    assert_eq!(errors[0].address, "/config");
}

#[tokio::test]
async fn writes_only_set_fields() {
    let (client, mut requests) = client_for("/api/user").await;

    client
        .write_settings(PartialSettings {
            timezone: Some("UTC".to_string()),
            ..Default::default()
        })
        .await
        .expect("settings write failed");

    let request = requests.recv().await.expect("no request recorded");
    assert_eq!(request.method, "PUT");
    assert_eq!(request.path, "/api/user/config");
    assert_eq!(request.body, r#"{"timezone":"UTC"}"#);
}

#[tokio::test]
async fn sends_firmware_commands() {
    let (client, mut requests) = client_for("/api/user").await;

    client.check_for_update().await.unwrap();
    client.request_firmware_install().await.unwrap();

    let check = requests.recv().await.unwrap();
    assert_eq!(check.body, r#"{"swupdate2":{"checkforupdate":true}}"#);
    let install = requests.recv().await.unwrap();
    assert_eq!(install.body, r#"{"swupdate2":{"install":true}}"#);
}

#[tokio::test]
async fn session_against_mock_bridge() {
    let (client, _requests) = client_for("/api/user").await;
    let mut session = SettingsSynchronizer::new(client);

    assert_eq!(session.initialize().await, ActionOutcome::Completed);
    assert_eq!(session.phase(), Phase::Ready);
    assert_eq!(session.update_state(), UpdateState::NoUpdates);
    assert!(session.can_auto_install());
    assert!(session.software().current().auto_update);
    assert_eq!(session.general().current().time_zones.len(), 2);
    assert!(session.commands().check_for_update);
    assert!(!session.commands().install_firmware);

    session
        .general_mut()
        .set(|g| &mut g.name, "Forbidden".to_string());
    let outcome = session.apply_general_settings().await;

    assert!(matches!(outcome, ActionOutcome::Failed(ref msg) if msg.contains("unauthorized user")));
    assert!(session.general().is_changed());

    session
        .general_mut()
        .set(|g| &mut g.name, "Living room".to_string());
    assert_eq!(
        session.apply_general_settings().await,
        ActionOutcome::Completed
    );
    assert!(!session.general().is_changed());
}
