// End-to-end session tests against a scripted hub
//
// The hub side is driven through a channel-backed transport; everything else
// goes through the public K1Hub API.

use std::sync::Arc;
use std::time::Duration;

use elro_k1_bridge::codec::encode_ascii;
use elro_k1_bridge::{
    DeviceCategory, DeviceState, HubConfig, HubEvent, K1Error, K1Hub, SessionState, Transport,
};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio::time::timeout;

const TOKEN: &str = "ST_a1b2c3d4e5f6";

struct ChannelTransport {
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl Transport for ChannelTransport {
    async fn send(&self, datagram: &[u8]) -> elro_k1_bridge::Result<()> {
        self.outbound
            .send(datagram.to_vec())
            .map_err(|_| K1Error::TransportClosed)
    }

    async fn recv(&self) -> elro_k1_bridge::Result<Vec<u8>> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or(K1Error::TransportClosed)
    }
}

struct ScriptedHub {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl ScriptedHub {
    fn send(&self, text: &str) {
        self.tx.send(text.as_bytes().to_vec()).unwrap();
    }

    fn send_data(&self, data: Value) {
        let envelope = serde_json::json!({
            "msgId": 1,
            "action": "devSend",
            "params": { "devTid": TOKEN, "data": data }
        });
        self.send(&envelope.to_string());
    }

    async fn next_raw(&mut self) -> String {
        let bytes = timeout(Duration::from_secs(600), self.rx.recv())
            .await
            .expect("hub waited too long")
            .expect("session closed");
        String::from_utf8(bytes).unwrap()
    }

    /// Next JSON frame carrying `cmd_id`, skipping everything else.
    async fn next_command(&mut self, cmd_id: i64) -> Value {
        loop {
            let raw = self.next_raw().await;
            if !raw.starts_with('{') {
                continue;
            }
            let frame: Value = serde_json::from_str(&raw).unwrap();
            if frame["params"]["data"]["cmdId"] == cmd_id {
                return frame;
            }
        }
    }
}

fn setup() -> (Arc<K1Hub<ChannelTransport>>, ScriptedHub) {
    let (to_session, inbound) = mpsc::unbounded_channel();
    let (outbound, from_session) = mpsc::unbounded_channel();
    let transport = ChannelTransport {
        inbound: Mutex::new(inbound),
        outbound,
    };
    let config = HubConfig::builder()
        .hub_ip("127.0.0.1")
        .device_token(TOKEN)
        .startup_sync_delay_ms(100)
        .build();
    let hub = Arc::new(K1Hub::with_transport(config, transport));
    (
        hub,
        ScriptedHub {
            tx: to_session,
            rx: from_session,
        },
    )
}

async fn connect(hub: &Arc<K1Hub<ChannelTransport>>, scripted: &mut ScriptedHub) {
    assert_eq!(scripted.next_raw().await, format!("IOT_KEY?{TOKEN}"));
    scripted.send(&format!("NAME:{TOKEN}\nKEY:secret-ctrl\nBIND:secret-bind\n"));
    let sync = scripted.next_command(29).await;
    assert_eq!(sync["params"]["ctrlKey"], "secret-ctrl");
    assert_eq!(hub.state(), SessionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn handshake_then_startup_requests() {
    let (hub, mut scripted) = setup();
    let mut events = hub.subscribe();
    let runner = Arc::clone(&hub);
    let session = tokio::spawn(async move { runner.run().await });

    connect(&hub, &mut scripted).await;
    assert_eq!(events.recv().await.unwrap(), HubEvent::Connected);

    let scenes = scripted.next_command(31).await;
    assert_eq!(scenes["msgId"], 2);
    assert_eq!(scenes["params"]["data"]["sence_group"], 0);
    let names = scripted.next_command(14).await;
    assert_eq!(names["msgId"], 3);
    assert_eq!(names["params"]["appTid"], "0");

    session.abort();
}

#[tokio::test(start_paused = true)]
async fn devices_follow_hub_reports() {
    let (hub, mut scripted) = setup();
    let mut events = hub.subscribe();
    let runner = Arc::clone(&hub);
    let session = tokio::spawn(async move { runner.run().await });
    connect(&hub, &mut scripted).await;
    assert_eq!(events.recv().await.unwrap(), HubEvent::Connected);

    // Name arrives before the device itself
    let name = encode_ascii("Back door").unwrap();
    scripted.send_data(serde_json::json!({
        "cmdId": 17,
        "answer_content": format!("0007{name}")
    }));
    scripted.send_data(serde_json::json!({
        "cmdId": 19, "device_ID": 5, "device_name": "0001", "device_status": "0464AA00"
    }));
    scripted.send_data(serde_json::json!({
        "cmdId": 19, "device_ID": 7, "device_name": "0101", "device_status": "03505500"
    }));

    assert_eq!(events.recv().await.unwrap(), HubEvent::DeviceAdded { id: 5 });
    assert_eq!(events.recv().await.unwrap(), HubEvent::DeviceAdded { id: 7 });

    let smoke = hub.device(5).await.unwrap();
    assert_eq!(smoke.category, DeviceCategory::SmokeAlarm);
    assert_eq!(smoke.state, DeviceState::Normal);
    assert_eq!(smoke.battery_level, Some(100));
    assert_eq!(smoke.signal_strength, Some(4));

    let door = hub.device(7).await.unwrap();
    assert_eq!(door.name, "Back door");
    assert_eq!(door.category, DeviceCategory::DoorWindowSensor);
    assert_eq!(door.state, DeviceState::Open);
    assert_eq!(door.battery_level, Some(80));

    // Alarm trigger for the smoke alarm
    let mut watch = hub.watch_device(5).await.unwrap();
    scripted.send_data(serde_json::json!({
        "cmdId": 25,
        "answer_content": "0000000005000104645500"
    }));
    timeout(Duration::from_secs(5), watch.alarm.wait())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hub.device(5).await.unwrap().state, DeviceState::Alarm);

    // Hub reports the door sensor deleted
    scripted.send_data(serde_json::json!({
        "cmdId": 19, "device_ID": 7, "device_name": "DEL", "device_status": ""
    }));
    assert_eq!(events.recv().await.unwrap(), HubEvent::DeviceRemoved { id: 7 });
    assert!(hub.device(7).await.is_none());
    assert_eq!(hub.devices().await.len(), 1);

    session.abort();
}

#[tokio::test(start_paused = true)]
async fn commands_use_session_keys_and_ids() {
    let (hub, mut scripted) = setup();
    let runner = Arc::clone(&hub);
    let session = tokio::spawn(async move { runner.run().await });
    connect(&hub, &mut scripted).await;

    scripted.send_data(serde_json::json!({
        "cmdId": 19, "device_ID": 3, "device_name": "0000", "device_status": "04645000"
    }));
    scripted.next_command(14).await;
    while hub.device(3).await.is_none() {
        tokio::task::yield_now().await;
    }

    assert!(hub.set_device_state(3, "17").await.unwrap());
    let control = scripted.next_command(1).await;
    assert_eq!(control["params"]["ctrlKey"], "secret-ctrl");
    assert_eq!(control["params"]["data"]["device_ID"], 3);
    assert_eq!(control["params"]["data"]["device_status"], "17000000");

    // Unknown device: nothing is sent
    assert!(!hub.set_device_state(42, "17").await.unwrap());

    hub.permit_join().await.unwrap();
    let join = scripted.next_command(2).await;
    assert!(join["msgId"].as_u64().unwrap() > control["msgId"].as_u64().unwrap());

    session.abort();
}

#[tokio::test(start_paused = true)]
async fn session_ends_when_transport_closes() {
    let (hub, scripted) = setup();
    drop(scripted);

    let err = hub.run().await.unwrap_err();
    assert!(matches!(err, K1Error::ReceiveExhausted { attempts: 1, .. }));
    assert_eq!(hub.state(), SessionState::Disconnected);
}
