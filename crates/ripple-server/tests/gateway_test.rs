//! Integration tests: REST surface + WebSocket gateway end-to-end.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Start the server on a random port and return (base_url, addr).
async fn start_test_server() -> (String, SocketAddr) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");

    let config = ripple_server::Config {
        jwt_secret: "test-secret".into(),
        db_path: tmp_dir.path().join("ripple.db"),
        host: "127.0.0.1".into(),
        port: 0,
        media_url: None,
    };

    let app = ripple_server::build_app(&config).expect("Failed to build app");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), addr)
}

/// Register a user and return (token, user_id).
async fn register_user(base_url: &str, username: &str) -> (String, String) {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/auth/register", base_url))
        .json(&json!({ "username": username, "password": "hunter2secret" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let body: Value = resp.json().await.unwrap();
    (
        body["token"].as_str().unwrap().to_string(),
        body["user_id"].as_str().unwrap().to_string(),
    )
}

async fn connect_gateway(addr: &SocketAddr, token: &str) -> WsStream {
    let (ws, _) =
        tokio_tungstenite::connect_async(format!("ws://{}/gateway?token={}", addr, token))
            .await
            .expect("gateway connect failed");
    ws
}

/// Read gateway events until one with the wanted type arrives (or time out).
async fn wait_for_event(ws: &mut WsStream, wanted: &str) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for gateway event")
            .expect("socket closed")
            .expect("socket error");

        match msg {
            Message::Text(text) => {
                let event: Value = serde_json::from_str(&text).unwrap();
                if event["type"] == wanted {
                    return event;
                }
            }
            Message::Ping(payload) => {
                let _ = ws.send(Message::Pong(payload)).await;
            }
            _ => {}
        }
    }
}

/// Read OnlineUsers events until the set has the expected size.
async fn wait_for_online_set(ws: &mut WsStream, expected_len: usize) -> Vec<String> {
    loop {
        let event = wait_for_event(ws, "OnlineUsers").await;
        let ids: Vec<String> = event["data"]["user_ids"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        if ids.len() == expected_len {
            return ids;
        }
    }
}

#[tokio::test]
async fn offline_send_creates_conversation_and_summary() {
    let (base_url, _addr) = start_test_server().await;
    let (token_a, user_a) = register_user(&base_url, "alice").await;
    let (_token_b, user_b) = register_user(&base_url, "bob").await;

    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/messages", base_url))
        .bearer_auth(&token_a)
        .json(&json!({ "recipient_id": user_b, "text": "hi" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let message: Value = resp.json().await.unwrap();
    assert_eq!(message["text"], "hi");
    assert_eq!(message["seen"], false);
    assert_eq!(message["sender_id"], Value::String(user_a.clone()));

    let conversations: Value = client
        .get(format!("{}/conversations", base_url))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let list = conversations.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["last_message"]["text"], "hi");
    assert_eq!(list[0]["last_message"]["seen"], false);
    // The requester is stripped: only the counterpart is exposed.
    assert_eq!(list[0]["participant"]["username"], "bob");
}

#[tokio::test]
async fn online_recipient_receives_live_message() {
    let (base_url, addr) = start_test_server().await;
    let (token_a, _user_a) = register_user(&base_url, "alice").await;
    let (token_b, user_b) = register_user(&base_url, "bob").await;

    let mut ws_b = connect_gateway(&addr, &token_b).await;
    wait_for_event(&mut ws_b, "Ready").await;

    let client = reqwest::Client::new();
    client
        .post(format!("{}/messages", base_url))
        .bearer_auth(&token_a)
        .json(&json!({ "recipient_id": user_b, "text": "there" }))
        .send()
        .await
        .unwrap();

    let event = wait_for_event(&mut ws_b, "NewMessage").await;
    assert_eq!(event["data"]["message"]["text"], "there");
}

#[tokio::test]
async fn live_mark_seen_notifies_the_sender() {
    let (base_url, addr) = start_test_server().await;
    let (token_a, _user_a) = register_user(&base_url, "alice").await;
    let (token_b, user_b) = register_user(&base_url, "bob").await;

    let client = reqwest::Client::new();
    let message: Value = client
        .post(format!("{}/messages", base_url))
        .bearer_auth(&token_a)
        .json(&json!({ "recipient_id": user_b, "text": "hi" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let conversation_id = message["conversation_id"].as_str().unwrap().to_string();

    let mut ws_a = connect_gateway(&addr, &token_a).await;
    wait_for_event(&mut ws_a, "Ready").await;
    let mut ws_b = connect_gateway(&addr, &token_b).await;
    wait_for_event(&mut ws_b, "Ready").await;

    let cmd = json!({ "type": "MarkSeen", "data": { "conversation_id": conversation_id } });
    ws_b.send(Message::Text(cmd.to_string().into()))
        .await
        .unwrap();

    let event = wait_for_event(&mut ws_a, "MessagesSeen").await;
    assert_eq!(
        event["data"]["conversation_id"],
        Value::String(conversation_id.clone())
    );

    let messages: Value = client
        .get(format!(
            "{}/conversations/{}/messages",
            base_url, conversation_id
        ))
        .bearer_auth(&token_a)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(
        messages
            .as_array()
            .unwrap()
            .iter()
            .all(|m| m["seen"] == true)
    );
}

#[tokio::test]
async fn interaction_fanout_persists_and_pushes() {
    let (base_url, addr) = start_test_server().await;
    let (token_a, user_a) = register_user(&base_url, "alice").await;
    let (token_b, user_b) = register_user(&base_url, "bob").await;

    let mut ws_b = connect_gateway(&addr, &token_b).await;
    wait_for_event(&mut ws_b, "Ready").await;

    let client = reqwest::Client::new();
    let post_id = uuid::Uuid::new_v4().to_string();
    let outcome: Value = client
        .post(format!("{}/interactions", base_url))
        .bearer_auth(&token_a)
        .json(&json!({
            "recipient_id": user_b,
            "kind": "like",
            "related_post_id": post_id,
            "message": "alice liked your post",
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["persisted"], true);
    assert_eq!(outcome["pushed"], true);

    let event = wait_for_event(&mut ws_b, "NewNotification").await;
    assert_eq!(event["data"]["kind"], "like");
    assert_eq!(event["data"]["sender_id"], Value::String(user_a.clone()));

    // Self-notification short-circuits entirely.
    let outcome: Value = client
        .post(format!("{}/interactions", base_url))
        .bearer_auth(&token_a)
        .json(&json!({
            "recipient_id": user_a,
            "kind": "like",
            "message": "self",
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(outcome["persisted"], false);

    let notifications: Value = client
        .get(format!("{}/notifications", base_url))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let list = notifications.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["is_read"], false);
    assert_eq!(list[0]["sender"]["username"], "alice");

    let notification_id = list[0]["id"].as_str().unwrap();
    let resp = client
        .post(format!(
            "{}/notifications/{}/read",
            base_url, notification_id
        ))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    let notifications: Value = client
        .get(format!("{}/notifications", base_url))
        .bearer_auth(&token_b)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(notifications.as_array().unwrap()[0]["is_read"], true);
}

#[tokio::test]
async fn online_set_tracks_connects_and_disconnects() {
    let (base_url, addr) = start_test_server().await;
    let (token_a, user_a) = register_user(&base_url, "alice").await;
    let (token_b, user_b) = register_user(&base_url, "bob").await;

    let mut ws_a = connect_gateway(&addr, &token_a).await;
    let ids = wait_for_online_set(&mut ws_a, 1).await;
    assert_eq!(ids, vec![user_a.clone()]);

    let mut ws_b = connect_gateway(&addr, &token_b).await;
    let ids = wait_for_online_set(&mut ws_a, 2).await;
    assert!(ids.contains(&user_a));
    assert!(ids.contains(&user_b));

    ws_b.close(None).await.unwrap();
    let ids = wait_for_online_set(&mut ws_a, 1).await;
    assert_eq!(ids, vec![user_a]);
}

#[tokio::test]
async fn anonymous_connection_is_accepted_but_silent() {
    let (_base_url, addr) = start_test_server().await;

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/gateway", addr))
        .await
        .expect("anonymous connect failed");

    // No Ready, no presence broadcast — the socket just stays open.
    let got_event = tokio::time::timeout(Duration::from_millis(400), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(_))) => break true,
                Some(Ok(_)) => continue,
                _ => break false,
            }
        }
    })
    .await;
    assert!(got_event.is_err() || !got_event.unwrap());
}
