mod support;

use futures_util::SinkExt;
use serde_json::json;
use support::{assert_silent, frame, next_event, spawn_server};

#[tokio::test]
async fn chat_round_trip_over_websocket() {
    let server = spawn_server().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let room = server.create_room("general").await;
    let room_id = room["id"].as_str().unwrap().to_owned();

    let mut alice_ws = server.connect(Some(&alice.token)).await;
    alice_ws.send(frame("join-room", json!(room_id))).await.unwrap();
    let history = next_event(&mut alice_ws).await;
    assert_eq!(history["event"], "room-messages");
    assert_eq!(history["data"], json!([]));

    let mut bob_ws = server.connect_with_query_token(&bob.token).await;
    bob_ws
        .send(frame("join-room", json!({ "roomId": room_id })))
        .await
        .unwrap();
    assert_eq!(next_event(&mut bob_ws).await["event"], "room-messages");

    let joined = next_event(&mut alice_ws).await;
    assert_eq!(joined["event"], "user-joined");
    assert_eq!(joined["data"]["userId"], bob.user_id);
    assert_eq!(joined["data"]["username"], "bob");
    assert_eq!(joined["data"]["roomId"], room_id);

    alice_ws
        .send(frame(
            "send-message",
            json!({ "roomId": room_id, "content": "hello bob" }),
        ))
        .await
        .unwrap();

    for socket in [&mut alice_ws, &mut bob_ws] {
        let event = next_event(socket).await;
        assert_eq!(event["event"], "new-message");
        assert_eq!(event["data"]["content"], "hello bob");
        assert_eq!(event["data"]["roomId"], room_id);
        assert_eq!(event["data"]["user"]["username"], "alice");
    }

    // 新加入的连接能看到历史
    let mut late_ws = server.connect(Some(&bob.token)).await;
    late_ws.send(frame("join-room", json!(room_id))).await.unwrap();
    let history = next_event(&mut late_ws).await;
    assert_eq!(history["event"], "room-messages");
    assert_eq!(history["data"][0]["content"], "hello bob");
}

#[tokio::test]
async fn edits_and_deletes_are_broadcast() {
    let server = spawn_server().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let room = server.create_room("general").await;
    let room_id = room["id"].as_str().unwrap().to_owned();

    let mut alice_ws = server.connect(Some(&alice.token)).await;
    alice_ws.send(frame("join-room", json!(room_id))).await.unwrap();
    next_event(&mut alice_ws).await;
    let mut bob_ws = server.connect(Some(&bob.token)).await;
    bob_ws.send(frame("join-room", json!(room_id))).await.unwrap();
    next_event(&mut bob_ws).await;
    next_event(&mut alice_ws).await; // user-joined

    alice_ws
        .send(frame(
            "send-message",
            json!({ "roomId": room_id, "content": "draft" }),
        ))
        .await
        .unwrap();
    let created = next_event(&mut bob_ws).await;
    next_event(&mut alice_ws).await;
    let message_id = created["data"]["id"].as_str().unwrap().to_owned();

    // 非作者编辑只会收到错误，房间内无广播
    bob_ws
        .send(frame(
            "update-message",
            json!({ "messageId": message_id, "content": "hijack", "roomId": room_id }),
        ))
        .await
        .unwrap();
    let rejected = next_event(&mut bob_ws).await;
    assert_eq!(rejected["event"], "error");
    assert_eq!(rejected["data"]["code"], "FORBIDDEN");
    assert_silent(&mut alice_ws).await;

    alice_ws
        .send(frame(
            "update-message",
            json!({ "messageId": message_id, "content": "final", "roomId": room_id }),
        ))
        .await
        .unwrap();
    for socket in [&mut alice_ws, &mut bob_ws] {
        let event = next_event(socket).await;
        assert_eq!(event["event"], "message-updated");
        assert_eq!(event["data"]["content"], "final");
    }

    alice_ws
        .send(frame(
            "delete-message",
            json!({ "messageId": message_id, "roomId": room_id }),
        ))
        .await
        .unwrap();
    for socket in [&mut alice_ws, &mut bob_ws] {
        let event = next_event(socket).await;
        assert_eq!(event["event"], "message-deleted");
        assert_eq!(event["data"], message_id);
    }
}

#[tokio::test]
async fn closing_a_socket_notifies_the_room() {
    let server = spawn_server().await;
    let alice = server.register("alice").await;
    let bob = server.register("bob").await;
    let room = server.create_room("general").await;
    let room_id = room["id"].as_str().unwrap().to_owned();

    let mut alice_ws = server.connect(Some(&alice.token)).await;
    alice_ws.send(frame("join-room", json!(room_id))).await.unwrap();
    next_event(&mut alice_ws).await;
    let mut bob_ws = server.connect(Some(&bob.token)).await;
    bob_ws.send(frame("join-room", json!(room_id))).await.unwrap();
    next_event(&mut bob_ws).await;
    next_event(&mut alice_ws).await;

    bob_ws.close(None).await.unwrap();

    let left = next_event(&mut alice_ws).await;
    assert_eq!(left["event"], "user-left");
    assert_eq!(left["data"]["userId"], bob.user_id);
    assert_eq!(left["data"]["roomId"], room_id);
}

#[tokio::test]
async fn unknown_room_and_missing_credentials_yield_errors() {
    let server = spawn_server().await;
    let alice = server.register("alice").await;

    let mut alice_ws = server.connect(Some(&alice.token)).await;
    alice_ws
        .send(frame("join-room", json!("nonexistent")))
        .await
        .unwrap();
    let error = next_event(&mut alice_ws).await;
    assert_eq!(error["event"], "error");
    assert_eq!(error["data"]["code"], "NOT_FOUND");
    assert_silent(&mut alice_ws).await;

    let room = server.create_room("general").await;
    let mut anonymous = server.connect(None).await;
    anonymous
        .send(frame(
            "send-message",
            json!({ "roomId": room["id"], "content": "hi" }),
        ))
        .await
        .unwrap();
    let error = next_event(&mut anonymous).await;
    assert_eq!(error["event"], "error");
    assert_eq!(error["data"]["code"], "UNAUTHENTICATED");
    assert_eq!(error["data"]["message"], "user not authenticated");
}
