// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use obr_adapters::control::{send_event, ControlAgent};
use obr_core::{ObserverEvent, ObserverKind, StateSnapshot};

fn snapshot() -> StateSnapshot {
    StateSnapshot {
        session_id: "web-obs".into(),
        url: String::new(),
        title: String::new(),
        controlled: false,
        learning_active: false,
        incident_open: false,
        ack_count: 0,
        last_ack_at: None,
        agent_online: true,
    }
}

fn event(kind: ObserverKind, ts: u64) -> ObserverEvent {
    ObserverEvent { kind, step: 0, payload: serde_json::json!({}), ts }
}

#[tokio::test]
async fn channel_source_delivers_in_order() {
    let (tx, rx) = tokio::sync::mpsc::channel(8);
    let mut source = ObserverSource::channel(rx);
    tx.send(event(ObserverKind::Scroll, 1)).await.unwrap();
    tx.send(event(ObserverKind::ManualClick, 2)).await.unwrap();

    let first = source.next(Duration::from_millis(100)).await.unwrap();
    let second = source.next(Duration::from_millis(100)).await.unwrap();
    assert_eq!(first.ts, 1);
    assert_eq!(second.ts, 2);
}

#[tokio::test]
async fn channel_source_times_out_quietly() {
    let (_tx, rx) = tokio::sync::mpsc::channel::<ObserverEvent>(1);
    let mut source = ObserverSource::channel(rx);
    assert!(source.next(Duration::from_millis(30)).await.is_none());
}

#[tokio::test]
async fn polling_source_drains_the_agent_buffer() {
    let handle = ControlAgent::start(snapshot()).await.unwrap();
    send_event(handle.port(), &event(ObserverKind::ManualClick, 10)).await.unwrap();
    send_event(handle.port(), &event(ObserverKind::Scroll, 11)).await.unwrap();

    let mut source = ObserverSource::polling(handle.port());
    let first = source.next(Duration::from_secs(2)).await.unwrap();
    let second = source.next(Duration::from_secs(2)).await.unwrap();
    assert_eq!(first.ts, 10);
    assert_eq!(second.ts, 11);

    // Cursor advanced: nothing new to deliver.
    assert!(source.next(Duration::from_millis(50)).await.is_none());
}

#[tokio::test]
async fn drain_collects_what_is_ready() {
    let (tx, rx) = tokio::sync::mpsc::channel(8);
    let mut source = ObserverSource::channel(rx);
    for ts in 0..3 {
        tx.send(event(ObserverKind::ConsoleError, ts)).await.unwrap();
    }
    let drained = source.drain().await;
    assert_eq!(drained.len(), 3);
}
