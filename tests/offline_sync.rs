mod common;

use std::sync::Arc;

use chat_mirror::ui::chat_view::render;
use chat_mirror::{
    Composer, Identity, MemoryStore, MemoryStream, MessageStream, NewMessage, SendOutcome,
    ViewSource,
};
use common::*;

#[tokio::test]
async fn cached_list_is_shown_before_the_network_answers() {
    let store = store_with(&[message("m1", "b@x.com", "yesterday", 50)]);
    let stream = Arc::new(ScriptedStream::default());
    let (mut sync, _notices) = coordinator(store, stream);

    sync.start().await;

    let view = sync.current();
    assert!(!view.messages.is_empty());
    assert_eq!(view.source, ViewSource::Cache);
    sync.stop().await;
}

#[tokio::test]
async fn same_snapshot_twice_is_same_as_once() {
    let store = Arc::new(MemoryStore::new());
    let stream = Arc::new(ScriptedStream::default());
    let (mut sync, _notices) = coordinator(Arc::clone(&store), Arc::clone(&stream));
    sync.start().await;
    let mut rx = sync.view();
    let snapshot = vec![
        message("m1", "a@x.com", "one", 1),
        message("m2", "b@x.com", "two", 2),
    ];

    stream.deliver(snapshot.clone());
    let once = (next_view(&mut rx).await, cached_raw(&store));
    stream.deliver(snapshot);
    let twice = (next_view(&mut rx).await, cached_raw(&store));

    assert_eq!(once, twice);
    sync.stop().await;
}

#[tokio::test]
async fn rendered_list_follows_created_at() {
    let stream = Arc::new(MemoryStream::sequential(10));
    let (mut sync, _notices) = coordinator(Arc::new(MemoryStore::new()), Arc::clone(&stream));
    sync.start().await;
    let mut rx = sync.view();

    for text in ["first", "second", "third"] {
        stream.append(NewMessage::text("a@x.com", text)).await.unwrap();
    }
    let view = rx
        .wait_for(|v| v.messages.len() == 3)
        .await
        .unwrap()
        .clone();

    let bubbles = render(&view.messages, "a@x.com");
    let texts: Vec<_> = bubbles.iter().filter_map(|b| b.text.as_deref()).collect();
    assert_eq!(texts, ["first", "second", "third"]);
    for pair in view.messages.windows(2) {
        assert!(pair[0].created_at < pair[1].created_at);
    }
    sync.stop().await;
}

#[tokio::test]
async fn only_non_blank_text_is_appended() {
    let stream = Arc::new(ScriptedStream::default());
    let mut composer = Composer::new(Arc::clone(&stream), Identity::new("a@x.com").unwrap());

    for blank in ["", "   "] {
        composer.set_draft(blank);
        assert_eq!(composer.send_text().await.unwrap(), SendOutcome::Skipped);
    }
    assert!(stream.appended().is_empty());

    composer.set_draft("hi");
    composer.send_text().await.unwrap();

    let appended = stream.appended();
    assert_eq!(appended.len(), 1);
    assert_eq!(appended[0].text.as_deref(), Some("hi"));
    assert_eq!(appended[0].image_base64, None);
}

#[tokio::test]
async fn late_snapshot_after_stop_changes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let stream = Arc::new(ScriptedStream::default());
    let (mut sync, _notices) = coordinator(Arc::clone(&store), Arc::clone(&stream));
    sync.start().await;
    let mut rx = sync.view();
    stream.deliver(vec![message("m1", "a@x.com", "before", 1)]);
    let before = next_view(&mut rx).await;
    let cache_before = cached_raw(&store);

    sync.stop().await;
    stream.deliver(vec![message("m2", "a@x.com", "after", 2)]);
    tokio::task::yield_now().await;

    assert_eq!(sync.current(), before);
    assert_eq!(cached_raw(&store), cache_before);
}

#[tokio::test]
async fn appended_message_round_trips_into_cache_and_view() {
    let store = Arc::new(MemoryStore::new());
    let stream = Arc::new(MemoryStream::sequential(100));
    let (mut sync, _notices) = coordinator(Arc::clone(&store), Arc::clone(&stream));
    sync.start().await;
    let mut rx = sync.view();

    let id = stream
        .append(NewMessage::text("a@x.com", "hello"))
        .await
        .unwrap();
    assert_eq!(id, "m1");
    let view = rx
        .wait_for(|v| v.messages.len() == 1)
        .await
        .unwrap()
        .clone();

    assert_eq!(
        cached_raw(&store),
        Some(serde_json::json!([{
            "id": "m1",
            "text": "hello",
            "user": "a@x.com",
            "createdAt": {"seconds": 100, "nanoseconds": 0},
            "imageBase64": null
        }]))
    );
    let bubbles = render(&view.messages, "someone@else.com");
    assert_eq!(bubbles.len(), 1);
    assert_eq!(bubbles[0].sender, "a@x.com");
    assert_eq!(bubbles[0].text.as_deref(), Some("hello"));
    sync.stop().await;
}
