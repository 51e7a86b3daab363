//! Location replication specs
//!
//! Nodes of one deployment publish location updates on a shared stream and
//! pick up where the registered checkpoint says the snapshot ends.

use crate::prelude::*;

async fn listen(
    client: &EventStreamClient<LocalStreamTransport>,
    from: StreamPosition,
) -> tokio::sync::mpsc::UnboundedReceiver<ReceivedEvent> {
    let ctx = OperationContext::new();
    client.startup(&ctx).await.unwrap();
    let (handler, rx) = ChannelHandler::new();
    client
        .start_processing(&ctx, from, Arc::new(handler))
        .await
        .unwrap();
    rx
}

#[tokio::test]
async fn updates_from_one_node_reach_another_in_order() {
    let site = Site::new();
    let ctx = OperationContext::new();
    let writer = site.stream_client(&site.config("cache-01"));
    let reader = site.stream_client(&site.config("cache-02"));
    let mut rx = listen(&reader, StreamPosition::START).await;

    writer.startup(&ctx).await.unwrap();
    for update in ["grain-a@silo-1", "grain-b@silo-2", "grain-a@silo-3"] {
        writer.send(&ctx, text(update)).await.unwrap();
    }

    assert_eq!(
        collect(&mut rx, 3).await,
        vec!["grain-a@silo-1", "grain-b@silo-2", "grain-a@silo-3"]
    );

    writer.shutdown(&ctx).await.unwrap();
    reader.shutdown(&ctx).await.unwrap();
}

#[tokio::test]
async fn a_new_node_resumes_after_the_registered_snapshot() {
    let site = Site::new();
    let ctx = OperationContext::new();

    // The old node consumes two updates, snapshots them and registers where
    // the snapshot ends
    let old_config = site.config("cache-01");
    let old = site.stream_client(&old_config);
    let mut rx = listen(&old, StreamPosition::START).await;
    for update in ["one", "two"] {
        old.send(&ctx, text(update)).await.unwrap();
    }
    let seen = collect_received(&mut rx, 2).await;
    let snapshot = UuidIdGen::for_node("cache-01").next();
    site.registry(&old_config)
        .register_checkpoint(&ctx, snapshot.clone(), seen[1].position.next())
        .await
        .unwrap();
    old.send(&ctx, text("three")).await.unwrap();
    old.shutdown(&ctx).await.unwrap();

    let new_config = site.config("cache-02");
    let checkpoint = site
        .registry(&new_config)
        .get_checkpoint_state(&ctx)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.checkpoint_id, snapshot);
    assert!(snapshot.as_str().starts_with("cache-01/"));

    let new = site.stream_client(&new_config);
    let mut rx = listen(&new, checkpoint.stream_position).await;
    new.send(&ctx, text("four")).await.unwrap();

    assert_eq!(collect(&mut rx, 2).await, vec!["three", "four"]);
    new.shutdown(&ctx).await.unwrap();
}

#[tokio::test]
async fn suspended_processing_resumes_without_gaps() {
    let site = Site::new();
    let ctx = OperationContext::new();
    let client = site.stream_client(&site.config("cache-01"));
    let mut rx = listen(&client, StreamPosition::START).await;

    client.send(&ctx, text("before")).await.unwrap();
    let first = collect_received(&mut rx, 1).await;
    client.suspend_processing(&ctx).await.unwrap();

    // Sends keep working while processing is suspended
    client.send(&ctx, text("during")).await.unwrap();

    let (handler, mut resumed) = ChannelHandler::new();
    client
        .start_processing(&ctx, first[0].position.next(), Arc::new(handler))
        .await
        .unwrap();
    client.send(&ctx, text("after")).await.unwrap();

    assert_eq!(collect(&mut resumed, 2).await, vec!["during", "after"]);
    client.shutdown(&ctx).await.unwrap();
}

#[tokio::test]
async fn the_stream_outlives_every_client() {
    let site = Site::new();
    let ctx = OperationContext::new();
    let config = site.config("cache-01");

    let first = site.stream_client(&config);
    first.startup(&ctx).await.unwrap();
    first.send(&ctx, text("kept")).await.unwrap();
    first.shutdown(&ctx).await.unwrap();

    let second = site.stream_client(&config);
    let mut rx = listen(&second, StreamPosition::START).await;

    let events = collect_received(&mut rx, 1).await;
    assert_eq!(events[0].event.payload, b"kept".to_vec());
    assert_eq!(events[0].position, StreamPosition::START);
    second.shutdown(&ctx).await.unwrap();
}
