//! Stream client lifecycle specs
//!
//! Created -> Started <-> Suspended -> Disposed, with every transition
//! safe to repeat.

use crate::prelude::*;
use lrep_engine::StreamClientError;

#[tokio::test]
async fn a_client_moves_through_its_lifecycle() {
    let site = Site::new();
    let client = site.stream_client(&site.config("cache-01"));
    let ctx = OperationContext::new();
    assert_eq!(client.state().await, ClientState::Created);

    client.startup(&ctx).await.unwrap();
    client.startup(&ctx).await.unwrap();

    let (handler, _rx) = ChannelHandler::new();
    let handler: Arc<dyn ReceiveHandler> = Arc::new(handler);
    client
        .start_processing(&ctx, StreamPosition::START, Arc::clone(&handler))
        .await
        .unwrap();
    client
        .start_processing(&ctx, StreamPosition::START, Arc::clone(&handler))
        .await
        .unwrap();
    assert_eq!(client.state().await, ClientState::Started);
    assert!(client.is_processing().await);

    client.suspend_processing(&ctx).await.unwrap();
    client.suspend_processing(&ctx).await.unwrap();
    assert_eq!(client.state().await, ClientState::Suspended);
    assert!(!client.is_processing().await);

    client
        .start_processing(&ctx, StreamPosition::START, handler)
        .await
        .unwrap();
    assert_eq!(client.state().await, ClientState::Started);

    client.shutdown(&ctx).await.unwrap();
    client.shutdown(&ctx).await.unwrap();
    assert_eq!(client.state().await, ClientState::Disposed);
    assert!(!client.is_processing().await);
}

#[tokio::test]
async fn nothing_works_before_startup() {
    let site = Site::new();
    let client = site.stream_client(&site.config("cache-01"));
    let ctx = OperationContext::new();
    let (handler, _rx) = ChannelHandler::new();

    let send = client.send(&ctx, text("early")).await.unwrap_err();
    assert!(matches!(send, StreamClientError::NotStarted), "{send}");

    let start = client
        .start_processing(&ctx, StreamPosition::START, Arc::new(handler))
        .await
        .unwrap_err();
    assert!(matches!(start, StreamClientError::NotStarted), "{start}");
    assert_eq!(client.state().await, ClientState::Created);
}

#[tokio::test]
async fn a_disposed_client_cannot_be_revived() {
    let site = Site::new();
    let client = site.stream_client(&site.config("cache-01"));
    let ctx = OperationContext::new();
    client.startup(&ctx).await.unwrap();
    client.shutdown(&ctx).await.unwrap();

    assert!(matches!(
        client.startup(&ctx).await,
        Err(StreamClientError::Disposed)
    ));
    assert!(matches!(
        client.send(&ctx, text("late")).await,
        Err(StreamClientError::Disposed)
    ));
    let (handler, _rx) = ChannelHandler::new();
    assert!(matches!(
        client
            .start_processing(&ctx, StreamPosition::START, Arc::new(handler))
            .await,
        Err(StreamClientError::Disposed)
    ));
}

#[tokio::test]
async fn shutdown_without_startup_still_disposes() {
    let site = Site::new();
    let client = site.stream_client(&site.config("cache-01"));

    client.shutdown(&OperationContext::new()).await.unwrap();

    assert_eq!(client.state().await, ClientState::Disposed);
}

#[tokio::test]
async fn an_unsupported_endpoint_fails_startup_as_a_configuration_error() {
    let site = Site::new();
    let mut config = site.config("cache-01");
    config.stream.connection = "Endpoint=sb://example.invalid/;EntityPath=locations".to_string();
    let client = site.stream_client(&config);

    let err = client.startup(&OperationContext::new()).await.unwrap_err();

    assert_eq!(err.class(), ErrorClass::Fatal);
    assert_eq!(client.state().await, ClientState::Created);
}
