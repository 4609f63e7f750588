use std::io;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tokio::time::Instant;
use tracing_test::traced_test;

use super::DynamicStream;
use crate::test_utils::FakeTransport;
use crate::ConnectionOptions;
use crate::DefaultTermChecker;
use crate::Error;
use crate::JsonStreamListener;
use crate::MockTermChecker;
use crate::StaticTermSource;
use crate::StreamConfig;
use crate::StreamError;
use crate::StreamRequest;
use crate::TracingHandler;

type TestStream = DynamicStream<DefaultTermChecker<StaticTermSource>>;

fn settings(unfiltered: bool) -> StreamConfig {
    StreamConfig {
        unfiltered,
        stop_timeout_ms: 10,
        ..Default::default()
    }
}

fn build(
    transport: &Arc<FakeTransport>,
    source: &StaticTermSource,
    settings: &StreamConfig,
) -> TestStream {
    DynamicStream::new(
        transport.clone(),
        Arc::new(JsonStreamListener::new(Arc::new(TracingHandler))),
        DefaultTermChecker::new(source.clone()),
        settings,
        ConnectionOptions::default(),
    )
}

fn filter(terms: &[&str]) -> StreamRequest {
    StreamRequest::Filter {
        track: terms.iter().map(|t| t.to_string()).collect(),
        languages: None,
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

#[tokio::test(start_paused = true)]
async fn test_update_stream_restarts_only_on_change() {
    let transport = Arc::new(FakeTransport::new());
    let source = StaticTermSource::new(["rust"]);
    let stream = build(&transport, &source, &settings(false));

    // changed, unchanged, changed
    assert!(stream.update_stream().await.unwrap());
    assert!(!stream.update_stream().await.unwrap());
    source.insert("tokio");
    assert!(stream.update_stream().await.unwrap());

    assert_eq!(transport.opened(), 2);
    assert_eq!(transport.requests(), vec![filter(&["rust"]), filter(&["rust", "tokio"])]);
    assert_eq!(transport.connection(0).disconnects(), 1);
    assert_eq!(transport.connection(1).disconnects(), 0);
    assert!(stream.is_streaming());
}

#[tokio::test(start_paused = true)]
async fn test_changes_between_ticks_are_coalesced() {
    let transport = Arc::new(FakeTransport::new());
    let source = StaticTermSource::new(["a"]);
    let stream = build(&transport, &source, &settings(false));
    stream.update_stream().await.unwrap();

    source.insert("b");
    source.insert("c");
    source.remove("a");
    assert!(stream.update_stream().await.unwrap());

    assert_eq!(transport.opened(), 2);
    assert_eq!(transport.last().unwrap().request(), Some(filter(&["b", "c"])));
}

#[tokio::test(start_paused = true)]
async fn test_no_terms_means_no_connection() {
    let transport = Arc::new(FakeTransport::new());
    let source = StaticTermSource::default();
    let stream = build(&transport, &source, &settings(false));

    assert!(!stream.update_stream().await.unwrap());
    assert_eq!(transport.opened(), 0);
    assert!(!stream.is_streaming());

    // terms appear, then all of them go away
    source.insert("rust");
    assert!(stream.update_stream().await.unwrap());
    assert!(stream.is_streaming());

    source.remove("rust");
    assert!(stream.update_stream().await.unwrap());
    assert_eq!(transport.opened(), 1);
    assert_eq!(transport.connection(0).disconnects(), 1);
    assert!(!stream.is_streaming());
}

#[tokio::test(start_paused = true)]
async fn test_unfiltered_mode_samples_without_terms() {
    let transport = Arc::new(FakeTransport::new());
    let source = StaticTermSource::default();
    let stream = build(&transport, &source, &settings(true));

    assert!(stream.update_stream().await.unwrap());
    assert_eq!(transport.requests(), vec![StreamRequest::Sample { languages: None }]);

    assert!(!stream.update_stream().await.unwrap());
    assert_eq!(transport.opened(), 1);

    // terms take over from the sample
    source.insert("rust");
    assert!(stream.update_stream().await.unwrap());
    assert_eq!(transport.last().unwrap().request(), Some(filter(&["rust"])));
}

#[tokio::test(start_paused = true)]
async fn test_languages_and_options_reach_the_connection() {
    let transport = Arc::new(FakeTransport::new());
    let source = StaticTermSource::new(["rust"]);
    let mut settings = settings(false);
    settings.languages = vec!["en".to_string(), "fr".to_string()];
    let options = ConnectionOptions {
        stall_warnings: false,
        ..Default::default()
    };
    let stream = DynamicStream::new(
        transport.clone(),
        Arc::new(JsonStreamListener::new(Arc::new(TracingHandler))),
        DefaultTermChecker::new(source.clone()),
        &settings,
        options.clone(),
    );

    stream.update_stream().await.unwrap();

    let connection = transport.connection(0);
    assert_eq!(
        connection.request(),
        Some(StreamRequest::Filter {
            track: vec!["rust".to_string()],
            languages: Some(vec!["en".to_string(), "fr".to_string()]),
        })
    );
    assert_eq!(connection.options, options);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_dead_connection_is_restarted() {
    let transport = Arc::new(FakeTransport::new());
    let source = StaticTermSource::new(["rust"]);
    let stream = build(&transport, &source, &settings(false));
    stream.update_stream().await.unwrap();

    transport.connection(0).crash();
    assert!(stream.update_stream().await.unwrap());

    assert_eq!(transport.opened(), 2);
    assert!(transport.connection(1).is_running());
    assert!(logs_contain("Stream exists but isn't running"));
}

#[tokio::test(start_paused = true)]
async fn test_old_connection_is_not_awaited() {
    let transport = Arc::new(FakeTransport::lingering());
    let source = StaticTermSource::new(["rust"]);
    let stream = build(&transport, &source, &settings(false));
    stream.update_stream().await.unwrap();

    source.insert("tokio");
    stream.update_stream().await.unwrap();

    // the first receive loop is still unwinding while the second one runs
    let old = transport.connection(0);
    assert_eq!(old.disconnects(), 1);
    assert!(old.is_running());
    assert!(transport.connection(1).is_running());

    old.finish();
    assert!(!old.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_exception_is_raised_once() {
    let transport = Arc::new(FakeTransport::new());
    let source = StaticTermSource::new(["rust"]);
    let stream = build(&transport, &source, &settings(false));
    stream.update_stream().await.unwrap();
    assert!(stream.handle_exceptions().is_ok());

    transport
        .connection(0)
        .fail(StreamError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset")));

    match stream.handle_exceptions() {
        Err(Error::Stream(e)) => assert!(matches!(*e, StreamError::Io(_))),
        other => panic!("expected a stream error, got {:?}", other),
    }
    assert!(stream.handle_exceptions().is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_dead_connection_with_captured_failure_is_not_replaced() {
    let transport = Arc::new(FakeTransport::new());
    let source = StaticTermSource::new(["rust"]);
    let stream = build(&transport, &source, &settings(false));
    stream.update_stream().await.unwrap();

    transport
        .connection(0)
        .fail(StreamError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset")));

    match stream.update_stream().await {
        Err(Error::Stream(e)) => assert!(matches!(*e, StreamError::Io(_))),
        other => panic!("expected a stream error, got {:?}", other),
    }
    assert_eq!(transport.opened(), 1);
    assert_eq!(transport.connection(0).disconnects(), 0);

    // the failure was consumed, so the next tick reconnects as usual
    assert!(stream.update_stream().await.unwrap());
    assert_eq!(transport.opened(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_stream_without_stream_is_a_noop() {
    let transport = Arc::new(FakeTransport::new());
    let stream = build(&transport, &StaticTermSource::default(), &settings(false));

    stream.stop_stream().await;
    stream.stop_polling().await;
    stream.stop_polling().await;

    assert!(!stream.is_polling());
    assert!(!stream.is_streaming());
}

#[tokio::test(start_paused = true)]
async fn test_start_then_stop_polling() {
    let transport = Arc::new(FakeTransport::new());
    let source = StaticTermSource::new(["rust"]);
    let stream = Arc::new(build(&transport, &source, &settings(false)));

    let handle = tokio::spawn({
        let stream = stream.clone();
        async move { stream.start_polling(Duration::from_secs(15)).await }
    });

    wait_until(|| transport.opened() == 1).await;
    assert!(stream.is_polling());
    assert!(stream.is_streaming());

    stream.stop_polling().await;
    handle.await.unwrap().unwrap();

    assert!(!stream.is_polling());
    assert!(!stream.is_streaming());
    assert_eq!(transport.opened(), 1);
    assert_eq!(transport.connection(0).disconnects(), 1);

    // stopping again changes nothing
    stream.stop_polling().await;
    assert_eq!(transport.connection(0).disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_polling_interrupts_the_wait() {
    let transport = Arc::new(FakeTransport::new());
    let source = StaticTermSource::new(["rust"]);
    let stream = Arc::new(build(&transport, &source, &settings(false)));
    let interval = Duration::from_secs(3600);

    let handle = tokio::spawn({
        let stream = stream.clone();
        async move { stream.start_polling(interval).await }
    });
    wait_until(|| transport.opened() == 1).await;

    let stopped_at = Instant::now();
    stream.stop_polling().await;
    handle.await.unwrap().unwrap();

    // only the stop grace period passes, not the rest of the interval
    let elapsed = stopped_at.elapsed();
    assert!(elapsed < Duration::from_secs(1), "stopping took {:?}", elapsed);
    assert_eq!(transport.opened(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_term_changes_are_picked_up_while_polling() {
    let transport = Arc::new(FakeTransport::new());
    let source = StaticTermSource::new(["rust"]);
    let stream = Arc::new(build(&transport, &source, &settings(false)));

    let handle = tokio::spawn({
        let stream = stream.clone();
        async move { stream.start_polling(Duration::from_secs(1)).await }
    });
    wait_until(|| transport.opened() == 1).await;

    source.insert("tokio");
    wait_until(|| transport.opened() == 2).await;
    assert_eq!(transport.last().unwrap().request(), Some(filter(&["rust", "tokio"])));

    stream.stop_polling().await;
    handle.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_restarted_session_reopens_the_stream() {
    let transport = Arc::new(FakeTransport::new());
    let source = StaticTermSource::new(["rust"]);
    let stream = Arc::new(build(&transport, &source, &settings(false)));

    for round in 1..=2 {
        let handle = tokio::spawn({
            let stream = stream.clone();
            async move { stream.start_polling(Duration::from_secs(1)).await }
        });
        wait_until(|| transport.opened() == round).await;

        stream.stop_polling().await;
        handle.await.unwrap().unwrap();
    }

    // the checker was reset, so unchanged terms still open a new stream
    assert_eq!(transport.requests(), vec![filter(&["rust"]), filter(&["rust"])]);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn test_captured_exception_ends_the_session() {
    let transport = Arc::new(FakeTransport::new());
    let source = StaticTermSource::new(["rust"]);
    let stream = Arc::new(build(&transport, &source, &settings(false)));

    let handle = tokio::spawn({
        let stream = stream.clone();
        async move { stream.start_polling(Duration::from_secs(1)).await }
    });
    wait_until(|| transport.opened() == 1).await;

    transport
        .connection(0)
        .fail(StreamError::Timeout(Duration::from_secs(90)));

    let result = handle.await.unwrap();
    assert!(matches!(result, Err(Error::Stream(e)) if matches!(*e, StreamError::Timeout(_))));
    assert!(!stream.is_polling());
    assert!(!stream.is_streaming());

    // the dead connection is torn down without opening a replacement first
    assert_eq!(transport.opened(), 1);
    assert_eq!(transport.connection(0).disconnects(), 1);
    assert!(logs_contain("Streaming exception"));
}

#[tokio::test(start_paused = true)]
async fn test_checker_failure_ends_the_session() {
    let transport = Arc::new(FakeTransport::new());
    let mut checker = MockTermChecker::new();
    checker.expect_reset().times(1).returning(|| ());
    checker
        .expect_check()
        .times(1)
        .returning(|| Err(Error::Fatal("source gone".to_string())));

    let stream = DynamicStream::new(
        transport.clone(),
        Arc::new(JsonStreamListener::new(Arc::new(TracingHandler))),
        checker,
        &settings(false),
        ConnectionOptions::default(),
    );

    let result = stream.start_polling(Duration::from_secs(1)).await;
    assert!(matches!(result, Err(Error::Fatal(_))));
    assert_eq!(transport.opened(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ticks_never_come_closer_than_min_wait() {
    let transport = Arc::new(FakeTransport::new());
    let checks = Arc::new(AtomicUsize::new(0));

    let mut checker = MockTermChecker::new();
    checker.expect_reset().returning(|| ());
    checker.expect_check().returning({
        let checks = checks.clone();
        move || {
            checks.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        }
    });

    let mut settings = settings(false);
    settings.min_poll_wait_ms = 100;
    let stream = Arc::new(DynamicStream::new(
        transport.clone(),
        Arc::new(JsonStreamListener::new(Arc::new(TracingHandler))),
        checker,
        &settings,
        ConnectionOptions::default(),
    ));

    let handle = tokio::spawn({
        let stream = stream.clone();
        async move { stream.start_polling(Duration::ZERO).await }
    });
    sleep(Duration::from_millis(1050)).await;
    stream.stop_polling().await;
    handle.await.unwrap().unwrap();

    let checks = checks.load(Ordering::SeqCst);
    assert!((10..=12).contains(&checks), "{} checks", checks);
    assert_eq!(transport.opened(), 0);
}
