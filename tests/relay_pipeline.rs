use async_trait::async_trait;
use discord_telegram_relay::destination::{
    Destination, DestinationError, MediaSource, OutboundMedia,
};
use discord_telegram_relay::gateway::{
    run_relay_task, AttachmentMeta, InboundMessage, MessageKind,
};
use discord_telegram_relay::relay::{
    DeliveryOptions, DocumentCaptionPolicy, MediaKind, PlannerLimits, Relay, RelayOptions,
    RelayOutcome, SkipReason,
};
use mockito::{Matcher, ServerGuard};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const CHANNEL: u64 = 4242;
const MIB: usize = 1024 * 1024;

/// One call observed by the fake destination
#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Text(String),
    Single(OutboundMedia),
    Group(Vec<OutboundMedia>),
}

/// Destination fake that records every call
#[derive(Default)]
struct RecordingDestination {
    sent: Mutex<Vec<Sent>>,
    reject_all: bool,
    delay: Option<Duration>,
}

impl RecordingDestination {
    fn rejecting() -> Self {
        Self {
            reject_all: true,
            ..Self::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    async fn record(&self, call: Sent) -> Result<(), DestinationError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.reject_all {
            return Err(DestinationError::Api("Bad Request: rejected".to_string()));
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(call);
        }
        Ok(())
    }
}

#[async_trait]
impl Destination for RecordingDestination {
    async fn send_text(&self, text: &str) -> Result<(), DestinationError> {
        self.record(Sent::Text(text.to_string())).await
    }
    async fn send_photo(&self, media: &OutboundMedia) -> Result<(), DestinationError> {
        self.record(Sent::Single(media.clone())).await
    }
    async fn send_video(&self, media: &OutboundMedia) -> Result<(), DestinationError> {
        self.record(Sent::Single(media.clone())).await
    }
    async fn send_animation(&self, media: &OutboundMedia) -> Result<(), DestinationError> {
        self.record(Sent::Single(media.clone())).await
    }
    async fn send_document(&self, media: &OutboundMedia) -> Result<(), DestinationError> {
        self.record(Sent::Single(media.clone())).await
    }
    async fn send_media_group(&self, items: &[OutboundMedia]) -> Result<(), DestinationError> {
        self.record(Sent::Group(items.to_vec())).await
    }
}

struct Harness {
    _root: tempfile::TempDir,
    staging_root: PathBuf,
    destination: Arc<RecordingDestination>,
    relay: Arc<Relay>,
}

impl Harness {
    fn new(destination: RecordingDestination) -> std::io::Result<Self> {
        let root = tempfile::tempdir()?;
        let staging_root = root.path().join("temp");
        let options = RelayOptions {
            allowed_channels: HashSet::from([CHANNEL]),
            staging_root: staging_root.clone(),
            fetch_timeout: Duration::from_secs(10),
            limits: PlannerLimits::default(),
            caption_policy: DocumentCaptionPolicy::Repeat,
            delivery: DeliveryOptions::default(),
        };
        let destination = Arc::new(destination);
        let relay = Arc::new(Relay::new(options, destination.clone()));
        Ok(Self {
            _root: root,
            staging_root,
            destination,
            relay,
        })
    }

    fn staging_is_empty(&self) -> bool {
        dir_is_empty(&self.staging_root)
    }
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).map_or(true, |mut entries| entries.next().is_none())
}

fn message(text: &str, attachments: Vec<AttachmentMeta>) -> InboundMessage {
    InboundMessage {
        author_is_bot: false,
        channel_id: CHANNEL,
        kind: MessageKind::Default,
        text: text.to_string(),
        attachments,
    }
}

fn attachment(server: &ServerGuard, filename: &str, content_type: &str, size: usize) -> AttachmentMeta {
    AttachmentMeta {
        url: format!("{}/{filename}", server.url()),
        filename: filename.to_string(),
        content_type: content_type.to_string(),
        size: size as u64,
    }
}

async fn serve(server: &mut ServerGuard, filename: &str, body: Vec<u8>) {
    server
        .mock("GET", format!("/{filename}").as_str())
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;
}

fn filenames(items: &[OutboundMedia]) -> Vec<&str> {
    items.iter().map(|m| m.filename.as_str()).collect()
}

#[tokio::test]
async fn text_only_message_is_one_text_send() -> Result<(), Box<dyn std::error::Error>> {
    let h = Harness::new(RecordingDestination::default())?;

    let report = h.relay.handle(&message("hello there", Vec::new())).await?;

    assert!(report.text_delivered);
    assert_eq!(h.destination.sent(), vec![Sent::Text("hello there".to_string())]);
    assert!(h.staging_is_empty());
    Ok(())
}

#[tokio::test]
async fn single_photo_is_sent_with_caption_from_staging() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "cat.png", b"png bytes".to_vec()).await;
    let h = Harness::new(RecordingDestination::default())?;

    let report = h
        .relay
        .handle(&message("look", vec![attachment(&server, "cat.png", "image/png", 9)]))
        .await?;

    let sent = h.destination.sent();
    assert_eq!(sent.len(), 1);
    let Sent::Single(photo) = &sent[0] else {
        panic!("expected a single send, got {sent:?}");
    };
    assert_eq!(photo.kind, MediaKind::Photo);
    assert_eq!(photo.caption.as_deref(), Some("look"));
    assert!(matches!(&photo.source, MediaSource::File(path) if path.starts_with(&h.staging_root)));
    assert!(!photo.spoiler);
    assert_eq!(report.delivered_count(), 1);
    assert!(report.text_delivered);
    assert!(h.staging_is_empty());
    Ok(())
}

#[tokio::test]
async fn several_media_go_out_as_one_ordered_group() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "a.png", vec![1; 16]).await;
    serve(&mut server, "b.mp4", vec![2; 16]).await;
    serve(&mut server, "c.gif", vec![3; 16]).await;
    let h = Harness::new(RecordingDestination::default())?;

    h.relay
        .handle(&message(
            "trip",
            vec![
                attachment(&server, "a.png", "image/png", 16),
                attachment(&server, "b.mp4", "video/mp4", 16),
                attachment(&server, "c.gif", "image/gif", 16),
            ],
        ))
        .await?;

    let sent = h.destination.sent();
    assert_eq!(sent.len(), 1);
    let Sent::Group(items) = &sent[0] else {
        panic!("expected a group send, got {sent:?}");
    };
    assert_eq!(filenames(items), vec!["a.png", "b.mp4", "c.gif"]);
    assert_eq!(
        items.iter().map(|m| m.kind).collect::<Vec<_>>(),
        vec![MediaKind::Photo, MediaKind::Video, MediaKind::Animation]
    );
    assert_eq!(items[0].caption.as_deref(), Some("trip"));
    assert!(items[1..].iter().all(|m| m.caption.is_none()));
    assert!(h.staging_is_empty());
    Ok(())
}

#[tokio::test]
async fn more_than_ten_media_are_sent_one_by_one() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", Matcher::Regex(r"^/p\d+\.png$".to_string()))
        .with_status(200)
        .with_body("png")
        .expect(11)
        .create_async()
        .await;
    let h = Harness::new(RecordingDestination::default())?;
    let attachments = (0..11)
        .map(|i| attachment(&server, &format!("p{i}.png"), "image/png", 3))
        .collect();

    let report = h.relay.handle(&message("dump", attachments)).await?;

    let sent = h.destination.sent();
    assert_eq!(sent.len(), 11);
    for (i, call) in sent.iter().enumerate() {
        let Sent::Single(media) = call else {
            panic!("expected individual sends, got {call:?}");
        };
        assert_eq!(media.filename, format!("p{i}.png"));
        assert_eq!(media.caption.is_some(), i == 0);
    }
    assert_eq!(report.delivered_count(), 11);
    assert!(h.staging_is_empty());
    Ok(())
}

#[tokio::test]
async fn oversize_video_is_skipped_and_siblings_delivered() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "movie.mp4", vec![0; 60 * MIB]).await;
    serve(&mut server, "a.png", vec![1; 8]).await;
    serve(&mut server, "b.png", vec![2; 8]).await;
    let h = Harness::new(RecordingDestination::default())?;

    let report = h
        .relay
        .handle(&message(
            "weekend",
            vec![
                attachment(&server, "movie.mp4", "video/mp4", 60 * MIB),
                attachment(&server, "a.png", "image/png", 8),
                attachment(&server, "b.png", "image/png", 8),
            ],
        ))
        .await?;

    let sent = h.destination.sent();
    assert_eq!(sent.len(), 1);
    let Sent::Group(items) = &sent[0] else {
        panic!("expected a group send, got {sent:?}");
    };
    assert_eq!(filenames(items), vec!["a.png", "b.png"]);
    // The skipped first attachment hands its caption to the next one
    assert_eq!(items[0].caption.as_deref(), Some("weekend"));

    assert_eq!(report.skipped_count(), 1);
    let skipped = report
        .outcomes
        .iter()
        .find(|o| o.filename == "movie.mp4")
        .ok_or("no outcome for movie.mp4")?;
    assert!(matches!(
        skipped.outcome,
        RelayOutcome::Skipped(SkipReason::TooLarge { .. })
    ));
    assert!(h.staging_is_empty());
    Ok(())
}

#[tokio::test]
async fn spoiler_prefix_sets_spoiler_flag() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "SPOILER_cat.png", vec![1; 4]).await;
    serve(&mut server, "cat.png", vec![2; 4]).await;
    let h = Harness::new(RecordingDestination::default())?;

    h.relay
        .handle(&message(
            "",
            vec![
                attachment(&server, "SPOILER_cat.png", "image/png", 4),
                attachment(&server, "cat.png", "image/png", 4),
            ],
        ))
        .await?;

    let sent = h.destination.sent();
    let Sent::Group(items) = &sent[0] else {
        panic!("expected a group send, got {sent:?}");
    };
    assert!(items[0].spoiler);
    assert!(!items[1].spoiler);
    Ok(())
}

#[tokio::test]
async fn one_missing_attachment_among_three() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "a.pdf", b"first".to_vec()).await;
    server
        .mock("GET", "/b.pdf")
        .with_status(404)
        .create_async()
        .await;
    serve(&mut server, "c.pdf", b"third".to_vec()).await;
    let h = Harness::new(RecordingDestination::default())?;

    let report = h
        .relay
        .handle(&message(
            "docs",
            vec![
                attachment(&server, "a.pdf", "application/pdf", 5),
                attachment(&server, "b.pdf", "application/pdf", 5),
                attachment(&server, "c.pdf", "application/pdf", 5),
            ],
        ))
        .await?;

    assert_eq!(report.fetch_failures, 1);
    assert!(!report.used_url_fallback);
    assert_eq!(report.delivered_count(), 2);

    let sent = h.destination.sent();
    let names: Vec<&str> = sent
        .iter()
        .filter_map(|call| match call {
            Sent::Single(m) => Some(m.filename.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(names, vec!["a.pdf", "c.pdf"]);
    // Documents repeat the caption by default
    assert!(sent
        .iter()
        .all(|call| matches!(call, Sent::Single(m) if m.caption.as_deref() == Some("docs"))));
    assert!(h.staging_is_empty());
    Ok(())
}

#[tokio::test]
async fn rejected_sends_are_contained_and_staging_cleaned() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "a.png", vec![1; 4]).await;
    serve(&mut server, "b.txt", vec![2; 4]).await;
    let h = Harness::new(RecordingDestination::rejecting())?;

    let report = h
        .relay
        .handle(&message(
            "hi",
            vec![
                attachment(&server, "a.png", "image/png", 4),
                attachment(&server, "b.txt", "text/plain", 4),
            ],
        ))
        .await?;

    assert_eq!(report.failed_count(), 2);
    assert!(!report.text_delivered);
    assert!(h.staging_is_empty());
    Ok(())
}

#[tokio::test]
async fn timeout_drops_the_operation_and_cleans_staging() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "cat.png", vec![1; 4]).await;
    let h = Harness::new(RecordingDestination::slow(Duration::from_secs(30)))?;

    let report = run_relay_task(
        h.relay.clone(),
        message("slow", vec![attachment(&server, "cat.png", "image/png", 4)]),
        Duration::from_millis(500),
        CancellationToken::new(),
    )
    .await;

    assert!(report.is_none());
    assert!(h.staging_is_empty());
    Ok(())
}

#[tokio::test]
async fn shutdown_cancels_in_flight_relay() -> Result<(), Box<dyn std::error::Error>> {
    let mut server = mockito::Server::new_async().await;
    serve(&mut server, "cat.png", vec![1; 4]).await;
    let h = Harness::new(RecordingDestination::slow(Duration::from_secs(30)))?;
    let shutdown = CancellationToken::new();

    let task = tokio::spawn(run_relay_task(
        h.relay.clone(),
        message("bye", vec![attachment(&server, "cat.png", "image/png", 4)]),
        Duration::from_secs(60),
        shutdown.clone(),
    ));
    tokio::time::sleep(Duration::from_millis(500)).await;
    shutdown.cancel();

    assert!(task.await?.is_none());
    assert!(h.staging_is_empty());
    assert!(h.destination.sent().is_empty());
    Ok(())
}
