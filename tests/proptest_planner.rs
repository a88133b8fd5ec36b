use discord_telegram_relay::gateway::AttachmentMeta;
use discord_telegram_relay::relay::classify::{classify, classify_all};
use discord_telegram_relay::relay::planner::plan;
use discord_telegram_relay::relay::{
    AttachmentDescriptor, DocumentCaptionPolicy, MediaKind, MediaPlan, PlannerLimits,
};
use proptest::prelude::*;

fn descriptor(filename: String, content_type: String, size: u64) -> AttachmentDescriptor {
    AttachmentDescriptor::remote(&AttachmentMeta {
        url: format!("https://cdn.example/{filename}"),
        filename,
        content_type,
        size,
    })
}

fn attachment() -> impl Strategy<Value = AttachmentDescriptor> {
    (
        "(SPOILER_)?[a-z]{1,8}",
        prop_oneof![
            Just(".png"),
            Just(".jpg"),
            Just(".gif"),
            Just(".webm"),
            Just(".mp4"),
            Just(".pdf"),
            Just("")
        ],
        prop_oneof![
            Just("image/png"),
            Just("image/jpeg"),
            Just("video/mp4"),
            Just("application/pdf"),
            Just("")
        ],
        0u64..(80 * 1024 * 1024),
    )
        .prop_map(|(stem, ext, content_type, size)| {
            descriptor(format!("{stem}{ext}"), content_type.to_string(), size)
        })
}

proptest! {
    /// Animated extensions win regardless of the declared content type.
    #[test]
    fn animated_extensions_always_animate(
        stem in "[a-zA-Z0-9_]{1,12}",
        ext in "(gif|GIF|webm|WebM)",
        content_type in "(image|video|application)/[a-z]{1,8}",
    ) {
        let d = descriptor(format!("{stem}.{ext}"), content_type, 1);
        prop_assert_eq!(classify(&d), MediaKind::Animation);
    }

    /// Nothing is lost: every attachment is either planned once or skipped once.
    #[test]
    fn every_attachment_is_accounted_for(
        attachments in prop::collection::vec(attachment(), 0..25),
        text in "[a-z ]{0,40}",
    ) {
        let total = attachments.len();
        let limits = PlannerLimits::default();
        let plan = plan(
            classify_all(attachments, &text),
            &text,
            &limits,
            DocumentCaptionPolicy::Repeat,
        );

        let planned = plan.media.items().len() + plan.documents.len();
        prop_assert_eq!(planned + plan.skipped.len(), total);

        for item in plan.media.items() {
            prop_assert!(item.kind().is_media());
            let size = item.descriptor().effective_size();
            match item.kind() {
                MediaKind::Photo => prop_assert!(size <= limits.photo_max_bytes),
                MediaKind::Video => prop_assert!(size <= limits.video_max_bytes),
                MediaKind::Animation => prop_assert!(size <= limits.document_max_bytes),
                MediaKind::Document => {}
            }
        }
        for item in &plan.documents {
            prop_assert_eq!(item.kind(), MediaKind::Document);
            prop_assert!(item.descriptor().effective_size() <= limits.document_max_bytes);
        }
    }

    /// Groups stay within destination bounds and carry at most one caption.
    #[test]
    fn groups_respect_destination_limits(
        attachments in prop::collection::vec(attachment(), 0..25),
        text in "[a-z]{1,20}",
    ) {
        let limits = PlannerLimits::default();
        let plan = plan(
            classify_all(attachments, &text),
            &text,
            &limits,
            DocumentCaptionPolicy::FirstOnly,
        );

        match &plan.media {
            MediaPlan::Group(items) => {
                prop_assert!((2..=limits.group_max_items).contains(&items.len()));
            }
            MediaPlan::Individual(items) => {
                prop_assert!(items.len() > limits.group_max_items);
            }
            MediaPlan::None | MediaPlan::Single(_) => {}
        }

        let captioned = plan
            .media
            .items()
            .iter()
            .chain(&plan.documents)
            .filter(|item| item.caption().is_some())
            .count();
        prop_assert!(captioned <= 2, "caption repeated {} times", captioned);
    }

    /// The spoiler flag follows the filename prefix exactly.
    #[test]
    fn spoiler_follows_prefix(name in "[A-Za-z_]{0,16}") {
        let d = descriptor(name.clone(), String::new(), 1);
        prop_assert_eq!(d.has_spoiler(), name.starts_with("SPOILER_"));
    }
}
