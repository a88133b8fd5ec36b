//! Telegram Bot API destination.

use super::{Destination, DestinationError, MediaSource, OutboundMedia};
use crate::relay::MediaKind;
use async_trait::async_trait;
use teloxide::payloads::{
    SendAnimationSetters, SendDocumentSetters, SendPhotoSetters, SendVideoSetters,
};
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, InputFile, InputMedia, InputMediaAnimation, InputMediaDocument, InputMediaPhoto,
    InputMediaVideo, Recipient,
};
use teloxide::RequestError;
use tracing::debug;

impl From<RequestError> for DestinationError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Network(_) | RequestError::RetryAfter(_) | RequestError::Io(_) => {
                Self::Network(err.to_string())
            }
            _ => Self::Api(err.to_string()),
        }
    }
}

/// Sends relayed content to one Telegram chat.
///
/// The bot client is created once at startup and shared by every relay
/// operation.
#[derive(Clone)]
pub struct TelegramDestination {
    bot: Bot,
    recipient: Recipient,
}

impl TelegramDestination {
    /// Bind a bot to the target chat (`-100…` id or `@channel`).
    #[must_use]
    pub fn new(bot: Bot, chat: &str) -> Self {
        Self {
            bot,
            recipient: parse_recipient(chat),
        }
    }

    /// The chat all sends go to
    #[must_use]
    pub const fn recipient(&self) -> &Recipient {
        &self.recipient
    }
}

/// Parse a configured chat reference into a teloxide recipient.
#[must_use]
pub fn parse_recipient(chat: &str) -> Recipient {
    let chat = chat.trim();
    chat.parse::<i64>().map_or_else(
        |_| {
            let username = if chat.starts_with('@') {
                chat.to_string()
            } else {
                format!("@{chat}")
            };
            Recipient::ChannelUsername(username)
        },
        |id| Recipient::Id(ChatId(id)),
    )
}

fn input_file(media: &OutboundMedia) -> Result<InputFile, DestinationError> {
    match &media.source {
        MediaSource::File(path) => {
            Ok(InputFile::file(path.clone()).file_name(media.filename.clone()))
        }
        MediaSource::Url(url) => reqwest::Url::parse(url)
            .map(InputFile::url)
            .map_err(|e| DestinationError::InvalidInput(format!("bad media URL {url}: {e}"))),
    }
}

fn input_media(media: &OutboundMedia) -> Result<InputMedia, DestinationError> {
    let file = input_file(media)?;
    let item = match media.kind {
        MediaKind::Photo => {
            let mut m = InputMediaPhoto::new(file);
            m.caption.clone_from(&media.caption);
            m.has_spoiler = media.spoiler;
            InputMedia::Photo(m)
        }
        MediaKind::Video => {
            let mut m = InputMediaVideo::new(file);
            m.caption.clone_from(&media.caption);
            m.has_spoiler = media.spoiler;
            InputMedia::Video(m)
        }
        MediaKind::Animation => {
            let mut m = InputMediaAnimation::new(file);
            m.caption.clone_from(&media.caption);
            m.has_spoiler = media.spoiler;
            InputMedia::Animation(m)
        }
        MediaKind::Document => {
            let mut m = InputMediaDocument::new(file);
            m.caption.clone_from(&media.caption);
            InputMedia::Document(m)
        }
    };
    Ok(item)
}

#[async_trait]
impl Destination for TelegramDestination {
    async fn send_text(&self, text: &str) -> Result<(), DestinationError> {
        crate::utils::retry_telegram_operation(
            || async {
                self.bot
                    .send_message(self.recipient.clone(), text.to_string())
                    .await
                    .map(|_| ())
                    .map_err(DestinationError::from)
            },
            DestinationError::is_transient,
        )
        .await
    }

    async fn send_photo(&self, media: &OutboundMedia) -> Result<(), DestinationError> {
        debug!(filename = %media.filename, "Sending photo");
        let mut req = self
            .bot
            .send_photo(self.recipient.clone(), input_file(media)?)
            .has_spoiler(media.spoiler);
        if let Some(caption) = &media.caption {
            req = req.caption(caption);
        }
        req.await?;
        Ok(())
    }

    async fn send_video(&self, media: &OutboundMedia) -> Result<(), DestinationError> {
        debug!(filename = %media.filename, "Sending video");
        let mut req = self
            .bot
            .send_video(self.recipient.clone(), input_file(media)?)
            .has_spoiler(media.spoiler);
        if let Some(caption) = &media.caption {
            req = req.caption(caption);
        }
        req.await?;
        Ok(())
    }

    async fn send_animation(&self, media: &OutboundMedia) -> Result<(), DestinationError> {
        debug!(filename = %media.filename, "Sending animation");
        let mut req = self
            .bot
            .send_animation(self.recipient.clone(), input_file(media)?)
            .has_spoiler(media.spoiler);
        if let Some(caption) = &media.caption {
            req = req.caption(caption);
        }
        req.await?;
        Ok(())
    }

    async fn send_document(&self, media: &OutboundMedia) -> Result<(), DestinationError> {
        debug!(filename = %media.filename, "Sending document");
        let mut req = self
            .bot
            .send_document(self.recipient.clone(), input_file(media)?);
        if let Some(caption) = &media.caption {
            req = req.caption(caption);
        }
        req.await?;
        Ok(())
    }

    async fn send_media_group(&self, items: &[OutboundMedia]) -> Result<(), DestinationError> {
        debug!(items = items.len(), "Sending media group");
        let media = items
            .iter()
            .map(input_media)
            .collect::<Result<Vec<_>, _>>()?;
        self.bot
            .send_media_group(self.recipient.clone(), media)
            .await?;
        Ok(())
    }
}
