//! Testing helpers and mock utilities.
//!
//! Provides convenient constructors for mocked destinations.

use crate::destination::{DestinationError, MockDestination};

/// Create a mock destination that accepts every send.
///
/// # Example
///
/// ```rust,ignore
/// use discord_telegram_relay::testing::mock_destination_ok;
///
/// let destination = mock_destination_ok();
/// ```
#[must_use]
pub fn mock_destination_ok() -> MockDestination {
    let mut mock = MockDestination::new();
    mock.expect_send_text().returning(|_| Ok(()));
    mock.expect_send_photo().returning(|_| Ok(()));
    mock.expect_send_video().returning(|_| Ok(()));
    mock.expect_send_animation().returning(|_| Ok(()));
    mock.expect_send_document().returning(|_| Ok(()));
    mock.expect_send_media_group().returning(|_| Ok(()));
    mock
}

/// Create a mock destination whose API rejects every send with `message`.
///
/// Useful for checking that failures stay contained per attachment.
#[must_use]
pub fn mock_destination_rejecting(message: &'static str) -> MockDestination {
    let mut mock = MockDestination::new();
    let err = move || DestinationError::Api(message.to_string());
    mock.expect_send_text().returning(move |_| Err(err()));
    mock.expect_send_photo().returning(move |_| Err(err()));
    mock.expect_send_video().returning(move |_| Err(err()));
    mock.expect_send_animation().returning(move |_| Err(err()));
    mock.expect_send_document().returning(move |_| Err(err()));
    mock.expect_send_media_group().returning(move |_| Err(err()));
    mock
}
