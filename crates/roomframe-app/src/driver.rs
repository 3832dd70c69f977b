//! Driver trait for abstracting the presentation layer.
//!
//! The [`Driver`] trait decouples the runtime from a concrete UI. Each
//! frontend implements it to deliver user intents and present the controller's
//! state, while the generic [`crate::Runtime`] handles all orchestration.

use std::{future::Future, ops::Sub, time::Duration};

use crate::{Intent, RoomView, RoomViewAction};

/// Abstracts user input and presentation for the runtime.
///
/// # Implementations
///
/// - **Simulation**: scripted intents, recorded output (`roomframe-harness`)
/// - **Terminal/GUI**: forwards widget events, draws the view
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Wait for the next user intent.
    ///
    /// Resolves to `None` once input is closed. Must be cancel-safe: the
    /// runtime polls it inside `tokio::select!`.
    fn poll_input(&mut self) -> impl Future<Output = Result<Option<Intent>, Self::Error>> + Send;

    /// Draw the view.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render<I>(&mut self, view: &RoomView<I>) -> Result<(), Self::Error>
    where
        I: Copy + Ord + Sub<Output = Duration>;

    /// Present a UI-side action (notification, tint, scroll, completions).
    ///
    /// # Errors
    ///
    /// Returns an error if the action cannot be presented.
    fn present(&mut self, action: RoomViewAction) -> Result<(), Self::Error>;
}
