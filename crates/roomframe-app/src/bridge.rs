//! Session-store translation layer.
//!
//! The [`Bridge`] turns store-bound [`RoomViewAction`]s into calls on a
//! [`SessionStore`] and wraps each asynchronous call in a future that
//! resolves to the matching completion [`RoomViewEvent`].
//!
//! # Responsibilities
//!
//! - Runs fire-and-forget store calls (stop peeking, resend, cancel) inline.
//! - Packages asynchronous calls as `'static` futures owning a store handle, so
//!   none of them borrow controller state while in flight.
//! - Looks up the room object right after a join resolves, which is what lets
//!   the controller tell a materialized join from a pending one.

use futures::{FutureExt, future::BoxFuture};
use roomframe_core::SessionStore;

use crate::{JoinedRoom, RoomViewAction, RoomViewEvent};

/// Executes store-bound actions against a session store.
#[derive(Debug, Clone)]
pub struct Bridge<S> {
    store: S,
}

impl<S: SessionStore> Bridge<S> {
    /// Create a bridge over `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The wrapped store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Execute an action.
    ///
    /// Returns the in-flight operation for asynchronous calls, `None` for
    /// synchronous ones and for actions that do not concern the store.
    pub fn execute(&self, action: RoomViewAction) -> Option<BoxFuture<'static, RoomViewEvent>> {
        let store = self.store.clone();
        match action {
            RoomViewAction::Peek { address } => {
                tracing::debug!(room = %address, "peeking");
                Some(
                    async move { RoomViewEvent::PeekCompleted { result: store.peek(&address).await } }
                        .boxed(),
                )
            },
            RoomViewAction::StopPeeking => {
                store.stop_peeking();
                None
            },
            RoomViewAction::CheckDisplayName => Some(
                async move {
                    // Only a first join asks for a display name
                    let result = if store.has_joined_rooms() {
                        Ok(false)
                    } else {
                        store.display_name().await.map(|name| name.is_none_or(|n| n.is_empty()))
                    };
                    RoomViewEvent::DisplayNameChecked { result }
                }
                .boxed(),
            ),
            RoomViewAction::SetDisplayName { name } => {
                tracing::debug!(%name, "setting display name");
                Some(
                    async move {
                        RoomViewEvent::DisplayNameSet { result: store.set_display_name(name).await }
                    }
                    .boxed(),
                )
            },
            RoomViewAction::Join { address, options } => {
                tracing::debug!(room = %address, "joining");
                Some(
                    async move {
                        let result = store.join(&address, options).await.map(|room_id| {
                            let room = store.lookup_room(&room_id);
                            JoinedRoom { room_id, room }
                        });
                        RoomViewEvent::JoinCompleted { result }
                    }
                    .boxed(),
                )
            },
            RoomViewAction::Leave { room_id } => Some(
                async move { RoomViewEvent::RejectCompleted { result: store.leave(&room_id).await } }
                    .boxed(),
            ),
            RoomViewAction::Forget { room_id } => Some(
                async move { RoomViewEvent::ForgetCompleted { result: store.forget(&room_id).await } }
                    .boxed(),
            ),
            RoomViewAction::Search { search_id, request } => Some(
                async move {
                    let result = store.search_events(request).await;
                    RoomViewEvent::SearchCompleted { search_id, result }
                }
                .boxed(),
            ),
            RoomViewAction::PaginateSearch { search_id, request, next_batch } => Some(
                async move {
                    let result = store.paginate_search(request, next_batch).await;
                    RoomViewEvent::SearchCompleted { search_id, result }
                }
                .boxed(),
            ),
            RoomViewAction::SaveSettings { room_id, changes } => Some(
                async move {
                    let results = store.save_settings(&room_id, changes).await;
                    RoomViewEvent::SettingsSaved { results }
                }
                .boxed(),
            ),
            RoomViewAction::ResendUnsent { room_id } => {
                store.resend_unsent(&room_id);
                None
            },
            RoomViewAction::CancelUnsent { room_id } => {
                store.cancel_unsent(&room_id);
                None
            },
            RoomViewAction::Render
            | RoomViewAction::Dispatch(_)
            | RoomViewAction::Notify(_)
            | RoomViewAction::PromptDisplayName
            | RoomViewAction::SetCompletions(_)
            | RoomViewAction::ApplyTint { .. }
            | RoomViewAction::JumpToLiveTimeline
            | RoomViewAction::JumpToReadMarker
            | RoomViewAction::ForgetReadMarker
            | RoomViewAction::ResetSearchScroll => None,
        }
    }
}
