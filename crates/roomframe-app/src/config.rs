//! Controller configuration and per-mount options.

use std::time::Duration;

use roomframe_core::{EventId, JoinOptions, RoomId, UserId};

use crate::{completion::DEFAULT_COMPLETION_DEBOUNCE, presence::DEFAULT_ACTIVITY_INTERVAL};

/// Slash commands offered for completion.
pub const DEFAULT_COMMANDS: &[&str] = &[
    "/me", "/nick", "/join", "/part", "/topic", "/invite", "/kick", "/ban", "/unban", "/op", "/deop",
];

/// Room controller configuration
#[derive(Debug, Clone)]
pub struct RoomViewConfig {
    /// Coalescing window for completion recomputation
    pub completion_debounce: Duration,
    /// Minimum interval between `user_activity` publishes
    pub activity_interval: Duration,
    /// Commands appended to completion candidates
    pub commands: Vec<String>,
    /// Ask for a display name before the account's first join
    pub prompt_for_display_name: bool,
}

impl Default for RoomViewConfig {
    fn default() -> Self {
        Self {
            completion_debounce: DEFAULT_COMPLETION_DEBOUNCE,
            activity_interval: DEFAULT_ACTIVITY_INTERVAL,
            commands: DEFAULT_COMMANDS.iter().map(ToString::to_string).collect(),
            prompt_for_display_name: true,
        }
    }
}

/// Invite delivered out of band (e.g. by email).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThirdPartyInvite {
    /// URL used to sign the invite when joining.
    pub invite_sign_url: Option<String>,
    /// Address the invite was sent to.
    pub invited_email: Option<String>,
}

/// Room details known before the room object exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutOfBandData {
    /// Room name from the invite.
    pub name: Option<String>,
    /// Room avatar URL from the invite.
    pub avatar_url: Option<String>,
    /// Display name of the inviter.
    pub inviter_name: Option<String>,
}

/// Inputs for one mount of the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomViewOptions {
    /// Room ID or alias to show.
    pub address: RoomId,
    /// Third-party invite, if the user followed one.
    pub third_party_invite: Option<ThirdPartyInvite>,
    /// Out-of-band room details.
    pub oob_data: Option<OutOfBandData>,
    /// Event to scroll to and highlight.
    pub focused_event: Option<EventId>,
}

impl RoomViewOptions {
    /// Options for a plain room address.
    pub fn new(address: impl Into<RoomId>) -> Self {
        Self { address: address.into(), third_party_invite: None, oob_data: None, focused_event: None }
    }

    /// Join parameters derived from the third-party invite.
    pub fn join_options(&self) -> JoinOptions {
        JoinOptions {
            invite_sign_url: self.third_party_invite.as_ref().and_then(|i| i.invite_sign_url.clone()),
        }
    }
}

/// The authenticated user as seen by the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Local user ID.
    pub user_id: UserId,
    /// Whether the account is a guest.
    pub is_guest: bool,
}
