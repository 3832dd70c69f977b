//! Full-text search session.
//!
//! A [`SearchPanel`] owns at most one [`SearchSession`]. Every new search, and
//! every cancel, bumps a generation counter; a response carries the
//! [`SearchId`] captured when its request was issued and is dropped unless it
//! still names the live session. The in-flight request is never cancelled,
//! only its effect is suppressed.

use roomframe_core::{RoomId, SearchFilter, SearchHit, SearchRequest, SearchResponse, SessionError};

use crate::DiscardReason;

/// Generation token identifying one search session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SearchId(u64);

impl SearchId {
    /// Raw generation value.
    pub fn value(self) -> u64 {
        self.0
    }
}

/// Where to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchScope {
    /// Only the viewed room.
    #[default]
    Room,
    /// Every room of the account.
    All,
}

/// State of one search lineage: the initial page plus any older pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSession {
    id: SearchId,
    term: String,
    scope: SearchScope,
    filter: Option<SearchFilter>,
    results: Vec<SearchHit>,
    highlights: Vec<String>,
    next_batch: Option<String>,
    count: Option<u64>,
    in_progress: bool,
    received: bool,
}

impl SearchSession {
    /// Generation token of this session.
    pub fn id(&self) -> SearchId {
        self.id
    }

    /// Search term as typed.
    pub fn term(&self) -> &str {
        &self.term
    }

    /// Search scope.
    pub fn scope(&self) -> SearchScope {
        self.scope
    }

    /// Matches, newest first.
    pub fn results(&self) -> &[SearchHit] {
        &self.results
    }

    /// Highlight strings, longest first. Always contains the term once.
    pub fn highlights(&self) -> &[String] {
        &self.highlights
    }

    /// Cursor for older results, if any remain.
    pub fn next_batch(&self) -> Option<&str> {
        self.next_batch.as_deref()
    }

    /// Total matches as last reported by the server, for the header.
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Whether a round trip is outstanding.
    pub fn in_progress(&self) -> bool {
        self.in_progress
    }

    fn request(&self) -> SearchRequest {
        SearchRequest { filter: self.filter.clone(), term: self.term.clone() }
    }

    fn merge(&mut self, response: SearchResponse) {
        self.results.extend(response.results);
        self.next_batch = response.next_batch;
        if response.count.is_some() {
            self.count = response.count;
        }

        for highlight in response.highlights.into_iter().chain(std::iter::once(self.term.clone()))
        {
            if !self.highlights.contains(&highlight) {
                self.highlights.push(highlight);
            }
        }
        // Stable: equal lengths keep arrival order.
        self.highlights.sort_by_key(|h| std::cmp::Reverse(h.chars().count()));
        self.received = true;
    }
}

/// Result of feeding a search completion to the panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The response was merged into the live session.
    Applied,
    /// The round trip failed; prior results are untouched.
    Failed(SessionError),
    /// The response no longer belongs to the live session.
    Discarded(DiscardReason),
}

/// Search bar state and the active session.
#[derive(Debug, Clone, Default)]
pub struct SearchPanel {
    generation: u64,
    open: bool,
    session: Option<SearchSession>,
}

impl SearchPanel {
    /// A closed panel with no session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the search bar is shown.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// The active session, if any.
    pub fn session(&self) -> Option<&SearchSession> {
        self.session.as_ref()
    }

    /// Show the search bar.
    pub fn open(&mut self) {
        self.open = true;
    }

    /// Hide the search bar and drop the session.
    pub fn cancel(&mut self) {
        self.open = false;
        self.hide_results();
    }

    /// Drop the session, keeping the bar open. Late responses become stale.
    pub fn hide_results(&mut self) {
        self.generation += 1;
        self.session = None;
    }

    /// Supersede any previous session with a new one.
    ///
    /// `room` is required for [`SearchScope::Room`]; the caller checks it.
    pub fn start(
        &mut self,
        term: String,
        scope: SearchScope,
        room: Option<&RoomId>,
    ) -> (SearchId, SearchRequest) {
        self.generation += 1;
        let id = SearchId(self.generation);

        let filter = match (scope, room) {
            (SearchScope::Room, Some(room_id)) => Some(SearchFilter { rooms: vec![room_id.clone()] }),
            _ => None,
        };

        let session = SearchSession {
            id,
            term,
            scope,
            filter,
            results: Vec::new(),
            highlights: Vec::new(),
            next_batch: None,
            count: None,
            in_progress: true,
            received: false,
        };
        let request = session.request();

        self.open = true;
        self.session = Some(session);
        (id, request)
    }

    /// Request the next page of older results.
    ///
    /// Returns `None` for forward requests, when nothing older remains, or
    /// while a round trip is already outstanding.
    pub fn request_more(&mut self, backwards: bool) -> Option<(SearchId, SearchRequest, String)> {
        if !backwards {
            return None;
        }
        let session = self.session.as_mut()?;
        if session.in_progress {
            return None;
        }
        let next_batch = session.next_batch.clone()?;
        session.in_progress = true;
        Some((session.id, session.request(), next_batch))
    }

    /// Feed a completed round trip for `id`.
    pub fn complete(
        &mut self,
        id: SearchId,
        result: Result<SearchResponse, SessionError>,
    ) -> SearchOutcome {
        let session = match self.session.as_mut() {
            Some(session) if self.open && session.id == id => session,
            _ => return SearchOutcome::Discarded(DiscardReason::Stale),
        };

        session.in_progress = false;
        match result {
            Ok(response) => {
                session.merge(response);
                SearchOutcome::Applied
            },
            Err(error) => SearchOutcome::Failed(error),
        }
    }

    /// Items to display, top to bottom.
    ///
    /// Results are traversed oldest first. When searching every room, a
    /// header is emitted each time the room changes from the previous result.
    pub fn items<F>(&self, room_name: F) -> Vec<SearchItem>
    where
        F: Fn(&RoomId) -> Option<String>,
    {
        let Some(session) = &self.session else {
            return Vec::new();
        };

        let mut items = Vec::with_capacity(session.results.len() + 2);
        if session.in_progress {
            items.push(SearchItem::Spinner);
        }
        if !session.received {
            return items;
        }

        if session.next_batch.is_none() {
            let marker =
                if session.results.is_empty() { TopMarker::NoResults } else { TopMarker::NoMoreResults };
            items.push(SearchItem::TopMarker(marker));
        }

        let mut last_room: Option<&RoomId> = None;
        for hit in session.results.iter().rev() {
            if session.scope == SearchScope::All && last_room != Some(&hit.room_id) {
                let name = room_name(&hit.room_id)
                    .unwrap_or_else(|| format!("Unknown room {}", hit.room_id));
                items.push(SearchItem::RoomHeader { room_id: hit.room_id.clone(), name });
                last_room = Some(&hit.room_id);
            }
            items.push(SearchItem::Result(hit.clone()));
        }
        items
    }
}

/// Marker shown above the oldest result once nothing older remains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopMarker {
    /// The search matched nothing.
    NoResults,
    /// Every match has been loaded.
    NoMoreResults,
}

impl TopMarker {
    /// Display text.
    pub fn label(self) -> &'static str {
        match self {
            Self::NoResults => "No results",
            Self::NoMoreResults => "No more results",
        }
    }
}

/// One row of the search results panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchItem {
    /// A page is loading.
    Spinner,
    /// End-of-results marker.
    TopMarker(TopMarker),
    /// Room boundary when searching every room.
    RoomHeader {
        /// Room of the results that follow.
        room_id: RoomId,
        /// Room name, or `Unknown room <id>`.
        name: String,
    },
    /// A matching event.
    Result(SearchHit),
}
