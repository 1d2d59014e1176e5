//! Browser lifecycle trackers.
//!
//! Each tracker owns its own per-visit state and reacts to the signals the
//! navigation shell forwards. No tracker reads another tracker's state.
//!
//! - [`page_view`]: `page_view` on entry, `page_duration` on exit
//! - [`scroll_depth`]: deepest scroll percentage per visit
//! - [`session_duration`]: elapsed session time on tab unload
//! - [`channel`]: first-touch acquisition channel on the landing route

pub mod channel;
pub mod page_view;
pub mod scroll_depth;
pub mod session_duration;

pub use channel::ChannelTracker;
pub use page_view::PageViewTracker;
pub use scroll_depth::ScrollDepthTracker;
pub use session_duration::SessionDurationTracker;
