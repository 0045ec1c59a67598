//! The convergence engine: bounded retry, deadline polling, cooperative
//! cancellation and page scrolling. Reconcilers compose these; the intended
//! nesting is always poll-of-retry, never retry-of-poll.

mod cancel;
mod poll;
mod retry;
mod scroll;

pub use cancel::{CancellationToken, listen_for_shutdown};
pub use poll::{PollError, PollSettings, PollSpec, poll_until};
pub use retry::{RetryPolicy, retry};
pub use scroll::{DEFAULT_PAGE_SIZE, PartialListing, scroll_all, scroll_all_with_page_size};
