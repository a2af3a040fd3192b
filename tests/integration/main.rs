//! End-to-end tests: a scripted browser drives the real calendar source,
//! executor and lifecycle controller.

mod mock_browser;
mod watch_cycle;
