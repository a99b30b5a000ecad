//! Telegram front end for a telecom self-care platform.
//!
//! Users link one or more carrier accounts to their chat identity and run
//! balance checks, recharges, SMS sending and plan management through
//! multi-step conversational wizards. The conversational core (dialog
//! engine, session manager, response classifier, action router) is
//! transport-agnostic; `bot` binds it to Telegram.

/// Action-token encoding and decoding for inline buttons
pub mod actions;
/// Telegram transport binding
pub mod bot;
/// Carrier API client and response classification
pub mod carrier;
/// Configuration and settings management
pub mod config;
/// Per-user wizard step state machine
pub mod dialog;
/// Event orchestration and per-request context
pub mod engine;
/// Feature flow handlers
pub mod flows;
/// Per-user event serialization
pub mod gate;
/// Render requests emitted by the core
pub mod render;
/// Default-account and session-token bookkeeping
pub mod session;
/// Persistent user and account store
pub mod storage;
/// Shared test doubles
pub mod testing;
/// User-facing message templates
pub mod texts;
/// Retry and text helpers
pub mod utils;
