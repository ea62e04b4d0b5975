#![cfg_attr(not(test), forbid(unsafe_code))]

//! Live machinery of the roomsync messaging core.
//!
//! The pieces fit together like this: a [`store::MessageStore`] delivers an
//! ordered change feed, [`aggregator::RoomAggregator`] folds that feed into
//! per-room summaries, [`receipts::ReadReceiptWriter`] flips read flags when
//! a room is opened, and [`dispatcher::NotificationDispatcher`] turns
//! appended messages into at-most-one push notification each, gated by the
//! [`ledger::IdempotencyLedger`].

pub mod aggregator;
pub mod directory;
pub mod dispatcher;
pub mod ledger;
pub mod push;
pub mod receipts;
pub mod session;
pub mod store;
