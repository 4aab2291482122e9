//! # Spin Locks Module
//!
//! Short, non-blocking critical sections of the lv2 core.
//!
//! - [`TicketMutex`](ticket::TicketMutex) - fair spinlock using the ticket algorithm,
//!   with a `crossbeam` backoff so contending host threads yield instead of burning a core.
//!
//! Nothing may sleep while holding one of these. Threads that need to wait for a
//! wake-up park on a [`Notifier`](crate::sync::notify::Notifier) after releasing
//! every spin lock.

pub mod ticket;
