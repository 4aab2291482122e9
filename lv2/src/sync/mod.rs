pub mod notify;
pub mod rw;
pub mod spin;

pub use notify::Notifier;
pub use rw::RWLock;
pub use spin::ticket::{TicketMutex, TicketMutexGuard};

#[cfg(test)]
mod test;
