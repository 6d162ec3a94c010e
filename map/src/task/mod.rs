//! Background work of a map: the expiration chain that evicts due entries,
//! and the notifier that runs asynchronous expiration listeners.

pub(crate) mod janitor;
pub(crate) mod notifier;
