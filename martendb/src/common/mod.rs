pub(crate) mod cancel;
pub(crate) mod constants;
pub(crate) mod lock;
pub(crate) mod util;

pub use cancel::CancellationToken;
pub use constants::*;
pub use lock::{LockHandle, LockRegistry};
pub use util::{atomic, Atomic};
