pub(crate) mod matcher;
pub(crate) mod path;
pub(crate) mod projection;

pub use matcher::matches;
pub use projection::project;
