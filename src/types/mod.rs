//! Core types for script2ext.

pub mod check;
pub mod events;
pub mod files;
pub mod message;
pub mod stream;

pub use check::*;
pub use events::*;
pub use files::*;
pub use message::*;
pub use stream::*;
