mod config;
mod connection;
mod error;
mod events;
mod media;
mod peer;
mod room;
mod signaling;

pub use config::*;
pub use connection::*;
pub use error::*;
pub use events::*;
pub use media::*;
pub use peer::*;
pub use room::*;
pub use signaling::*;
