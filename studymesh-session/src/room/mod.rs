mod room_session;
mod roster;
mod session_actor;
mod session_command;
mod session_state;

pub use room_session::*;
pub use roster::*;
pub use session_command::*;
pub use session_state::*;
