mod candidate_queue;
mod peer_link;
mod peer_session_manager;
mod reconnect_supervisor;

pub use candidate_queue::*;
pub use peer_link::*;
pub use peer_session_manager::*;
pub use reconnect_supervisor::*;
