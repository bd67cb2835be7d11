mod local_hub;
mod signaling_transport;

pub use local_hub::*;
pub use signaling_transport::*;
