pub use studymesh_core::model::{PeerId, RoomId, RoomIdentity};

pub mod model {
    pub use studymesh_core::model::*;
    pub use studymesh_core::utils::default_ice_servers;
}

#[cfg(feature = "session")]
pub mod session {
    pub use studymesh_session::*;
}
