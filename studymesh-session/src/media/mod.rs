mod media_controller;
mod media_devices;
mod track;

pub use media_controller::*;
pub use media_devices::*;
pub use track::*;
