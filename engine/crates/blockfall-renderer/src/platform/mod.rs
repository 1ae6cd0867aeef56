pub mod camera;
pub mod timer;
