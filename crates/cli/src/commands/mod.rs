pub mod config_cmd;
pub mod doctor;
pub mod fuse;
pub mod onboard;
pub mod validate;
