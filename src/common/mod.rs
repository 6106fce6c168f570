pub mod command_log;
pub mod entity;
pub mod eref;
pub mod geometry;
pub mod observer;
pub mod project_serde;
