pub mod memo;
pub mod redis;
