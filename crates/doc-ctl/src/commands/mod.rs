pub mod descs;
pub mod dispatch;
