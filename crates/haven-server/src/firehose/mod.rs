pub mod dispatch;
pub mod events;
pub mod stream;
