pub mod dispatch;
pub mod output;
pub mod request;
