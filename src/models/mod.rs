pub mod core;
pub mod chatbot;
pub mod dispatch;
