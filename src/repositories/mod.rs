pub mod chatbot_store;
pub mod dispatch_store;
pub mod identity;
pub mod instance_store;
pub mod message_history;
pub mod webhook_error_log;
