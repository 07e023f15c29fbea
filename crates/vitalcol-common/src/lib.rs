pub mod error;
pub mod openai;
pub mod postgrest;
pub mod redis;
