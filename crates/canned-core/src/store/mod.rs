pub mod db;
pub mod history;

pub use db::Database;
pub use history::{ReplyHistory, ReplyRecord};
