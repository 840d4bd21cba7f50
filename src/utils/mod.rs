//! Вспомогательные модули

pub mod logger;
pub mod paths;
pub mod text;
