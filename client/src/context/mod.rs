pub mod dao;
pub mod token;
