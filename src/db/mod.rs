pub mod database;
pub mod index;
pub mod table;
