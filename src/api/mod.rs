pub mod loops;
pub mod models;
