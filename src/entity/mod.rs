pub mod game;
pub mod participant;
pub mod user;
