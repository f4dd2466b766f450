pub mod game;
pub mod user;

pub use game::Game;
pub use user::User;
