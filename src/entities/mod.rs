pub mod prelude;

pub mod photos;
pub mod users;
