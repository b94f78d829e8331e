mod migrate;
mod photos;
mod users;

pub use migrate::cmd_migrate;
pub use photos::cmd_photos_list;
pub use users::{cmd_users_list, cmd_users_remove};
