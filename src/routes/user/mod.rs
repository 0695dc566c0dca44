mod handler;
mod model;

pub use handler::{change_password, login, me, refresh_token, register};
