mod database {
    pub mod actions;
    pub mod error;
    pub mod form;
    pub mod pagination;
    pub mod schema;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod domain {
    pub mod shopping_list;
    pub mod subscriptions;
    pub mod validation;
    pub mod validator;
}
pub mod api {
    pub mod recipes;
    pub mod reference;
    pub mod rejection;
    pub mod routes;
    pub mod state;
    pub mod users;
    pub mod views;
}
pub mod config;
mod constants;
pub mod media;

pub use authentication::*;
pub use constants::*;
pub use database::*;
pub use domain::*;
