pub mod auth;
pub mod users;

use axum::Router;
use axum::routing::{delete, get, post, put};

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Auth
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/forgetPassword", post(auth::forgot_password))
        .route("/resetPassword", post(auth::reset_password))
        // Users
        .route("/users/create", post(users::create))
        .route("/users/approve/{user_id}", put(users::approve))
        .route("/users/get", get(users::get))
        .route("/users/update/{id}", put(users::update))
        .route("/users/delete", delete(users::delete))
}
