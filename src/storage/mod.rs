mod catalog;
mod feeds;
mod follows;
mod posts;
mod schema;
mod types;
mod users;

pub use catalog::CatalogStore;
pub use schema::Database;
pub use types::{Feed, FeedFollow, FeedWithOwner, NewPost, Post, StoreError, User};
