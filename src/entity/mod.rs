//! SeaORM entity definitions for the blog schema.

pub mod comment;
pub mod like;
pub mod post;
pub mod rating;
pub mod user;
