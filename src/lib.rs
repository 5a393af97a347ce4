//! Quill - a GraphQL blog API.
//!
//! CRUD over users, posts, comments, likes, and ratings with JWT
//! authentication and role-based authorization, backed by SeaORM.
//!
//! - Identity comes from the `Authorization: Bearer` header; a bad token
//!   degrades to anonymous access and the resolvers enforce everything.
//! - Ownership rules live in [`policy`], shared by every resolver group.

pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod entity;
pub mod error;
pub mod graphql;
pub mod policy;
