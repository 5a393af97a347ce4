//! Database connection and startup schema setup.

use sea_orm::sea_query::Index;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, DbErr, Schema};

use crate::entity::{comment, like, post, rating, user};

pub async fn connect(url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(url).await
}

/// Create the tables and composite unique indexes if they don't exist.
///
/// Foreign keys cascade on delete, so removing a user or post takes its
/// dependent comments, likes, and ratings with it. The `(user_id, post_id)`
/// unique indexes on likes and ratings are what holds the at-most-one
/// invariant under concurrent requests; the resolvers do no locking.
pub async fn init_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let tables = [
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(post::Entity),
        schema.create_table_from_entity(comment::Entity),
        schema.create_table_from_entity(like::Entity),
        schema.create_table_from_entity(rating::Entity),
    ];
    for mut stmt in tables {
        stmt.if_not_exists();
        db.execute(backend.build(&stmt)).await?;
    }

    let like_unique = Index::create()
        .name("uq_like_user_post")
        .table(like::Entity)
        .col(like::Column::UserId)
        .col(like::Column::PostId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&like_unique)).await?;

    let rating_unique = Index::create()
        .name("uq_rating_user_post")
        .table(rating::Entity)
        .col(rating::Column::UserId)
        .col(rating::Column::PostId)
        .unique()
        .if_not_exists()
        .to_owned();
    db.execute(backend.build(&rating_unique)).await?;

    Ok(())
}
