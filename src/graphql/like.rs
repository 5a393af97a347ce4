//! Like resolvers. Liking is idempotent-returning; unliking a post that was
//! never liked is a not-found error.

use async_graphql::{Context, ErrorExtensions, Object, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::context::Identity;
use crate::entity::{like, post, user};
use crate::error::{internal, ApiError};

use super::post::Post;
use super::user::User;

/// GraphQL object for a like.
#[derive(Clone)]
pub struct Like {
    pub id: i32,
    pub user_id: i32,
    pub post_id: i32,
    pub created_at: DateTime<Utc>,
}

#[Object]
impl Like {
    async fn id(&self) -> i32 {
        self.id
    }

    async fn user_id(&self) -> i32 {
        self.user_id
    }

    async fn post_id(&self) -> i32 {
        self.post_id
    }

    async fn created_at(&self) -> String {
        self.created_at.to_rfc3339()
    }

    async fn user(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let user = user::Entity::find_by_id(self.user_id)
            .one(db)
            .await
            .map_err(internal)?;
        Ok(user.map(User::from))
    }

    async fn post(&self, ctx: &Context<'_>) -> Result<Option<Post>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let post = post::Entity::find_by_id(self.post_id)
            .one(db)
            .await
            .map_err(internal)?;
        Ok(post.map(Post::from))
    }
}

impl From<like::Model> for Like {
    fn from(model: like::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            post_id: model.post_id,
            created_at: model.created_at,
        }
    }
}

/// Load the like for a `(user, post)` pair, if any.
async fn find_pair(
    db: &DatabaseConnection,
    user_id: i32,
    post_id: i32,
) -> Result<Option<like::Model>> {
    like::Entity::find()
        .filter(like::Column::UserId.eq(user_id))
        .filter(like::Column::PostId.eq(post_id))
        .one(db)
        .await
        .map_err(internal)
}

#[derive(Default)]
pub struct LikeQuery;

#[Object]
impl LikeQuery {
    async fn likes(
        &self,
        ctx: &Context<'_>,
        post_id: i32,
        user_id: Option<i32>,
    ) -> Result<Vec<Like>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();

        let mut query = like::Entity::find().filter(like::Column::PostId.eq(post_id));
        if let Some(user_id) = user_id {
            query = query.filter(like::Column::UserId.eq(user_id));
        }

        let likes = query.all(db).await.map_err(internal)?;
        Ok(likes.into_iter().map(Like::from).collect())
    }
}

#[derive(Default)]
pub struct LikeMutation;

#[Object]
impl LikeMutation {
    /// Like a post. Liking an already-liked post returns the existing like
    /// unchanged.
    async fn like_post(&self, ctx: &Context<'_>, post_id: i32) -> Result<Like> {
        let identity = ctx.data_unchecked::<Identity>();
        let user_id = identity.require_user().map_err(|e| e.extend())?;

        let db = ctx.data_unchecked::<DatabaseConnection>();
        post::Entity::find_by_id(post_id)
            .one(db)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::NotFound("Post").extend())?;

        if let Some(existing) = find_pair(db, user_id, post_id).await? {
            return Ok(Like::from(existing));
        }

        let like = like::ActiveModel {
            user_id: Set(user_id),
            post_id: Set(post_id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(internal)?;

        tracing::info!(post = post_id, user = user_id, "post liked");

        Ok(Like::from(like))
    }

    /// Remove the caller's like from a post.
    async fn unlike_post(&self, ctx: &Context<'_>, post_id: i32) -> Result<Like> {
        let identity = ctx.data_unchecked::<Identity>();
        let user_id = identity.require_user().map_err(|e| e.extend())?;

        let db = ctx.data_unchecked::<DatabaseConnection>();
        let like = find_pair(db, user_id, post_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Like").extend())?;

        like::Entity::delete_by_id(like.id)
            .exec(db)
            .await
            .map_err(internal)?;

        tracing::info!(post = post_id, user = user_id, "post unliked");

        Ok(Like::from(like))
    }
}
