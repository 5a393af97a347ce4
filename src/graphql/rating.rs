//! Rating resolvers. Rating a post upserts the caller's rating for it;
//! updating or deleting a rating is owner-only, with no admin override.

use async_graphql::{Context, ErrorExtensions, InputObject, Object, Result};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::context::Identity;
use crate::entity::{post, rating, user};
use crate::error::{internal, ApiError};
use crate::policy;

use super::post::Post;
use super::user::User;

/// GraphQL object for a rating.
#[derive(Clone)]
pub struct Rating {
    pub id: i32,
    pub value: i32,
    pub user_id: i32,
    pub post_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[Object]
impl Rating {
    async fn id(&self) -> i32 {
        self.id
    }

    async fn value(&self) -> i32 {
        self.value
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

    async fn updated_at(&self) -> String {
        self.updated_at.to_rfc3339()
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

impl From<rating::Model> for Rating {
    fn from(model: rating::Model) -> Self {
        Self {
            id: model.id,
            value: model.value,
            user_id: model.user_id,
            post_id: model.post_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(InputObject)]
pub struct CreateRatingInput {
    pub post_id: i32,
    pub value: i32,
}

#[derive(InputObject)]
pub struct UpdateRatingInput {
    pub value: i32,
}

fn check_value(value: i32) -> Result<()> {
    if !(1..=5).contains(&value) {
        return Err(
            ApiError::Validation("Rating value must be between 1 and 5".into()).extend(),
        );
    }
    Ok(())
}

#[derive(Default)]
pub struct RatingQuery;

#[Object]
impl RatingQuery {
    async fn ratings(
        &self,
        ctx: &Context<'_>,
        post_id: i32,
        user_id: Option<i32>,
    ) -> Result<Vec<Rating>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();

        let mut query = rating::Entity::find().filter(rating::Column::PostId.eq(post_id));
        if let Some(user_id) = user_id {
            query = query.filter(rating::Column::UserId.eq(user_id));
        }

        let ratings = query.all(db).await.map_err(internal)?;
        Ok(ratings.into_iter().map(Rating::from).collect())
    }
}

#[derive(Default)]
pub struct RatingMutation;

#[Object]
impl RatingMutation {
    /// Rate a post. Re-rating an already-rated post overwrites the existing
    /// rating in place.
    async fn rate_post(&self, ctx: &Context<'_>, data: CreateRatingInput) -> Result<Rating> {
        let identity = ctx.data_unchecked::<Identity>();
        let user_id = identity.require_user().map_err(|e| e.extend())?;

        check_value(data.value)?;

        let db = ctx.data_unchecked::<DatabaseConnection>();
        post::Entity::find_by_id(data.post_id)
            .one(db)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::NotFound("Post").extend())?;

        let existing = rating::Entity::find()
            .filter(rating::Column::UserId.eq(user_id))
            .filter(rating::Column::PostId.eq(data.post_id))
            .one(db)
            .await
            .map_err(internal)?;

        if let Some(existing) = existing {
            let mut active: rating::ActiveModel = existing.into();
            active.value = Set(data.value);
            active.updated_at = Set(Utc::now());
            let updated = active.update(db).await.map_err(internal)?;

            tracing::info!(
                post = data.post_id,
                user = user_id,
                value = data.value,
                "rating updated"
            );

            return Ok(Rating::from(updated));
        }

        let now = Utc::now();
        let rating = rating::ActiveModel {
            value: Set(data.value),
            user_id: Set(user_id),
            post_id: Set(data.post_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(internal)?;

        tracing::info!(
            post = data.post_id,
            user = user_id,
            value = data.value,
            "post rated"
        );

        Ok(Rating::from(rating))
    }

    async fn update_rating(
        &self,
        ctx: &Context<'_>,
        id: i32,
        data: UpdateRatingInput,
    ) -> Result<Rating> {
        let identity = ctx.data_unchecked::<Identity>();
        let user_id = identity.require_user().map_err(|e| e.extend())?;

        check_value(data.value)?;

        let db = ctx.data_unchecked::<DatabaseConnection>();
        let rating = rating::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::NotFound("Rating").extend())?;

        // Owner only, admins included.
        if !policy::can_mutate_owned_strict(identity, rating.user_id) {
            return Err(ApiError::NotAuthorized("update this rating").extend());
        }

        let mut active: rating::ActiveModel = rating.into();
        active.value = Set(data.value);
        active.updated_at = Set(Utc::now());
        let updated = active.update(db).await.map_err(internal)?;

        tracing::info!(rating = id, user = user_id, value = data.value, "rating updated");

        Ok(Rating::from(updated))
    }

    async fn delete_rating(&self, ctx: &Context<'_>, id: i32) -> Result<Rating> {
        let identity = ctx.data_unchecked::<Identity>();
        let user_id = identity.require_user().map_err(|e| e.extend())?;

        let db = ctx.data_unchecked::<DatabaseConnection>();
        let rating = rating::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::NotFound("Rating").extend())?;

        if !policy::can_mutate_owned_strict(identity, rating.user_id) {
            return Err(ApiError::NotAuthorized("delete this rating").extend());
        }

        rating::Entity::delete_by_id(id)
            .exec(db)
            .await
            .map_err(internal)?;

        tracing::info!(rating = id, user = user_id, "rating deleted");

        Ok(Rating::from(rating))
    }
}
