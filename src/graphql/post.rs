//! Post resolvers: visibility-checked queries, owner-or-admin mutations, and
//! aggregate fields.

use async_graphql::{Context, ErrorExtensions, InputObject, Object, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};

use crate::context::Identity;
use crate::entity::{comment, like, post, rating, user};
use crate::error::{internal, ApiError};
use crate::policy;

use super::comment::Comment;
use super::like::Like;
use super::rating::Rating;
use super::user::User;

/// GraphQL object for a blog post.
#[derive(Clone)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub content: String,
    pub published: bool,
    pub author_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[Object]
impl Post {
    async fn id(&self) -> i32 {
        self.id
    }

    async fn title(&self) -> &str {
        &self.title
    }

    async fn content(&self) -> &str {
        &self.content
    }

    async fn published(&self) -> bool {
        self.published
    }

    async fn author_id(&self) -> i32 {
        self.author_id
    }

    async fn created_at(&self) -> String {
        self.created_at.to_rfc3339()
    }

    async fn updated_at(&self) -> String {
        self.updated_at.to_rfc3339()
    }

    async fn author(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let author = user::Entity::find_by_id(self.author_id)
            .one(db)
            .await
            .map_err(internal)?;
        Ok(author.map(User::from))
    }

    /// Top-level comments only; replies hang off each comment's `replies`.
    async fn comments(&self, ctx: &Context<'_>) -> Result<Vec<Comment>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let comments = comment::Entity::find()
            .filter(comment::Column::PostId.eq(self.id))
            .filter(comment::Column::ParentCommentId.is_null())
            .all(db)
            .await
            .map_err(internal)?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }

    async fn likes(&self, ctx: &Context<'_>) -> Result<Vec<Like>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let likes = like::Entity::find()
            .filter(like::Column::PostId.eq(self.id))
            .all(db)
            .await
            .map_err(internal)?;
        Ok(likes.into_iter().map(Like::from).collect())
    }

    async fn ratings(&self, ctx: &Context<'_>) -> Result<Vec<Rating>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let ratings = rating::Entity::find()
            .filter(rating::Column::PostId.eq(self.id))
            .all(db)
            .await
            .map_err(internal)?;
        Ok(ratings.into_iter().map(Rating::from).collect())
    }

    async fn like_count(&self, ctx: &Context<'_>) -> Result<i64> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let count = like::Entity::find()
            .filter(like::Column::PostId.eq(self.id))
            .count(db)
            .await
            .map_err(internal)?;
        Ok(count as i64)
    }

    /// Arithmetic mean of all rating values; `null` when the post has no
    /// ratings.
    async fn average_rating(&self, ctx: &Context<'_>) -> Result<Option<f64>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let ratings = rating::Entity::find()
            .filter(rating::Column::PostId.eq(self.id))
            .all(db)
            .await
            .map_err(internal)?;

        if ratings.is_empty() {
            return Ok(None);
        }

        let sum: i32 = ratings.iter().map(|r| r.value).sum();
        Ok(Some(f64::from(sum) / ratings.len() as f64))
    }
}

impl From<post::Model> for Post {
    fn from(model: post::Model) -> Self {
        Self {
            id: model.id,
            title: model.title,
            content: model.content,
            published: model.published,
            author_id: model.author_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(InputObject)]
pub struct CreatePostInput {
    pub title: String,
    pub content: String,
    pub published: Option<bool>,
}

#[derive(InputObject)]
pub struct UpdatePostInput {
    pub title: Option<String>,
    pub content: Option<String>,
    pub published: Option<bool>,
}

#[derive(Default)]
pub struct PostQuery;

#[Object]
impl PostQuery {
    async fn post(&self, ctx: &Context<'_>, id: i32) -> Result<Post> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let post = post::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::NotFound("Post").extend())?;

        let identity = ctx.data_unchecked::<Identity>();
        if !policy::can_view_post(identity, &post) {
            return Err(ApiError::NotAuthorized("view this post").extend());
        }

        Ok(Post::from(post))
    }

    /// List posts, newest first by default.
    ///
    /// Non-admin callers only ever see published posts; a caller-supplied
    /// `published` filter is intersected with that constraint, so asking for
    /// `published: false` as a non-admin yields nothing rather than drafts.
    async fn posts(
        &self,
        ctx: &Context<'_>,
        published: Option<bool>,
        author_id: Option<i32>,
        skip: Option<i32>,
        take: Option<i32>,
        order_by: Option<String>,
    ) -> Result<Vec<Post>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let identity = ctx.data_unchecked::<Identity>();

        let mut query = post::Entity::find();
        if let Some(published) = published {
            query = query.filter(post::Column::Published.eq(published));
        }
        if let Some(author_id) = author_id {
            query = query.filter(post::Column::AuthorId.eq(author_id));
        }
        if !identity.is_admin() {
            query = query.filter(post::Column::Published.eq(true));
        }

        query = match order_by.as_deref() {
            Some("createdAt_ASC") => query.order_by_asc(post::Column::CreatedAt),
            _ => query.order_by_desc(post::Column::CreatedAt),
        };

        if let Some(skip) = skip {
            query = query.offset(skip.max(0) as u64);
        }
        if let Some(take) = take {
            query = query.limit(take.max(0) as u64);
        }

        let posts = query.all(db).await.map_err(internal)?;
        Ok(posts.into_iter().map(Post::from).collect())
    }
}

#[derive(Default)]
pub struct PostMutation;

#[Object]
impl PostMutation {
    async fn create_post(&self, ctx: &Context<'_>, data: CreatePostInput) -> Result<Post> {
        let identity = ctx.data_unchecked::<Identity>();
        let user_id = identity.require_user().map_err(|e| e.extend())?;

        let db = ctx.data_unchecked::<DatabaseConnection>();
        let now = Utc::now();
        let post = post::ActiveModel {
            title: Set(data.title),
            content: Set(data.content),
            published: Set(data.published.unwrap_or(false)),
            author_id: Set(user_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(internal)?;

        tracing::info!(post = post.id, user = user_id, "post created");

        Ok(Post::from(post))
    }

    async fn update_post(
        &self,
        ctx: &Context<'_>,
        id: i32,
        data: UpdatePostInput,
    ) -> Result<Post> {
        let identity = ctx.data_unchecked::<Identity>();
        let user_id = identity.require_user().map_err(|e| e.extend())?;

        let db = ctx.data_unchecked::<DatabaseConnection>();
        let post = post::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::NotFound("Post").extend())?;

        if !policy::can_mutate_owned(identity, post.author_id) {
            return Err(ApiError::NotAuthorized("update this post").extend());
        }

        let mut active: post::ActiveModel = post.into();
        if let Some(title) = data.title {
            active.title = Set(title);
        }
        if let Some(content) = data.content {
            active.content = Set(content);
        }
        if let Some(published) = data.published {
            active.published = Set(published);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await.map_err(internal)?;

        tracing::info!(post = id, user = user_id, "post updated");

        Ok(Post::from(updated))
    }

    async fn delete_post(&self, ctx: &Context<'_>, id: i32) -> Result<Post> {
        let identity = ctx.data_unchecked::<Identity>();
        let user_id = identity.require_user().map_err(|e| e.extend())?;

        let db = ctx.data_unchecked::<DatabaseConnection>();
        let post = post::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::NotFound("Post").extend())?;

        if !policy::can_mutate_owned(identity, post.author_id) {
            return Err(ApiError::NotAuthorized("delete this post").extend());
        }

        post::Entity::delete_by_id(id).exec(db).await.map_err(internal)?;

        tracing::info!(post = id, user = user_id, "post deleted");

        Ok(Post::from(post))
    }
}
