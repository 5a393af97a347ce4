//! Comment resolvers, including the reply tree.

use async_graphql::{Context, ErrorExtensions, InputObject, Object, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};

use crate::context::Identity;
use crate::entity::{comment, post, user};
use crate::error::{internal, ApiError};
use crate::policy;

use super::post::Post;
use super::user::User;

/// GraphQL object for a comment. Replies reference their parent through
/// `parent_comment_id` and are fetched lazily per node.
#[derive(Clone)]
pub struct Comment {
    pub id: i32,
    pub content: String,
    pub author_id: i32,
    pub post_id: i32,
    pub parent_comment_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[Object]
impl Comment {
    async fn id(&self) -> i32 {
        self.id
    }

    async fn content(&self) -> &str {
        &self.content
    }

    async fn author_id(&self) -> i32 {
        self.author_id
    }

    async fn post_id(&self) -> i32 {
        self.post_id
    }

    async fn parent_comment_id(&self) -> Option<i32> {
        self.parent_comment_id
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

    async fn post(&self, ctx: &Context<'_>) -> Result<Option<Post>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let post = post::Entity::find_by_id(self.post_id)
            .one(db)
            .await
            .map_err(internal)?;
        Ok(post.map(Post::from))
    }

    async fn parent_comment(&self, ctx: &Context<'_>) -> Result<Option<Comment>> {
        let Some(parent_id) = self.parent_comment_id else {
            return Ok(None);
        };
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let parent = comment::Entity::find_by_id(parent_id)
            .one(db)
            .await
            .map_err(internal)?;
        Ok(parent.map(Comment::from))
    }

    async fn replies(&self, ctx: &Context<'_>) -> Result<Vec<Comment>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let replies = comment::Entity::find()
            .filter(comment::Column::ParentCommentId.eq(self.id))
            .all(db)
            .await
            .map_err(internal)?;
        Ok(replies.into_iter().map(Comment::from).collect())
    }
}

impl From<comment::Model> for Comment {
    fn from(model: comment::Model) -> Self {
        Self {
            id: model.id,
            content: model.content,
            author_id: model.author_id,
            post_id: model.post_id,
            parent_comment_id: model.parent_comment_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(InputObject)]
pub struct CreateCommentInput {
    pub content: String,
    pub post_id: i32,
    pub parent_comment_id: Option<i32>,
}

#[derive(InputObject)]
pub struct UpdateCommentInput {
    pub content: String,
}

#[derive(Default)]
pub struct CommentQuery;

#[Object]
impl CommentQuery {
    async fn comment(&self, ctx: &Context<'_>, id: i32) -> Result<Option<Comment>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let comment = comment::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(internal)?;
        Ok(comment.map(Comment::from))
    }

    /// List comments, newest first.
    async fn comments(
        &self,
        ctx: &Context<'_>,
        post_id: Option<i32>,
        author_id: Option<i32>,
        parent_comment_id: Option<i32>,
        skip: Option<i32>,
        take: Option<i32>,
    ) -> Result<Vec<Comment>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();

        let mut query = comment::Entity::find();
        if let Some(post_id) = post_id {
            query = query.filter(comment::Column::PostId.eq(post_id));
        }
        if let Some(author_id) = author_id {
            query = query.filter(comment::Column::AuthorId.eq(author_id));
        }
        if let Some(parent_comment_id) = parent_comment_id {
            query = query.filter(comment::Column::ParentCommentId.eq(parent_comment_id));
        }
        query = query.order_by_desc(comment::Column::CreatedAt);
        if let Some(skip) = skip {
            query = query.offset(skip.max(0) as u64);
        }
        if let Some(take) = take {
            query = query.limit(take.max(0) as u64);
        }

        let comments = query.all(db).await.map_err(internal)?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }
}

#[derive(Default)]
pub struct CommentMutation;

#[Object]
impl CommentMutation {
    /// Comment on a post, optionally as a reply. A reply's parent must exist
    /// and belong to the same post.
    async fn create_comment(
        &self,
        ctx: &Context<'_>,
        data: CreateCommentInput,
    ) -> Result<Comment> {
        let identity = ctx.data_unchecked::<Identity>();
        let user_id = identity.require_user().map_err(|e| e.extend())?;

        let db = ctx.data_unchecked::<DatabaseConnection>();
        post::Entity::find_by_id(data.post_id)
            .one(db)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::NotFound("Post").extend())?;

        if let Some(parent_id) = data.parent_comment_id {
            let parent = comment::Entity::find_by_id(parent_id)
                .one(db)
                .await
                .map_err(internal)?
                .ok_or_else(|| ApiError::NotFound("Parent comment").extend())?;

            if parent.post_id != data.post_id {
                return Err(ApiError::Validation(
                    "Parent comment does not belong to the specified post".into(),
                )
                .extend());
            }
        }

        let now = Utc::now();
        let comment = comment::ActiveModel {
            content: Set(data.content),
            author_id: Set(user_id),
            post_id: Set(data.post_id),
            parent_comment_id: Set(data.parent_comment_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(internal)?;

        tracing::info!(comment = comment.id, user = user_id, "comment created");

        Ok(Comment::from(comment))
    }

    async fn update_comment(
        &self,
        ctx: &Context<'_>,
        id: i32,
        data: UpdateCommentInput,
    ) -> Result<Comment> {
        let identity = ctx.data_unchecked::<Identity>();
        let user_id = identity.require_user().map_err(|e| e.extend())?;

        let db = ctx.data_unchecked::<DatabaseConnection>();
        let comment = comment::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::NotFound("Comment").extend())?;

        if !policy::can_mutate_owned(identity, comment.author_id) {
            return Err(ApiError::NotAuthorized("update this comment").extend());
        }

        let mut active: comment::ActiveModel = comment.into();
        active.content = Set(data.content);
        active.updated_at = Set(Utc::now());

        let updated = active.update(db).await.map_err(internal)?;

        tracing::info!(comment = id, user = user_id, "comment updated");

        Ok(Comment::from(updated))
    }

    async fn delete_comment(&self, ctx: &Context<'_>, id: i32) -> Result<Comment> {
        let identity = ctx.data_unchecked::<Identity>();
        let user_id = identity.require_user().map_err(|e| e.extend())?;

        let db = ctx.data_unchecked::<DatabaseConnection>();
        let comment = comment::Entity::find_by_id(id)
            .one(db)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::NotFound("Comment").extend())?;

        if !policy::can_mutate_owned(identity, comment.author_id) {
            return Err(ApiError::NotAuthorized("delete this comment").extend());
        }

        comment::Entity::delete_by_id(id)
            .exec(db)
            .await
            .map_err(internal)?;

        tracing::info!(comment = id, user = user_id, "comment deleted");

        Ok(Comment::from(comment))
    }
}
