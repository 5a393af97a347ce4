//! User resolvers: signup/login, user queries, and relationship fields.

use async_graphql::{Context, ErrorExtensions, InputObject, Object, Result, SimpleObject};
use chrono::{DateTime, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::auth::{hash_password, verify_password, TokenCodec};
use crate::context::Identity;
use crate::entity::user::{self, Role};
use crate::entity::{comment, like, post, rating};
use crate::error::{internal, ApiError};
use crate::policy;

use super::comment::Comment;
use super::like::Like;
use super::post::Post;
use super::rating::Rating;

/// GraphQL object for a user account. The password hash never leaves the
/// entity layer.
#[derive(Clone)]
pub struct User {
    pub id: i32,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[Object]
impl User {
    async fn id(&self) -> i32 {
        self.id
    }

    async fn email(&self) -> &str {
        &self.email
    }

    async fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    async fn role(&self) -> Role {
        self.role
    }

    async fn created_at(&self) -> String {
        self.created_at.to_rfc3339()
    }

    async fn updated_at(&self) -> String {
        self.updated_at.to_rfc3339()
    }

    async fn posts(&self, ctx: &Context<'_>) -> Result<Vec<Post>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let posts = post::Entity::find()
            .filter(post::Column::AuthorId.eq(self.id))
            .all(db)
            .await
            .map_err(internal)?;
        Ok(posts.into_iter().map(Post::from).collect())
    }

    async fn comments(&self, ctx: &Context<'_>) -> Result<Vec<Comment>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let comments = comment::Entity::find()
            .filter(comment::Column::AuthorId.eq(self.id))
            .all(db)
            .await
            .map_err(internal)?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }

    async fn likes(&self, ctx: &Context<'_>) -> Result<Vec<Like>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let likes = like::Entity::find()
            .filter(like::Column::UserId.eq(self.id))
            .all(db)
            .await
            .map_err(internal)?;
        Ok(likes.into_iter().map(Like::from).collect())
    }

    async fn ratings(&self, ctx: &Context<'_>) -> Result<Vec<Rating>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let ratings = rating::Entity::find()
            .filter(rating::Column::UserId.eq(self.id))
            .all(db)
            .await
            .map_err(internal)?;
        Ok(ratings.into_iter().map(Rating::from).collect())
    }
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            role: model.role,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Token plus the freshly created/authenticated user.
#[derive(SimpleObject)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

#[derive(InputObject)]
pub struct CreateUserInput {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub role: Option<Role>,
}

#[derive(InputObject)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Default)]
pub struct UserQuery;

#[Object]
impl UserQuery {
    /// The currently authenticated user.
    async fn me(&self, ctx: &Context<'_>) -> Result<Option<User>> {
        let identity = ctx.data_unchecked::<Identity>();
        let user_id = identity.require_user().map_err(|e| e.extend())?;

        let db = ctx.data_unchecked::<DatabaseConnection>();
        let user = user::Entity::find_by_id(user_id)
            .one(db)
            .await
            .map_err(internal)?;
        Ok(user.map(User::from))
    }

    async fn user(&self, ctx: &Context<'_>, id: i32) -> Result<Option<User>> {
        let db = ctx.data_unchecked::<DatabaseConnection>();
        let user = user::Entity::find_by_id(id).one(db).await.map_err(internal)?;
        Ok(user.map(User::from))
    }

    /// All users. Admin only.
    async fn users(&self, ctx: &Context<'_>) -> Result<Vec<User>> {
        let identity = ctx.data_unchecked::<Identity>();
        if !policy::can_list_all_users(identity) {
            return Err(ApiError::NotAuthorized("list users").extend());
        }

        let db = ctx.data_unchecked::<DatabaseConnection>();
        let users = user::Entity::find().all(db).await.map_err(internal)?;
        Ok(users.into_iter().map(User::from).collect())
    }
}

#[derive(Default)]
pub struct UserMutation;

#[Object]
impl UserMutation {
    /// Register a new account and log it in immediately.
    async fn signup(&self, ctx: &Context<'_>, data: CreateUserInput) -> Result<AuthPayload> {
        let db = ctx.data_unchecked::<DatabaseConnection>();

        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(&data.email))
            .one(db)
            .await
            .map_err(internal)?;
        if existing.is_some() {
            return Err(ApiError::Validation("Email already in use".into()).extend());
        }

        let password_hash = hash_password(&data.password).map_err(|e| e.extend())?;

        let now = Utc::now();
        let user = user::ActiveModel {
            email: Set(data.email),
            name: Set(data.name),
            password_hash: Set(password_hash),
            role: Set(data.role.unwrap_or(Role::User)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(internal)?;

        tracing::info!(user = user.id, "new user created");

        let tokens = ctx.data_unchecked::<TokenCodec>();
        let token = tokens.issue(&user).map_err(|e| e.extend())?;

        Ok(AuthPayload {
            token,
            user: User::from(user),
        })
    }

    /// Exchange credentials for a token. The error is identical for an
    /// unknown email and a wrong password.
    async fn login(&self, ctx: &Context<'_>, data: LoginInput) -> Result<AuthPayload> {
        let db = ctx.data_unchecked::<DatabaseConnection>();

        let user = user::Entity::find()
            .filter(user::Column::Email.eq(&data.email))
            .one(db)
            .await
            .map_err(internal)?
            .ok_or_else(|| ApiError::InvalidCredentials.extend())?;

        if !verify_password(&data.password, &user.password_hash) {
            return Err(ApiError::InvalidCredentials.extend());
        }

        tracing::info!(user = user.id, "user logged in");

        let tokens = ctx.data_unchecked::<TokenCodec>();
        let token = tokens.issue(&user).map_err(|e| e.extend())?;

        Ok(AuthPayload {
            token,
            user: User::from(user),
        })
    }
}
