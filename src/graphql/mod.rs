//! GraphQL schema assembly and HTTP wiring.
//!
//! Per-entity resolver groups are merged into the Query and Mutation roots.
//! The axum handler builds the request identity from the headers and injects
//! it as per-request data; the database connection and token codec live in
//! schema data.

pub mod comment;
pub mod like;
pub mod post;
pub mod rating;
pub mod user;

use async_graphql::{EmptySubscription, MergedObject, Schema};
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    extract::State,
    http::HeaderMap,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use sea_orm::DatabaseConnection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::TokenCodec;
use crate::context::Identity;

/// Combined Query type
#[derive(MergedObject, Default)]
pub struct Query(
    user::UserQuery,
    post::PostQuery,
    comment::CommentQuery,
    like::LikeQuery,
    rating::RatingQuery,
);

/// Combined Mutation type
#[derive(MergedObject, Default)]
pub struct Mutation(
    user::UserMutation,
    post::PostMutation,
    comment::CommentMutation,
    like::LikeMutation,
    rating::RatingMutation,
);

pub type AppSchema = Schema<Query, Mutation, EmptySubscription>;

pub fn build_schema(db: DatabaseConnection, tokens: TokenCodec) -> AppSchema {
    Schema::build(Query::default(), Mutation::default(), EmptySubscription)
        .data(db)
        .data(tokens)
        .finish()
}

#[derive(Clone)]
struct AppState {
    schema: AppSchema,
    tokens: TokenCodec,
}

async fn graphql_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    req: GraphQLRequest,
) -> GraphQLResponse {
    let identity = Identity::from_headers(&headers, &state.tokens);

    state
        .schema
        .execute(req.into_inner().data(identity))
        .await
        .into()
}

async fn apollo_sandbox() -> impl IntoResponse {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Quill - Apollo Sandbox</title>
    <style>body { margin: 0; overflow: hidden; }</style>
</head>
<body>
    <div id="sandbox" style="width: 100vw; height: 100vh;"></div>
    <script src="https://embeddable-sandbox.cdn.apollographql.com/_latest/embeddable-sandbox.umd.production.min.js"></script>
    <script>
        new window.EmbeddedSandbox({
            target: '#sandbox',
            initialEndpoint: window.location.origin + '/graphql',
        });
    </script>
</body>
</html>"#,
    )
}

/// Build the HTTP router: the GraphQL endpoint plus the sandbox page.
pub fn router(schema: AppSchema, tokens: TokenCodec) -> Router {
    Router::new()
        .route("/graphql", get(apollo_sandbox).post(graphql_handler))
        .route("/", get(apollo_sandbox))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { schema, tokens })
}
