//! Authorization policy.
//!
//! Pure decision functions shared by every resolver group, so the
//! owner-or-admin rule cannot drift between entities. Ratings are the one
//! deliberate exception: only the author may touch them, admins included.

use crate::context::Identity;
use crate::entity::post;
use crate::entity::user::Role;

/// Owner-or-admin rule used for posts and comments.
pub fn can_mutate_owned(identity: &Identity, owner_id: i32) -> bool {
    identity.authenticated
        && (identity.user_id == Some(owner_id) || identity.role == Some(Role::Admin))
}

/// Owner-only rule used for ratings. No admin override.
pub fn can_mutate_owned_strict(identity: &Identity, owner_id: i32) -> bool {
    identity.authenticated && identity.user_id == Some(owner_id)
}

/// Published posts are public; unpublished ones are visible only to their
/// author and admins.
pub fn can_view_post(identity: &Identity, post: &post::Model) -> bool {
    post.published
        || (identity.authenticated
            && (identity.user_id == Some(post.author_id) || identity.role == Some(Role::Admin)))
}

/// Listing every user is an admin-only operation.
pub fn can_list_all_users(identity: &Identity) -> bool {
    identity.role == Some(Role::Admin)
}
