/// Router Module Index
///
/// Splits the routing table by resource. Access control is not applied per router:
/// each handler checks its policy through the `AuthUser`/`AdminUser` extractors and
/// `permissions::Policy`, so anonymous reads and authenticated writes can share a path.

/// Sign-up, token exchange and the health probe. No credentials required.
pub mod auth;

/// `/users`, admin only apart from `/users/me`.
pub mod users;

/// Categories, genres and titles (admin writes, public reads).
pub mod catalog;

/// Reviews and comments nested under titles.
pub mod reviews;
