//! REST endpoints for operations that don't fit GraphQL: health checks, cached artwork, and
//! media streaming. Everything else goes through `/graphql`.

pub mod artwork;
pub mod health;
pub mod stream;
