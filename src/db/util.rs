//! Small helpers shared by the SQLite repositories.
//!
//! The schema stores UUIDs as `TEXT` (for human-readable dumps and easy external exposure),
//! which sits outside sqlx's native `Uuid` binding for SQLite (BLOB). Repositories decode the
//! column as `String` and parse it here instead of pulling in a derive-macro workaround.

use uuid::Uuid;

pub fn uuid_to_str(id: Uuid) -> String {
    id.to_string()
}

pub fn str_to_uuid(s: &str) -> Result<Uuid, uuid::Error> {
    Uuid::parse_str(s)
}
