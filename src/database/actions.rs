pub mod ingredients;
pub mod recipes;
pub mod relations;
pub mod shopping_list;
pub mod subscriptions;
pub mod tags;
pub mod users;

pub use ingredients::*;
pub use recipes::*;
pub use relations::*;
pub use shopping_list::*;
pub use subscriptions::*;
pub use tags::*;
pub use users::*;

use sqlx::{postgres::PgPoolOptions, Pool, Postgres};

use crate::error::Error;

/// Opens the shared connection pool from `DATABASE_URL`.
pub async fn connect_pool() -> Result<Pool<Postgres>, Error> {
    let url = std::env::var("DATABASE_URL")
        .map_err(|_| Error::Query(String::from("DATABASE_URL is not set")))?;

    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await?;

    Ok(pool)
}
