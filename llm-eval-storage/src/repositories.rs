//! PostgreSQL implementations of the store traits, one module per entity.

mod dataset;
mod evaluation;
mod model;
mod scheme;
mod task;

use sqlx::PgPool;

/// Store backed by a PostgreSQL pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
