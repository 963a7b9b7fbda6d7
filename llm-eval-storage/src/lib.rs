pub mod memory;
pub mod postgres;
pub mod repositories;

pub use memory::InMemoryStore;
pub use postgres::{create_pool, health_check, migrate, PostgresConfig};
pub use repositories::PgStore;
