//! `PostgreSQL` adapters for generation persistence.

mod models;
mod queue;
mod results;
mod schema;
mod tasks;

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};

/// `PostgreSQL` connection pool type used by generation adapters.
pub type GenerationPgPool = Pool<ConnectionManager<PgConnection>>;

pub use queue::PostgresGenerationQueue;
pub use results::PostgresResultRepository;
pub use tasks::PostgresGenerationTaskRepository;
