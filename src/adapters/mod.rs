pub mod postgres;
pub mod rabbitmq;

pub use postgres::PostgresStore;
pub use rabbitmq::RabbitPublisher;
