pub mod postgres;

pub use postgres::SignalDatabase;
