pub mod db;
pub mod vision;

pub use db::PgStore;
pub use vision::OpenAiVisionAdapter;
