pub mod db;
pub mod generation;
pub mod memory;

pub use db::DbAdapter;
pub use generation::OpenAiCompatGenerationAdapter;
pub use memory::InMemoryDb;
