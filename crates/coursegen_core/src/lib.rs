pub mod dispatcher;
pub mod domain;
pub mod orchestrator;
pub mod pdf;
pub mod ports;
pub mod prompts;
pub mod quiz;
pub mod splitter;

pub use dispatcher::{DispatchError, KeyRotationDispatcher};
pub use domain::{Course, Module, ModuleContent, ModuleDraft, QuizQuestion, User, UserCredentials};
pub use orchestrator::{ContentOrchestrator, ContentSource, ModuleView, ReadyModule, ViewError};
pub use ports::{DatabaseService, PortError, PortResult, TextGenerationService};
pub use quiz::ParsedQuiz;
