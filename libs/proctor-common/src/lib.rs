pub mod config;
pub mod files;
pub mod types;

pub use config::EngineConfig;
pub use files::FileMap;
pub use types::{
    Challenge, Difficulty, ExecutionOutcome, ExecutionRequest, File, Language, Step, Test,
    TestResult, MAX_FILES,
};
