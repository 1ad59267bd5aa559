//! 身份证号码识别的核心编排：多引擎回退搜索与校验流水线

pub mod orchestrator;
pub mod pipeline;
mod source;

pub use orchestrator::{
    Attempt, AttemptFailure, AttemptInput, AttemptOrigin, AttemptPlan, AttemptText,
    Orchestrator, SearchOutcome, StopPolicy,
};
pub use pipeline::{Pipeline, PipelineReport};
pub use source::SourceImage;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("图像读取失败: {0}")]
    ImageRead(String),
}
