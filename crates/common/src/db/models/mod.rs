//! SeaORM entity models
//!
//! Relational records owned by PaperMind

mod analysis_result;
mod chat_message;
mod document;
mod project;

pub use project::{
    Entity as ProjectEntity,
    Model as ProjectRow,
    ActiveModel as ProjectActiveModel,
    Column as ProjectColumn,
};

pub use document::{
    Entity as DocumentEntity,
    Model as DocumentRow,
    ActiveModel as DocumentActiveModel,
    Column as DocumentColumn,
};

pub use chat_message::{
    Entity as ChatMessageEntity,
    Model as ChatMessageRow,
    ActiveModel as ChatMessageActiveModel,
    Column as ChatMessageColumn,
};

pub use analysis_result::{
    Entity as AnalysisResultEntity,
    Model as AnalysisResultRow,
    ActiveModel as AnalysisResultActiveModel,
    Column as AnalysisResultColumn,
};
