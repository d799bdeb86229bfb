//! Business logic services.
//!
//! Services sit on top of the storage layer and own all mutation and query
//! rules for taught knowledge.

pub mod aggregation;
mod knowledge;
mod recall;
mod reload;

pub use aggregation::{
    aggregate_by_teacher, aggregate_guild, group_by_teacher, resolve_teacher_filter,
};
pub use knowledge::{KnowledgeService, StoreStatus};
pub use recall::RecallService;
pub use reload::spawn_reload_task;
