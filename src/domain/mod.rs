pub mod list;
pub mod ordering;
pub mod task;

pub use list::{List, ListId};
pub use ordering::{next_rank, open_slot, reorder, RankChange, Ranked};
pub use task::{Priority, Subtask, SubtaskId, Task, TaskId, TaskStatus};
