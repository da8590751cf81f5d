pub mod files;
pub mod human;
pub mod planning;

pub use files::{list_folder_tool, read_file_tool, write_file_tool, Workspace};
pub use human::human_feedback_tool;
pub use planning::{make_initial_plan_tool, tasks_from_response, PlannedTask};
