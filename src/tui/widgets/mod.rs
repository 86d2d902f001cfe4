pub mod color;
pub mod side_panel;
pub mod status_bar;
pub mod task_list;
