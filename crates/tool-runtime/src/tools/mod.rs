pub mod query_data;
pub mod visualize;

pub use query_data::QueryDataTool;
pub use visualize::VisualizeTool;
