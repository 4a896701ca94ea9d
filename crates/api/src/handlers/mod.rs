pub mod bridges;
pub mod cases;
pub mod messages;
pub mod monitoring;
pub mod workspaces;
