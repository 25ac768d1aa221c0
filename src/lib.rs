pub mod active;
pub mod cli;
pub mod completion;
pub mod device;
pub mod due;
pub mod logging;
pub mod longterm;
pub mod rank;
pub mod repl;
pub mod settings;
pub mod statesync;
pub mod store;
pub mod timesheet;
pub mod todoist;
pub mod types;
