pub mod app;
pub mod run;

pub use app::Cli;
pub use run::execute;
