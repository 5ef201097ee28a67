pub mod extract;
pub mod render;
pub mod run;
pub mod sync;
pub mod themes;
