pub mod collab;
pub mod format;
pub mod paths;
pub mod session;
pub mod tree_view;
