pub mod ops_check;
pub mod ops_info;
pub mod ops_resolve;
pub mod ops_setup;
pub mod ops_tree;
