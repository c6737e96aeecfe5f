pub mod quick_apply;
