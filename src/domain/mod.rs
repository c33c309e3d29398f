pub mod diff;
pub mod history;
pub mod order;
pub mod reconcile;
pub mod rules;
pub mod timeline;
