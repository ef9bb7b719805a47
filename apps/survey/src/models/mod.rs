pub mod activity;
pub mod survey;
