pub mod staff;
pub mod view;
