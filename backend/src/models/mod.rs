pub mod child;
pub mod credential;
pub mod verification;
pub mod view;
