pub mod due;
pub mod fetch;
