pub mod feedspy;
pub mod plagiarism;
pub mod purchase;
pub mod recipe;
pub mod style;
