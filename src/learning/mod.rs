pub mod store;

pub use store::LearningStore;
