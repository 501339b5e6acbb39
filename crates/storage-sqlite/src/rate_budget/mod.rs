mod repository;

pub use repository::SqliteBudgetStore;
