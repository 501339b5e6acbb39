mod model;
mod repository;

pub(crate) use model::format_instant;
pub use model::PricePointDB;
pub use repository::PriceRepository;
