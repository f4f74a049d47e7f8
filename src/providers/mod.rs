pub mod cohere;
pub mod traits;

pub use cohere::CohereProvider;
