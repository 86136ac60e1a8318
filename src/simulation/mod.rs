pub mod generator;

pub use generator::{generate_portfolio, GeneratedPortfolio, PortfolioConfig};
