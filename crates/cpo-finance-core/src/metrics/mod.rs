pub mod investment_metrics;
