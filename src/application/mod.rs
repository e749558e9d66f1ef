pub mod accounts;
pub mod categories;
pub mod error;
pub mod images;
pub mod pagination;
pub mod policy;
pub mod posts;
pub mod repos;
pub mod validation;
