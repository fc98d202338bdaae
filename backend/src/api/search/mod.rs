//! Search API route handlers and module exports.

mod search_courses;
pub use search_courses::search_courses;

mod get_course;
pub use get_course::get_course;

mod filter_definitions;
pub use filter_definitions::filter_definitions;

mod search_indexables;
pub use search_indexables::{search_categories, search_organizations, search_persons};

pub mod query_params;
