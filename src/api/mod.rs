pub(crate) mod auth;
pub(crate) mod classes;
pub(crate) mod errors;
pub(crate) mod exams;
pub(crate) mod grading;
pub(crate) mod guards;
pub(crate) mod handlers;
pub(crate) mod pagination;
pub(crate) mod router;
pub(crate) mod validation;
