pub(crate) mod answer_keys;
pub(crate) mod classes;
pub(crate) mod exams;
pub(crate) mod grading_records;
pub(crate) mod papers;
pub(crate) mod students;
pub(crate) mod users;
