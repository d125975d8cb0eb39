pub(crate) mod answer_key;
pub(crate) mod barcode;
pub(crate) mod compose;
pub(crate) mod grading_gateway;
pub(crate) mod pipeline;
pub(crate) mod reconcile;
pub(crate) mod shaping;
pub(crate) mod storage;
