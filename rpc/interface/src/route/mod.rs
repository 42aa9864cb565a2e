pub(crate) mod tip_info;
pub(crate) mod tips;
