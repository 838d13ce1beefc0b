pub mod payload;
pub mod work_item;
