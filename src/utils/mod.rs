pub mod date;
pub mod hash;
pub mod html;
pub mod numeric;
