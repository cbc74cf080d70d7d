pub mod data_loader;
pub mod enums;
pub mod helpers;
pub mod math_functions;
pub mod order_stat;
