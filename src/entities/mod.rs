pub mod cart_item;
pub mod category;
pub mod notification;
pub mod order;
pub mod order_item;
pub mod order_status_history;
pub mod product;
pub mod product_image;
pub mod product_size;
pub mod stock_movement;
