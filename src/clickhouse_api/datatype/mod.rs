pub mod history_order_row;
pub mod order_book_row;
