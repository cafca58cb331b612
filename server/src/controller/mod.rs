pub use list::ListItemController;

mod list;
