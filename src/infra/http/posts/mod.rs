//! Newsroom post routes: listings, editing, removal and image persistence.

mod forms;
mod handlers;

pub(super) use handlers::{
    create_form, create_submit, delete_by_id, delete_confirm, edit_form, edit_submit, full_news,
    index, posts_by_category, save_image, search,
};
