use warp::Reply;

use crate::constants::SHOPPING_LIST_FILENAME;

use super::list::{render_shopping_list, ShoppingItem};

/// Rendered shopping list as a downloadable text attachment.
pub fn shopping_list_reply(items: &[ShoppingItem]) -> impl Reply {
    let body = render_shopping_list(items);

    warp::reply::with_header(
        warp::reply::with_header(body, "Content-Type", "text/plain; charset=utf-8"),
        "Content-Disposition",
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    )
}
