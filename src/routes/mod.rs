mod auth;
mod health_check;
mod products;

pub use auth::{
    forget_pass, profile, public_profile, refresh_token, reset_pass, sign_in, sign_out, sign_up,
    update_avatar, update_profile, verify_email, verify_pass_reset_token,
};
pub use health_check::health_check;
pub use products::{
    add_new_product, add_product_image, delete_product, delete_product_image,
    get_latest_products, get_product_by_category, get_product_detail, get_products,
    update_product,
};
