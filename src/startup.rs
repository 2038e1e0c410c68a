use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::PgPool;
use std::net::TcpListener;

use crate::blob_client::BlobClient;
use crate::configuration::Settings;
use crate::email_client::EmailClient;
use crate::middleware::{AuthGate, RequestLogger};
use crate::routes::{
    add_new_product, add_product_image, delete_product, delete_product_image, forget_pass,
    get_latest_products, get_product_by_category, get_product_detail, get_products, health_check,
    profile, public_profile, refresh_token, reset_pass, sign_in, sign_out, sign_up, update_avatar,
    update_product, update_profile, verify_email, verify_pass_reset_token,
};

pub fn run(
    listener: TcpListener,
    connection: PgPool,
    settings: Settings,
) -> Result<Server, std::io::Error> {
    let connection = web::Data::new(connection);
    let jwt_config = settings.jwt.clone();
    let jwt_config_data = web::Data::new(settings.jwt);
    let links = web::Data::new(settings.links);

    let http_client = reqwest::Client::new();
    let mailer = web::Data::new(EmailClient::new(
        settings.email.base_url,
        settings.email.sender,
        http_client.clone(),
    ));
    let blob = web::Data::new(BlobClient::new(settings.blob.base_url, http_client));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(RequestLogger)
            // Shared state
            .app_data(connection.clone())
            .app_data(jwt_config_data.clone())
            .app_data(links.clone())
            .app_data(mailer.clone())
            .app_data(blob.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/sign-up", web::post().to(sign_up))
            .route("/auth/verify-email", web::post().to(verify_email))
            .route("/auth/sign-in", web::post().to(sign_in))
            .route("/auth/refresh-token", web::post().to(refresh_token))
            .route("/auth/forget-pass", web::post().to(forget_pass))
            .route(
                "/auth/verify-pass-reset-token",
                web::post().to(verify_pass_reset_token),
            )
            .route("/auth/reset-pass", web::post().to(reset_pass))
            .route(
                "/product/get-product-detail/{id}",
                web::get().to(get_product_detail),
            )
            .route(
                "/product/get-product-by-category/{category}",
                web::get().to(get_product_by_category),
            )
            .route("/product/latest", web::get().to(get_latest_products))
            // Protected routes (access token required)
            .service(
                web::scope("/auth")
                    .wrap(AuthGate::new(jwt_config.clone()))
                    .route("/profile", web::get().to(profile))
                    .route("/profile/{id}", web::get().to(public_profile))
                    .route("/sign-out", web::post().to(sign_out))
                    .route("/update-profile", web::post().to(update_profile))
                    .route("/update-avatar", web::post().to(update_avatar)),
            )
            .service(
                web::scope("/product")
                    .wrap(AuthGate::new(jwt_config.clone()))
                    .route("/add-new-product", web::post().to(add_new_product))
                    .route("/update-product/{id}", web::post().to(update_product))
                    .route("/add-image/{id}", web::post().to(add_product_image))
                    .route("/delete-product/{id}", web::delete().to(delete_product))
                    .route(
                        "/delete-product-image/{product_id}/{image_id}",
                        web::delete().to(delete_product_image),
                    )
                    .route("/get-products", web::get().to(get_products)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
