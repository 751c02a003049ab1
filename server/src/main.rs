use std::sync::Arc;

use actix_web::{web, App, HttpServer};

use server::auth::{StaticSecretVerifier, TokenVerifier};
use server::connection::ws_index;
use server::server::spawn_server;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let bind = std::env::var("WHITEBOARD_BIND").unwrap_or_else(|_| "127.0.0.1:8080".into());
    let secret =
        std::env::var("WHITEBOARD_AUTH_SECRET").unwrap_or_else(|_| "super-secret-key".into());

    let verifier: Arc<dyn TokenVerifier> = Arc::new(StaticSecretVerifier::new(secret));
    let srv_tx = spawn_server();

    log::info!("listening on {}", bind);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(srv_tx.clone()))
            .app_data(web::Data::from(verifier.clone()))
            .route("/ws/", web::get().to(ws_index))
    })
    .bind(bind)?
    .run()
    .await
}
